use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// An absolute path that was checked to lie inside the served root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("path out of bounds")]
    OutOfBounds,
    #[error("no such file or directory")]
    NotFound,
}

/// Maps a request path onto the filesystem below `root`.
///
/// `root` must already be canonical. The request path is first joined
/// lexically so that `..` can never climb above `root`, then canonicalized on
/// disk and checked again so a symlink cannot point outside of it either.
/// An empty request path resolves to `root` itself.
pub async fn resolve(root: &Path, request_path: &str) -> Result<ResolvedPath, ResolveError> {
    let joined = join_lexically(root, request_path);
    if !joined.starts_with(root) {
        tracing::debug!(request_path, "request path escapes root");
        return Err(ResolveError::OutOfBounds);
    }

    let canonical = tokio::fs::canonicalize(&joined).await.map_err(|e| {
        tracing::debug!(path = %joined.display(), error = %e, "cannot canonicalize");
        ResolveError::NotFound
    })?;

    if !canonical.starts_with(root) {
        tracing::debug!(request_path, target = %canonical.display(), "symlink escapes root");
        return Err(ResolveError::OutOfBounds);
    }

    Ok(ResolvedPath(canonical))
}

/// Joins without touching the filesystem. `Path::starts_with` compares whole
/// components, so `/data2` is not considered inside `/data`.
fn join_lexically(root: &Path, request_path: &str) -> PathBuf {
    let mut joined = root.to_path_buf();
    for component in Path::new(request_path).components() {
        match component {
            // an absolute request path replaces the root, as `Path::join` would
            Component::Prefix(_) | Component::RootDir => {
                joined = PathBuf::from(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                joined.pop();
            }
            Component::Normal(name) => joined.push(name),
        }
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("data");
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/report.pdf"), b"report").unwrap();
        fs::create_dir_all(tmp.path().join("data2")).unwrap();
        fs::write(tmp.path().join("data2/secret.txt"), b"secret").unwrap();
        fs::write(tmp.path().join("outside.txt"), b"outside").unwrap();
        let root = fs::canonicalize(root).unwrap();
        (tmp, root)
    }

    #[test]
    fn test_join_lexically() {
        let root = Path::new("/data");
        assert_eq!(PathBuf::from("/data"), join_lexically(root, ""));
        assert_eq!(PathBuf::from("/data/a/b"), join_lexically(root, "a/./b"));
        assert_eq!(PathBuf::from("/data/b"), join_lexically(root, "a/../b"));
        assert_eq!(PathBuf::from("/etc/passwd"), join_lexically(root, "../../etc/passwd"));
        assert_eq!(PathBuf::from("/etc/passwd"), join_lexically(root, "/etc/passwd"));
        assert_eq!(PathBuf::from("/etc"), join_lexically(root, "../../../../../etc"));
    }

    #[tokio::test]
    async fn test_resolve_file() {
        let (_tmp, root) = setup();
        let resolved = resolve(&root, "docs/report.pdf").await.unwrap();
        assert_eq!(root.join("docs/report.pdf"), resolved.as_path());
    }

    #[tokio::test]
    async fn test_empty_path_is_root() {
        let (_tmp, root) = setup();
        let resolved = resolve(&root, "").await.unwrap();
        assert_eq!(root, resolved.as_path());
    }

    #[tokio::test]
    async fn test_dot_segments_inside_root() {
        let (_tmp, root) = setup();
        let resolved = resolve(&root, "docs/../docs/./report.pdf").await.unwrap();
        assert_eq!(root.join("docs/report.pdf"), resolved.as_path());
    }

    #[tokio::test]
    async fn test_traversal_is_out_of_bounds() {
        let (_tmp, root) = setup();
        for request_path in [
            "..",
            "../outside.txt",
            "../../etc/passwd",
            "/../../etc/passwd",
            "docs/../../outside.txt",
            "/etc/passwd",
        ] {
            assert_matches!(
                resolve(&root, request_path).await,
                Err(ResolveError::OutOfBounds),
                "{request_path}"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_traversal_target_is_still_out_of_bounds() {
        let (_tmp, root) = setup();
        assert_matches!(
            resolve(&root, "../does/not/exist").await,
            Err(ResolveError::OutOfBounds)
        );
    }

    #[tokio::test]
    async fn test_sibling_with_common_prefix() {
        let (_tmp, root) = setup();
        assert_matches!(
            resolve(&root, "../data2/secret.txt").await,
            Err(ResolveError::OutOfBounds)
        );
    }

    #[tokio::test]
    async fn test_not_found() {
        let (_tmp, root) = setup();
        assert_matches!(resolve(&root, "missing.txt").await, Err(ResolveError::NotFound));
        assert_matches!(
            resolve(&root, "docs/report.pdf/child").await,
            Err(ResolveError::NotFound)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape() {
        let (tmp, root) = setup();
        std::os::unix::fs::symlink(tmp.path().join("data2"), root.join("link")).unwrap();
        assert_matches!(
            resolve(&root, "link/secret.txt").await,
            Err(ResolveError::OutOfBounds)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_inside_root() {
        let (_tmp, root) = setup();
        std::os::unix::fs::symlink(root.join("docs"), root.join("alias")).unwrap();
        let resolved = resolve(&root, "alias/report.pdf").await.unwrap();
        assert_eq!(root.join("docs/report.pdf"), resolved.as_path());
    }
}
