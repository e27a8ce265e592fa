//! Plain-text directory listings.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tabled::settings::style::HorizontalLine;
use tabled::settings::Style;
use tabled::{Table, Tabled};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

#[derive(Debug, Tabled)]
struct Row {
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Last Modified")]
    modified: String,
}

struct Entry {
    modified: SystemTime,
    row: Row,
}

/// Renders the listing of `dir`, shown to the client as `url_path`.
///
/// Hidden entries (leading `.`) are left out and the rest is ordered by
/// modification time, newest first. A directory that cannot be read still
/// produces a listing, holding the error message instead of a table.
pub async fn render(dir: &Path, url_path: &str) -> String {
    let display_path = if url_path.ends_with('/') {
        url_path.to_string()
    } else {
        format!("{url_path}/")
    };

    let mut entries = match read_entries(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot list directory");
            return error_text(&e, &display_path);
        }
    };

    entries.sort_by(|a, b| b.modified.cmp(&a.modified));
    let total = entries.len();

    // dashed rule under the header row only
    let style = Style::blank().horizontals([(1, HorizontalLine::new('-').intersection(' '))]);
    let mut table = Table::new(entries.into_iter().map(|entry| entry.row));
    table.with(style);

    let title = format!("Index of {display_path}");
    let underline = "=".repeat(title.chars().count());
    let now = Local::now().format(TIME_FORMAT);

    format!("{title}\n{underline}\n\n{table}\n---\nTotal: {total} items | Server Time: {now}\n")
}

/// Body sent in place of a listing when `dir` cannot be read.
fn error_text(err: &io::Error, display_path: &str) -> String {
    match err.kind() {
        io::ErrorKind::PermissionDenied => {
            format!("Error: Permission denied accessing '{display_path}'\n")
        }
        _ => format!("Error: {err}\n"),
    }
}

async fn read_entries(dir: &Path) -> io::Result<Vec<Entry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(dir_entry) = read_dir.next_entry().await? {
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        // follows symlinks; entries we cannot stat are skipped
        let stat = match tokio::fs::metadata(dir_entry.path()).await {
            Ok(stat) => stat,
            Err(e) => {
                tracing::debug!(name = %name, error = %e, "skipping entry");
                continue;
            }
        };
        let Ok(modified) = stat.modified() else {
            continue;
        };

        let row = if stat.is_dir() {
            Row {
                kind: "DIR",
                name: format!("{name}/"),
                size: "-".to_string(),
                modified: format_time(modified),
            }
        } else {
            Row {
                kind: "FILE",
                name,
                size: format_size(stat.len()),
                modified: format_time(modified),
            }
        };
        entries.push(Entry { modified, row });
    }

    Ok(entries)
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(TIME_FORMAT).to_string()
}

/// Human readable size with two decimals, in steps of 1024.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in SIZE_UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, contents: &[u8], age: Duration) {
        fs::write(path, contents).unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
    }

    #[test]
    fn test_format_size() {
        assert_eq!("0.00 B", format_size(0));
        assert_eq!("512.00 B", format_size(512));
        assert_eq!("1.00 KB", format_size(1024));
        assert_eq!("1.50 KB", format_size(1536));
        assert_eq!("4.88 KB", format_size(5000));
        assert_eq!("1.00 MB", format_size(1024 * 1024));
        assert_eq!("1.00 GB", format_size(1 << 30));
        assert_eq!("1.00 TB", format_size(1 << 40));
        assert_eq!("1.00 PB", format_size(1 << 50));
        assert_eq!("2048.00 PB", format_size(1 << 61));
    }

    #[tokio::test]
    async fn test_listing_order_and_hidden_entries() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("old.txt"), b"old", Duration::from_secs(3600));
        touch(&tmp.path().join("new.txt"), b"new file", Duration::from_secs(60));
        touch(&tmp.path().join(".hidden"), b"secret", Duration::from_secs(1));
        fs::create_dir(tmp.path().join(".git")).unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let listing = render(tmp.path(), "/docs").await;

        assert!(listing.starts_with("Index of /docs/\n===============\n\n"), "{listing}");
        assert!(!listing.contains(".hidden"));
        assert!(!listing.contains(".git"));
        assert!(listing.contains("Total: 3 items | Server Time: "));

        let sub = listing.find("sub/").unwrap();
        let new = listing.find("new.txt").unwrap();
        let old = listing.find("old.txt").unwrap();
        assert!(sub < new && new < old, "{listing}");
    }

    #[tokio::test]
    async fn test_listing_columns() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("report.pdf"), &[0u8; 5000], Duration::from_secs(10));
        fs::create_dir(tmp.path().join("photos")).unwrap();

        let listing = render(tmp.path(), "/").await;
        assert!(listing.starts_with("Index of /\n==========\n\n"), "{listing}");

        let header = listing.lines().nth(3).unwrap();
        for column in ["Type", "Name", "Size", "Last Modified"] {
            assert!(header.contains(column), "{header}");
        }
        let rule = listing.lines().nth(4).unwrap();
        assert!(rule.contains("----"), "{listing}");
        assert!(rule.chars().all(|c| c == '-' || c == ' '), "{rule}");
        assert_eq!(1, listing.lines().filter(|l| l.contains("----")).count());

        let file_line = listing.lines().find(|l| l.contains("report.pdf")).unwrap();
        assert!(file_line.contains("FILE"));
        assert!(file_line.contains("4.88 KB"));

        let dir_line = listing.lines().find(|l| l.contains("photos/")).unwrap();
        assert!(dir_line.contains("DIR"));
        assert!(dir_line.contains(" - "));
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let listing = render(tmp.path(), "/empty/").await;
        assert!(listing.starts_with("Index of /empty/\n"));
        assert!(listing.contains("Total: 0 items"));
    }

    #[tokio::test]
    async fn test_unreadable_directory() {
        let tmp = TempDir::new().unwrap();
        let listing = render(&tmp.path().join("gone"), "/gone").await;
        assert!(listing.starts_with("Error: "), "{listing}");
        assert!(!listing.contains("Permission denied"), "{listing}");
    }

    #[test]
    fn test_permission_denied_text() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(
            "Error: Permission denied accessing '/private/'\n",
            error_text(&err, "/private/")
        );

        let err = io::Error::other("disk on fire");
        assert_eq!("Error: disk on fire\n", error_text(&err, "/private/"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_is_skipped() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(tmp.path().join("nowhere"), tmp.path().join("broken")).unwrap();

        let listing = render(tmp.path(), "/").await;
        assert!(!listing.contains("broken"), "{listing}");
        assert!(listing.contains("Total: 0 items"), "{listing}");
    }
}
