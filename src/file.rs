use std::fs::Metadata;
use std::path::Path;

/// Size and name of a file about to be downloaded.
///
/// Taken from a single stat call right before the response is built. It is
/// not refreshed while streaming, so a file that changes underneath a
/// download only ends the body early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub basename: String,
}

impl FileMetadata {
    pub fn new(path: &Path, metadata: &Metadata) -> Self {
        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        FileMetadata { size: metadata.len(), basename }
    }

    /// Value of the `Content-Disposition` header forcing a download.
    pub fn content_disposition(&self) -> String {
        let mut filename = String::with_capacity(self.basename.len());
        for c in self.basename.chars() {
            match c {
                '"' | '\\' => {
                    filename.push('\\');
                    filename.push(c);
                }
                // a header value cannot carry control characters
                c if c.is_control() => filename.push('_'),
                c => filename.push(c),
            }
        }
        format!("attachment; filename=\"{filename}\"")
    }

    /// Guessed from the extension, `application/octet-stream` if unknown.
    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.basename)
            .first_or_octet_stream()
            .to_string()
    }
}
