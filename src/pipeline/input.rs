//! Input resolution: validate the document path and read it as UTF-8 text.
//!
//! Missing files, unreadable files and non-text files are the only fatal
//! input conditions. They are mapped to distinct [`MdSketchError`] variants
//! so the CLI can print an actionable hint instead of a raw `io::Error`.

use crate::error::MdSketchError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Read the document at `path`.
pub async fn load_document(path: &Path) -> Result<String, MdSketchError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(MdSketchError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(MdSketchError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(MdSketchError::Internal(format!(
                "failed to read '{}': {e}",
                path.display()
            )));
        }
    };

    let text = String::from_utf8(bytes).map_err(|_| MdSketchError::NotUtf8 {
        path: path.to_path_buf(),
    })?;
    debug!("Loaded document {} ({} bytes)", path.display(), text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(&dir.path().join("nope.md")).await.unwrap_err();
        assert!(matches!(err, MdSketchError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn binary_file_is_not_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bin.md");
        std::fs::write(&p, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let err = load_document(&p).await.unwrap_err();
        assert!(matches!(err, MdSketchError::NotUtf8 { .. }));
    }

    #[tokio::test]
    async fn reads_text() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.md");
        std::fs::write(&p, "# Title\n").unwrap();
        assert_eq!(load_document(&p).await.unwrap(), "# Title\n");
    }
}
