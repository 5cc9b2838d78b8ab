//! Program image loading.
//!
//! An i69 image is the raw file contents: no header, no alignment. The whole
//! file becomes memory starting at offset 0.

use std::path::Path;
use thiserror::Error;

/// Read a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, LoadError> {
    let path = path.as_ref();
    let image = std::fs::read(path)
        .map_err(|e| LoadError::Io(format!("{}: {}", path.display(), e)))?;

    if image.is_empty() {
        return Err(LoadError::Empty(path.display().to_string()));
    }

    Ok(image)
}

/// Errors that can occur while loading an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("program image {0} is empty")]
    Empty(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x41, 0x02, 0x01]).unwrap();

        assert_eq!(load_image(file.path()).unwrap(), vec![0x41, 0x02, 0x01]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(dir.path().join("missing.bin")).unwrap_err();

        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_load_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = load_image(file.path()).unwrap_err();

        assert!(matches!(err, LoadError::Empty(_)));
    }
}
