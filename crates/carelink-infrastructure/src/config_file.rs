//! Reading of the optional files in the CareLink config directory.

use carelink_core::error::{CarelinkError, Result};
use std::fmt::Display;
use std::io::ErrorKind;
use std::path::Path;

/// Returns the file content, or `None` when the file is missing or blank.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(None),
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CarelinkError::io(format!("{} ({})", e, path.display()))),
    }
}

pub(crate) fn parse_error(format: &str, path: &Path, err: impl Display) -> CarelinkError {
    CarelinkError::Serialization {
        format: format.to_string(),
        message: format!("{} ({})", err, path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_and_blank_files_read_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(read_optional(&path).unwrap(), None);

        std::fs::write(&path, "\n   \n").unwrap();
        assert_eq!(read_optional(&path).unwrap(), None);

        std::fs::write(&path, "[assistant]\n").unwrap();
        assert_eq!(read_optional(&path).unwrap().as_deref(), Some("[assistant]\n"));
    }

    #[test]
    fn test_directory_in_place_of_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_optional(dir.path()).unwrap_err();
        assert!(matches!(err, CarelinkError::Io { .. }), "{err:?}");
    }
}
