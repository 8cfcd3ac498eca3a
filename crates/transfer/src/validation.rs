use std::path::{Component, Path};

use crate::TransferError;

/// Checks a remote storage key before anything is written under it.
///
/// Keys are `/`-separated relative paths such as `3f2a.../game-archive.zip`.
/// Empty keys, absolute keys, backslashes and `..` or `.` segments are
/// rejected.
pub fn validate_storage_key(key: &str) -> Result<(), TransferError> {
    if key.is_empty() {
        return Err(TransferError::InvalidKey("empty key".into()));
    }
    if key.contains('\\') {
        return Err(TransferError::InvalidKey(format!(
            "backslash not allowed: {key}"
        )));
    }
    if key.split('/').any(str::is_empty) {
        return Err(TransferError::InvalidKey(format!(
            "empty segment not allowed: {key}"
        )));
    }

    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => {
                return Err(TransferError::InvalidKey(format!(
                    "parent directory traversal not allowed: {key}"
                )));
            }
            Component::CurDir => {
                return Err(TransferError::InvalidKey(format!(
                    "current directory segment not allowed: {key}"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(TransferError::InvalidKey(format!(
                    "absolute key not allowed: {key}"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_prefixed_archive_key() {
        assert!(validate_storage_key("game-archive.zip").is_ok());
        assert!(
            validate_storage_key("2d7c1f0e-8a4b-4c55-9d0e-6f1a2b3c4d5e/game-archive.zip").is_ok()
        );
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_storage_key("").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_storage_key("..").is_err());
        assert!(validate_storage_key("../game-archive.zip").is_err());
        assert!(validate_storage_key("prefix/../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_absolute() {
        assert!(validate_storage_key("/game-archive.zip").is_err());
    }

    #[test]
    fn rejects_odd_segments() {
        assert!(validate_storage_key("./game-archive.zip").is_err());
        assert!(validate_storage_key("prefix//game-archive.zip").is_err());
        assert!(validate_storage_key("prefix/").is_err());
        assert!(validate_storage_key("prefix\\game-archive.zip").is_err());
    }
}
