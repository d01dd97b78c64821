//! Content digests used to detect keyframe changes between baseline runs.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{MediaError, MediaResult};

/// SHA-256 hex digest of a file.
pub fn file_digest(path: impl AsRef<Path>) -> MediaResult<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MediaError::FileNotFound(path.to_path_buf()),
        _ => MediaError::Io(e),
    })?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Combined digest of a start/end keyframe pair.
///
/// Hashes both file digests in order, so swapping the keyframes changes it.
pub fn keyframe_digest(start: impl AsRef<Path>, end: impl AsRef<Path>) -> MediaResult<String> {
    let start = file_digest(start)?;
    let end = file_digest(end)?;

    let mut hasher = Sha256::new();
    hasher.update(start.as_bytes());
    hasher.update(b":");
    hasher.update(end.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_digest_known_value() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_digest(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_keyframe_digest_is_order_sensitive() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.png");
        let b = tmp.path().join("b.png");
        std::fs::write(&a, b"start").unwrap();
        std::fs::write(&b, b"end").unwrap();

        let ab = keyframe_digest(&a, &b).unwrap();
        assert_eq!(ab, keyframe_digest(&a, &b).unwrap());
        assert_ne!(ab, keyframe_digest(&b, &a).unwrap());
        assert_eq!(ab.len(), 64);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            file_digest("/nonexistent/keyframe.png"),
            Err(MediaError::FileNotFound(_))
        ));
    }
}
