//! Atomic JSON file helpers.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{StorageError, StorageResult};

/// Serialize `value` as pretty JSON and write it atomically.
///
/// The payload goes to a `.tmp` sibling in the same directory, is synced, and
/// is then renamed over `path`, so readers never observe a partial file.
pub async fn write_json_atomic<T: Serialize>(path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
    let path = path.as_ref();
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes).await
}

/// Write raw bytes atomically.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    {
        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| StorageError::write_failed(&tmp, e))?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
    }

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StorageError::write_failed(path, e));
    }
    Ok(())
}

/// Read and deserialize a JSON file. A missing file is `NotFound`.
pub async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> StorageResult<T> {
    let path = path.as_ref();
    let bytes = match fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::not_found(path.display().to_string()));
        }
        Err(e) => return Err(StorageError::read_failed(path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|e| StorageError::read_failed(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        n: u32,
    }

    #[tokio::test]
    async fn test_atomic_write_leaves_no_tmp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/doc.json");
        let doc = Doc { name: "x".into(), n: 3 };

        write_json_atomic(&path, &doc).await.unwrap();
        assert!(!tmp.path().join("a/b/doc.json.tmp").exists());

        let back: Doc = read_json(&path).await.unwrap();
        assert_eq!(back, doc);
    }

    #[tokio::test]
    async fn test_read_missing_and_corrupt() {
        let tmp = TempDir::new().unwrap();
        let missing = read_json::<Doc>(tmp.path().join("missing.json")).await;
        assert!(missing.unwrap_err().is_not_found());

        let corrupt = tmp.path().join("corrupt.json");
        std::fs::write(&corrupt, b"{not json").unwrap();
        assert!(matches!(
            read_json::<Doc>(&corrupt).await,
            Err(StorageError::ReadFailed { .. })
        ));
    }
}
