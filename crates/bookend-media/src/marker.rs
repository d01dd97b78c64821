//! Done markers signalling that a frame producer has finished writing.
//!
//! A producer writes `<prefix>.done` once every `<prefix>_*.png` frame is on
//! disk. Consumers poll for the marker instead of watching frame counts.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bookend_models::DoneMarker;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

const DONE_EXT: &str = "done";

/// Suffix of the temporary file the marker is written to before the rename.
pub const DEFAULT_TMP_EXT: &str = ".tmp";

/// Path of the done marker for `prefix` in `dir`.
pub fn done_marker_path(dir: impl AsRef<Path>, prefix: &str) -> PathBuf {
    dir.as_ref().join(format!("{prefix}.{DONE_EXT}"))
}

/// Write `<prefix>.done` atomically.
pub async fn write_done_marker(
    dir: impl AsRef<Path>,
    prefix: &str,
    frame_count: Option<u32>,
) -> MediaResult<PathBuf> {
    write_done_marker_with_tmp_ext(dir, prefix, DEFAULT_TMP_EXT, frame_count).await
}

/// Write `<prefix>.done` via a `<prefix>.done<tmp_ext>` sibling, fsync and
/// rename.
///
/// When the rename fails (for example when another process holds the target
/// open) the marker is written directly and the tmp file removed.
pub async fn write_done_marker_with_tmp_ext(
    dir: impl AsRef<Path>,
    prefix: &str,
    tmp_ext: &str,
    frame_count: Option<u32>,
) -> MediaResult<PathBuf> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let final_path = done_marker_path(dir, prefix);
    let tmp_path = dir.join(format!("{prefix}.{DONE_EXT}{tmp_ext}"));
    let payload = serde_json::to_vec(&DoneMarker::now(frame_count))?;

    {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&payload).await?;
        file.flush().await?;
        file.sync_all().await?;
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
        warn!(
            "Atomic rename of {} failed ({}), writing marker directly",
            final_path.display(),
            e
        );
        tokio::fs::write(&final_path, &payload).await?;
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            debug!("Failed to remove {}: {}", tmp_path.display(), e);
        }
    }

    info!(prefix, frame_count, "Wrote done marker {}", final_path.display());
    Ok(final_path)
}

/// Read `<prefix>.done`, returning `None` when it does not exist yet.
pub async fn read_done_marker(
    dir: impl AsRef<Path>,
    prefix: &str,
) -> MediaResult<Option<DoneMarker>> {
    let path = done_marker_path(dir, prefix);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Poll for `<prefix>.done` until it appears or `timeout` elapses.
pub async fn wait_for_done_marker(
    dir: impl AsRef<Path>,
    prefix: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> MediaResult<DoneMarker> {
    let dir = dir.as_ref();
    let start = Instant::now();

    loop {
        // A marker caught mid-write parses as garbage; retry on the next poll.
        match read_done_marker(dir, prefix).await {
            Ok(Some(marker)) => {
                debug!("Done marker found after {:?}", start.elapsed());
                return Ok(marker);
            }
            Ok(None) => {}
            Err(MediaError::JsonParse(e)) => debug!("Partial done marker: {}", e),
            Err(e) => return Err(e),
        }

        if start.elapsed() >= timeout {
            return Err(MediaError::Timeout(timeout.as_secs()));
        }
        tokio::time::sleep(poll_interval).await;
    }
}
