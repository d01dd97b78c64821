//! First/last frame extraction and producer output verification.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Extract the first frame of a video into `output`.
pub async fn extract_first_frame(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let output = output.as_ref();
    ensure_input(video)?;
    ensure_parent(output).await?;

    let cmd = FfmpegCommand::new(video, output).single_frame();
    FfmpegRunner::new()
        .with_timeout(EXTRACT_TIMEOUT)
        .run(&cmd)
        .await?;

    ensure_written(output)?;
    debug!("Extracted first frame: {}", output.display());
    Ok(())
}

/// Extract the last frame of a video into `output`.
///
/// Seeks to one second before the end and keeps overwriting the single
/// output image, so whatever frame was decoded last remains on disk.
pub async fn extract_last_frame(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let output = output.as_ref();
    ensure_input(video)?;
    ensure_parent(output).await?;

    let cmd = FfmpegCommand::new(video, output)
        .seek_from_end(1.0)
        .update_single_image();
    FfmpegRunner::new()
        .with_timeout(EXTRACT_TIMEOUT)
        .run(&cmd)
        .await?;

    ensure_written(output)?;
    debug!("Extracted last frame: {}", output.display());
    Ok(())
}

/// Count `<prefix>_*.png` files in `dir`.
pub fn count_output_frames(dir: impl AsRef<Path>, prefix: &str) -> MediaResult<usize> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(MediaError::FileNotFound(dir.to_path_buf()));
    }

    let stem = format!("{prefix}_");
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&stem) && name.ends_with(".png") {
            count += 1;
        }
    }
    Ok(count)
}

/// Fail unless at least `expected` output frames exist.
pub fn verify_output_frames(
    dir: impl AsRef<Path>,
    prefix: &str,
    expected: usize,
) -> MediaResult<usize> {
    let found = count_output_frames(dir, prefix)?;
    if found < expected {
        return Err(MediaError::MissingFrames { expected, found });
    }
    info!(prefix, found, expected, "Output frames verified");
    Ok(found)
}

fn ensure_input(path: &Path) -> MediaResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(MediaError::FileNotFound(path.to_path_buf()))
    }
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn ensure_written(path: &Path) -> MediaResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(MediaError::ffmpeg_failed(
            format!("FFmpeg produced no frame at {}", path.display()),
            None,
            None,
        )),
    }
}
