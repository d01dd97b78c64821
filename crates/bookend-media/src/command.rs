//! `ffmpeg` invocation: argument builder plus a runner with timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// One `ffmpeg` invocation with a single input and output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    /// Arguments placed before `-i`
    input_args: Vec<String>,
    /// Arguments placed after `-i`
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Seek relative to the end of the input (`-sseof`).
    pub fn seek_from_end(self, seconds: f64) -> Self {
        self.input_arg("-sseof").input_arg(format!("{:.3}", -seconds.abs()))
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Keep overwriting the output image so the last decoded frame remains.
    pub fn update_single_image(self) -> Self {
        self.output_arg("-update").output_arg("1")
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// `[-y] -v <level> <input args> -i <input> <output args> <output>`
    pub fn build_args(&self) -> Vec<String> {
        let overwrite = self.overwrite.then(|| "-y".to_string());
        overwrite
            .into_iter()
            .chain(["-v".to_string(), self.log_level.clone()])
            .chain(self.input_args.iter().cloned())
            .chain(["-i".to_string(), self.input.display().to_string()])
            .chain(self.output_args.iter().cloned())
            .chain([self.output.display().to_string()])
            .collect()
    }
}

/// Runs FFmpeg commands with an optional timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run the command to completion, capturing stderr for error reports.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!(args = %args.join(" "), "ffmpeg");

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(output = %cmd.output_path().display(), "ffmpeg timed out after {:?}", timeout);
                    return Err(MediaError::Timeout(timeout.as_secs()));
                }
            },
            None => child.wait_with_output().await?,
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(MediaError::ffmpeg_failed(
                "non-zero exit status",
                (!stderr.is_empty()).then_some(stderr),
                output.status.code(),
            ))
        }
    }
}

/// Resolve `ffmpeg` on PATH.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::ToolNotFound("ffmpeg"))
}

/// Resolve `ffprobe` on PATH.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::ToolNotFound("ffprobe"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_frame_args() {
        let cmd = FfmpegCommand::new("clip.mp4", "last.png")
            .seek_from_end(1.0)
            .update_single_image();

        let args = cmd.build_args();
        let sseof = args.iter().position(|a| a == "-sseof").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(sseof < input, "-sseof must precede the input");
        assert_eq!(args[sseof + 1], "-1.000");
        assert!(args.contains(&"-update".to_string()));
        assert_eq!(args.last().unwrap(), "last.png");
    }

    #[test]
    fn test_first_frame_args() {
        let args = FfmpegCommand::new("clip.mp4", "first.png")
            .single_frame()
            .build_args();
        assert_eq!(&args[..3], &["-y", "-v", "error"]);
        assert!(args.windows(2).any(|w| w == ["-frames:v", "1"]));
    }
}
