//! Media helpers for the bookend QA harness.
//!
//! This crate provides:
//! - FFmpeg command building and frame extraction
//! - FFprobe video inspection
//! - Pixel-level frame similarity (mean absolute difference + color histogram)
//! - Keyframe digests for baseline identity
//! - Synthetic test keyframes
//! - Producer-style done markers and output frame verification

pub mod command;
pub mod digest;
pub mod error;
pub mod frames;
pub mod marker;
pub mod probe;
pub mod similarity;
pub mod test_image;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use digest::{file_digest, keyframe_digest};
pub use error::{MediaError, MediaResult};
pub use frames::{
    count_output_frames, extract_first_frame, extract_last_frame, verify_output_frames,
};
pub use marker::{
    done_marker_path, read_done_marker, wait_for_done_marker, write_done_marker,
    write_done_marker_with_tmp_ext, DEFAULT_TMP_EXT,
};
pub use probe::{probe_video, VideoInfo};
pub use similarity::{compare_images, compare_rgb, SimilarityScore, COMPARE_SIZE};
pub use test_image::{create_test_image, render_test_image};
