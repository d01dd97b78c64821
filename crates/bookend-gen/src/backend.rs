//! The generation backend seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bookend_models::BookendSample;
use serde::{Deserialize, Serialize};

use crate::error::GenResult;

/// Inputs for one bookend generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub sample_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub start_keyframe: PathBuf,
    pub end_keyframe: PathBuf,
    pub seed: Option<u64>,
    pub frame_count: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl From<&BookendSample> for GenerationRequest {
    fn from(sample: &BookendSample) -> Self {
        Self {
            sample_id: sample.id.clone(),
            prompt: sample.prompt.clone(),
            negative_prompt: sample.negative_prompt.clone(),
            start_keyframe: sample.start_keyframe.clone(),
            end_keyframe: sample.end_keyframe.clone(),
            seed: sample.seed,
            frame_count: sample.frame_count,
            fps: sample.fps,
            width: sample.width,
            height: sample.height,
        }
    }
}

/// Files produced by a backend, already local.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub video_path: Option<PathBuf>,
    /// Individual frame images, sorted by file name
    pub frame_paths: Vec<PathBuf>,
    pub duration_ms: u64,
    pub seed: Option<u64>,
}

impl GenerationOutput {
    pub fn first_frame(&self) -> Option<&Path> {
        self.frame_paths.first().map(PathBuf::as_path)
    }

    pub fn last_frame(&self) -> Option<&Path> {
        self.frame_paths.last().map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.video_path.is_none() && self.frame_paths.is_empty()
    }
}

/// A video generation service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short backend name recorded in reports.
    fn name(&self) -> &str;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> GenResult<()>;

    /// Generate a clip for `request`, writing artifacts into `output_dir`.
    async fn generate(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
    ) -> GenResult<GenerationOutput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Video,
    Frame,
    Other,
}

impl OutputKind {
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" | "webm" | "gif" | "mov" => OutputKind::Video,
            "png" | "jpg" | "jpeg" | "webp" => OutputKind::Frame,
            _ => OutputKind::Other,
        }
    }
}

/// Split downloaded files into the first video (by name) and sorted frames.
pub fn classify_outputs(mut files: Vec<PathBuf>) -> (Option<PathBuf>, Vec<PathBuf>) {
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut video = None;
    let mut frames = Vec::new();
    for file in files {
        match OutputKind::of(&file) {
            OutputKind::Video if video.is_none() => video = Some(file),
            OutputKind::Frame => frames.push(file),
            _ => {}
        }
    }
    (video, frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_outputs() {
        let files = vec![
            PathBuf::from("/o/s1_00002_.png"),
            PathBuf::from("/o/s1_00001_.png"),
            PathBuf::from("/o/s1.MP4"),
            PathBuf::from("/o/s1.done"),
            PathBuf::from("/o/s1_preview.webp"),
        ];
        let (video, frames) = classify_outputs(files);
        assert_eq!(video, Some(PathBuf::from("/o/s1.MP4")));
        assert_eq!(
            frames,
            vec![
                PathBuf::from("/o/s1_00001_.png"),
                PathBuf::from("/o/s1_00002_.png"),
                PathBuf::from("/o/s1_preview.webp"),
            ]
        );
    }

    #[test]
    fn test_request_from_sample() {
        let sample = BookendSample::new("s1", "a cat", "start.png", "end.png");
        let req = GenerationRequest::from(&sample);
        assert_eq!(req.sample_id, "s1");
        assert_eq!(req.frame_count, 25);
        assert_eq!(req.fps, 16);
    }

    #[test]
    fn test_output_frames() {
        let out = GenerationOutput {
            frame_paths: vec!["a.png".into(), "b.png".into()],
            ..Default::default()
        };
        assert_eq!(out.first_frame(), Some(Path::new("a.png")));
        assert_eq!(out.last_frame(), Some(Path::new("b.png")));
        assert!(GenerationOutput::default().is_empty());
    }
}
