//! ComfyUI backend.

mod backend;
mod client;
mod types;

pub use backend::ComfyBackend;
pub use client::{ComfyClient, ComfyClientConfig};
pub use types::{HistoryEntry, OutputFile, PromptStatus, SystemStats, UploadResponse};
