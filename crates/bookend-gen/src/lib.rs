//! Video generation backends for the bookend QA harness.
//!
//! This crate provides:
//! - The `GenerationBackend` trait shared by every backend
//! - ComfyUI HTTP client and workflow-driven backend
//! - FastVideo HTTP client and backend
//! - ComfyUI API-format workflow loading, validation and patching
//! - Retry with exponential backoff for flaky HTTP calls

pub mod backend;
pub mod comfy;
pub mod error;
pub mod fastvideo;
pub mod retry;
pub mod workflow;

pub use backend::{classify_outputs, GenerationBackend, GenerationOutput, GenerationRequest, OutputKind};
pub use comfy::{ComfyBackend, ComfyClient, ComfyClientConfig};
pub use error::{GenError, GenResult};
pub use fastvideo::{FastVideoBackend, FastVideoClient, FastVideoConfig};
pub use retry::{retry_async, RetryConfig};
pub use workflow::{BindingValues, BrokenLink, Workflow, WorkflowBindings};
