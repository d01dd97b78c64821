//! Filesystem results store.
//!
//! This crate provides:
//! - Run id generation and validation
//! - Run report persistence (JSON + Markdown) and listing
//! - Narrative run persistence and listing
//! - Baseline load/save
//! - Atomic JSON writes

pub mod error;
pub mod fs_utils;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use fs_utils::{read_json, write_json_atomic};
pub use store::{new_run_id, validate_id, NarrativeListing, ResultsStore, RunListing};
