//! Application state.

use std::sync::Arc;

use bookend_storage::ResultsStore;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<ResultsStore>,
}

impl AppState {
    pub fn new(config: ApiConfig) -> Self {
        let store = ResultsStore::new(&config.results_dir, &config.baseline_path);
        Self {
            config,
            store: Arc::new(store),
        }
    }
}
