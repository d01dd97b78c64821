//! Tracing setup and structured run logging.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing: coloured output by default, JSON when `LOG_FORMAT=json`.
///
/// `RUST_LOG` directives are honoured on top of `bookend=info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["bookend=info", "bookend_qa=info"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    let result = if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}

/// Structured logger for one sample (or shot) inside a run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    sample_id: String,
    operation: String,
}

impl RunLogger {
    pub fn new(run_id: &str, sample_id: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            sample_id: sample_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            sample_id = %self.sample_id,
            operation = %self.operation,
            "Sample started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            sample_id = %self.sample_id,
            operation = %self.operation,
            "Sample progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            sample_id = %self.sample_id,
            operation = %self.operation,
            "Sample warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            sample_id = %self.sample_id,
            operation = %self.operation,
            "Sample error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            sample_id = %self.sample_id,
            operation = %self.operation,
            "Sample completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the run and sample ids.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "sample",
            run_id = %self.run_id,
            sample_id = %self.sample_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_fields() {
        let logger = RunLogger::new("20250101-000000-abcd1234", "s1", "regression");
        assert_eq!(logger.run_id(), "20250101-000000-abcd1234");
        assert_eq!(logger.sample_id(), "s1");
        assert_eq!(logger.operation(), "regression");
        let _ = logger.create_span();
    }
}
