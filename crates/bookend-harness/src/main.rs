//! `bookend-qa` binary.

use clap::Parser;
use tracing::error;

use bookend_harness::{execute, init_tracing, Cli, EXIT_SETUP};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            EXIT_SETUP
        }
    };
    std::process::exit(code);
}
