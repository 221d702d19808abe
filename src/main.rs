mod cli;
mod config;
mod error;
mod filter;
mod mapping;
mod model;
mod ordering;
mod output;
mod providers;
mod store;
mod tasks;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output stays clean.
    // Example: RUST_LOG=monday=debug monday tasks fetch
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("monday=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = cli::run(&args).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
