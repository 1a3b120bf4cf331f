use anyhow::Result;
use clap::Parser;
use switchback::cli::{run, Cli};

/// Initialize structured logging with tracing.
///
/// Respects RUST_LOG for filtering (default: `info`).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli)
}
