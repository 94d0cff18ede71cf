mod cli;
mod execute;

use clap::Parser;
use crate::cli::CLI;
use toolpin::ToolError;
use tracing_subscriber::EnvFilter;

/// Exit code for a run interrupted with Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = CLI::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let (handle, cancel) = toolpin::cancel::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    if let Err(err) = execute::execute(cli, cancel).await {
        eprintln!("Error: {err:#}");
        let cancelled = err
            .downcast_ref::<ToolError>()
            .is_some_and(ToolError::is_cancelled);
        std::process::exit(if cancelled { EXIT_CANCELLED } else { 1 });
    }
}
