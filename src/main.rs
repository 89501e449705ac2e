use clap::Parser;
use methane_loader::cli::{run, Cli};
use methane_loader::utils::constants::EXIT_FATAL;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Variables already set in the environment take precedence over .env
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("methane_loader={},warn", level)));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
