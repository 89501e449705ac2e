use crate::cli::args::Cli;
use crate::error::Result;
use crate::processors::RunOrchestrator;
use crate::readers::{default_opener, GridOpener};
use crate::utils::constants::EXIT_CONNECTION_FAILURE;
use crate::utils::files::expand_input;
use crate::writers::PgGateway;
use std::path::Path;
use std::process::ExitCode;
use tracing::warn;

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let paths = expand_input(&cli.file)?;
    if paths.is_empty() {
        println!("No files found matching {}", cli.file);
        return Ok(ExitCode::SUCCESS);
    }

    let opener = default_opener();
    if cli.metadata {
        show_metadata(opener.as_ref(), &paths[0])?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut settings = cli.load_settings();
    let config = cli.database_config();
    if !settings.dry_run && !config.is_complete() {
        warn!(?config, "Connection parameters incomplete, no database updates will be made");
        settings = settings.with_dry_run(true);
    }

    if settings.verbose {
        println!("Ready to process {} files.", paths.len());
        if settings.dry_run {
            println!("No db updates will be attempted");
        } else {
            println!("The db will be updated");
        }
    }

    let orchestrator = RunOrchestrator::new(opener.as_ref(), &settings)?;
    if settings.dry_run {
        orchestrator.run(&paths, None::<&mut PgGateway>).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut gateway = match PgGateway::connect(&config).await {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("Unable to connect to {}:{}/{}: {}", config.host, config.port, config.db, e);
            return Ok(ExitCode::from(EXIT_CONNECTION_FAILURE));
        }
    };

    let result = orchestrator.run(&paths, Some(&mut gateway)).await;
    gateway.close().await?;
    result?;

    Ok(ExitCode::SUCCESS)
}

fn show_metadata(opener: &dyn GridOpener, path: &Path) -> Result<()> {
    let dataset = opener.open(path)?;
    println!("{}", path.display());
    println!("{}", dataset.describe()?);
    Ok(())
}
