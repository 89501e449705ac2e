use crate::models::{DatabaseConfig, LoadSettings};
use crate::utils::constants::{DEFAULT_DB_HOST, DEFAULT_DB_PORT};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "methane-loader")]
#[command(about = "Load gridded methane NetCDF files into PostgreSQL")]
#[command(version)]
pub struct Cli {
    #[arg(
        short,
        long,
        help = "Input file, directory of .nc files, or wildcard pattern"
    )]
    pub file: String,

    #[arg(short, long, help = "Print the dataset layout of the first file and exit")]
    pub metadata: bool,

    #[arg(short, long, help = "Print would-be inserts without touching the database")]
    pub dry_run: bool,

    #[arg(
        short,
        long = "batch-commits",
        default_value_t = 0,
        help = "Commit every N records on one transaction (0 = commit each record)"
    )]
    pub batch_commits: usize,

    #[arg(
        long,
        default_value_t = 0,
        help = "Stop the run once a file has loaded more than N records (0 = no cap)"
    )]
    pub max_records: u64,

    #[arg(short, long, help = "Verbose output")]
    pub verbose: bool,

    #[arg(long, env = "POSTGRES_HOST", default_value = DEFAULT_DB_HOST)]
    pub host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = DEFAULT_DB_PORT)]
    pub port: u16,

    #[arg(long, env = "POSTGRES_USER", default_value = "")]
    pub user: String,

    #[arg(long, env = "POSTGRES_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    #[arg(long, env = "POSTGRES_DB", default_value = "")]
    pub db: String,
}

impl Cli {
    pub fn load_settings(&self) -> LoadSettings {
        LoadSettings::new()
            .with_batch_commits(self.batch_commits)
            .with_max_records(self.max_records)
            .with_dry_run(self.dry_run)
            .with_verbose(self.verbose)
            .with_progress(true)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.host, self.port, &self.user, &self.password, &self.db)
    }
}
