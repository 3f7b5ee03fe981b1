//! Command-line argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "orderheal-server",
    about = "POS webhook receiver and order reconciliation service",
    version
)]
pub struct Args {
    /// Path to configuration file; missing files fall back to defaults
    #[arg(short, long, env = "ORDERHEAL_CONFIG", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Overrides `server.port` from the configuration
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Enable JSON log format
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// Apply database migrations before serving
    #[arg(long, env = "ORDERHEAL_MIGRATE")]
    pub migrate: bool,

    /// Run against in-memory repositories and queues, without Postgres or NATS
    #[arg(long)]
    pub in_memory: bool,

    /// JSON file with stores, orders and retry budgets for `--in-memory`
    #[arg(long, requires = "in_memory")]
    pub seed: Option<PathBuf>,
}
