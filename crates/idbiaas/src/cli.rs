//! Command line interface

use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing::Level;

/// Update virtual machines to the IDB
#[derive(Debug, Parser)]
#[command(name = "idbiaas")]
#[command(about = "Update virtual machines to the IDB")]
#[command(version)]
#[command(group(ArgGroup::new("source").required(true).args(["config", "url"])))]
pub struct Cli {
    /// Local configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the IDB API to fetch the configuration from
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// IDB API token for fetching the configuration
    #[arg(long, env = "IDB_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Verify the TLS certificate chain when fetching the configuration
    #[arg(long, overrides_with = "no_verify")]
    pub verify: bool,

    /// Don't verify the TLS certificate chain when fetching the configuration
    #[arg(long, overrides_with = "verify")]
    pub no_verify: bool,

    /// Log critical errors
    #[arg(long, group = "level")]
    pub critical: bool,

    /// Log errors and above
    #[arg(long, group = "level")]
    pub error: bool,

    /// Log warnings and above (default)
    #[arg(long, group = "level")]
    pub warning: bool,

    /// Log informational messages and above
    #[arg(long, group = "level")]
    pub info: bool,

    /// Log debug information and above
    #[arg(long, group = "level")]
    pub debug: bool,
}

impl Cli {
    /// TLS verification for the remote configuration fetch
    pub fn verify_tls(&self) -> bool {
        !self.no_verify
    }

    /// Maximum level for the log subscriber
    ///
    /// `tracing` has no level above error, so `--critical` logs errors.
    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.info {
            Level::INFO
        } else if self.error || self.critical {
            Level::ERROR
        } else {
            Level::WARN
        }
    }
}
