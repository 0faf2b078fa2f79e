// # idbiaas - IaaS to IDB adapter
//
// Thin integration layer: all enumeration and submission logic lives in
// idb-core and the driver/inventory crates.
//
// The binary is responsible for:
// 1. Parsing the command line
// 2. Initializing logging
// 3. Loading the configuration (local file or the IDB's `cloud_providers`)
// 4. Registering drivers and inventory clients
// 5. Running one reconciliation cycle
//
// ## Example
//
// ```bash
// idbiaas --config /etc/idbiaas/zones.json --info
//
// export IDB_API_TOKEN=...
// idbiaas --url https://idb.example.org/api/v3 --no-verify
// ```

mod cli;
mod source;

use clap::Parser;
use idb_core::{ReconciliationRun, Registry};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;
use crate::source::ConfigSource;

/// Exit codes for different termination scenarios
///
/// - 0: Cycle completed (individual host, zone or record failures included)
/// - 1: Configuration could not be loaded, parsed or validated
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IaasExitCode {
    /// Cycle completed
    Success = 0,
    /// Configuration error
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<IaasExitCode> for ExitCode {
    fn from(code: IaasExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IaasExitCode::RuntimeError.into();
    }

    let source = match ConfigSource::from_cli(&cli) {
        Ok(source) => source,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return IaasExitCode::ConfigError.into();
        }
    };

    // Zones, hosts and records are processed one after another
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IaasExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(source)).into()
}

/// Load the configuration and run one cycle
async fn run(source: ConfigSource) -> IaasExitCode {
    let config = match source.load().await {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return IaasExitCode::ConfigError;
        }
    };

    let registry = registry();
    let run = match ReconciliationRun::from_value(&config, &registry) {
        Ok(run) => run,
        Err(e) => {
            error!("Configuration error: {}", e);
            return IaasExitCode::ConfigError;
        }
    };

    info!("Configuration loaded: {} zone(s)", run.zones().len());
    run.run().await;

    IaasExitCode::Success
}

/// Registry with every compiled-in driver and both inventory protocols
fn registry() -> Registry {
    let mut registry = Registry::new();

    #[cfg(feature = "libvirt")]
    idb_driver_libvirt::register(&mut registry);

    #[cfg(feature = "digitalocean")]
    idb_driver_digitalocean::register(&mut registry);

    idb_inventory::register(&mut registry);
    registry
}
