//! Reconciliation run
//!
//! The [`ReconciliationRun`] owns every configured zone and drives one
//! discovery/submission cycle over them:
//!
//! ```text
//! ┌──────────────┐   enumerate()   ┌──────────────┐   submit()   ┌─────────────────┐
//! │ ProviderZone │ ──────────────► │ MachineRecord│ ───────────► │ InventoryClient │
//! └──────────────┘                 └──────────────┘              └─────────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. All zones are built from configuration before any network activity
//! 2. Zones are processed one after another, in configuration order
//! 3. Each zone enumerates its machines, logs them, and submits them
//! 4. Per-zone outcomes are collected into a [`RunReport`]
//!
//! A zone that finds nothing or whose submissions fail does not stop the
//! zones after it.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{Instrument, info, info_span, warn};

use crate::config::{DriverKind, IaasConfig, ProtocolVersion};
use crate::error::Result;
use crate::registry::Registry;
use crate::traits::{RecordOutcome, SubmitReport};
use crate::zone::Zone;

/// Outcome of one zone within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReport {
    /// Position of the zone in the configuration
    pub index: usize,
    /// Driver backing the zone
    pub driver: DriverKind,
    /// Protocol of the zone's inventory backend
    pub protocol: ProtocolVersion,
    /// fqdns discovered during enumeration, in order
    pub discovered: Vec<String>,
    /// What happened to them at the backend
    pub submission: SubmitReport,
}

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Per-zone outcomes, in configuration order
    pub zones: Vec<ZoneReport>,
}

impl RunReport {
    /// Total machines discovered across all zones
    pub fn discovered(&self) -> usize {
        self.zones.iter().map(|z| z.discovered.len()).sum()
    }

    /// Total records that ended in `outcome` across all zones
    pub fn count(&self, outcome: RecordOutcome) -> usize {
        self.zones.iter().map(|z| z.submission.count(outcome)).sum()
    }

    /// Total failed records across all zones
    pub fn failures(&self) -> usize {
        self.count(RecordOutcome::Failed)
    }
}

/// One reconciliation cycle over a fixed set of zones
pub struct ReconciliationRun {
    zones: Vec<Zone>,
}

impl ReconciliationRun {
    /// Create a run over already built zones
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    /// Build every zone of `config`
    ///
    /// Construction is eager: the first bad zone fails the whole run before
    /// any provider or backend is contacted.
    pub fn from_config(config: &IaasConfig, registry: &Registry) -> Result<Self> {
        let zones = config
            .zones
            .iter()
            .map(|zone| Zone::from_config(zone, registry))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(zones))
    }

    /// Parse and build every zone of a raw configuration document
    pub fn from_value(value: &Value, registry: &Registry) -> Result<Self> {
        Self::from_config(&IaasConfig::from_value(value)?, registry)
    }

    /// Zones of this run, in processing order
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Process every zone once
    pub async fn run(&self) -> RunReport {
        let started_at = Utc::now();
        info!("Starting reconciliation of {} zone(s)", self.zones.len());

        let mut reports = Vec::with_capacity(self.zones.len());
        for (index, zone) in self.zones.iter().enumerate() {
            let span = info_span!(
                "zone",
                index,
                driver = %zone.provider().kind(),
                protocol = %zone.inventory().protocol(),
            );

            let report = self.run_zone(index, zone).instrument(span).await;
            reports.push(report);
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            zones: reports,
        };

        info!(
            "Reconciliation finished: {} machine(s) discovered, {} failed submission(s)",
            report.discovered(),
            report.failures()
        );

        report
    }

    async fn run_zone(&self, index: usize, zone: &Zone) -> ZoneReport {
        let machines = zone.enumerate().await;

        info!(
            "Found {} machine(s) in zone {} ({})",
            machines.len(),
            index,
            zone.provider().kind()
        );
        for machine in &machines {
            info!("{}", machine.fqdn);
        }

        info!(
            "Sending machines in zone {} to IDB API at {}",
            index,
            zone.inventory().base_url()
        );
        let submission = zone.submit(&machines).await;

        if submission.failures() > 0 {
            warn!(
                "Zone {}: {} of {} record(s) failed to submit",
                index,
                submission.failures(),
                machines.len()
            );
        }

        ZoneReport {
            index,
            driver: zone.provider().kind(),
            protocol: zone.inventory().protocol(),
            discovered: machines.into_iter().map(|m| m.fqdn).collect(),
            submission,
        }
    }
}
