// # Inventory Client Trait
//
// Defines the interface for submitting machine records to the IDB.
//
// ## Implementations
//
// - Protocol v2 (bulk/chunked overwrite): `idb-inventory` crate
// - Protocol v3 (per-record reconcile): `idb-inventory` crate
//
// ## Failure Isolation
//
// `submit` never fails as a whole. A failing chunk (v2) or record (v3) is
// logged, counted in the returned [`SubmitReport`], and the client moves on.

use async_trait::async_trait;

use crate::config::{InventoryConfig, ProtocolVersion};
use crate::machine::MachineRecord;

/// Terminal state of a single record submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordOutcome {
    /// Sent as part of a chunk that the backend accepted (v2)
    Sent,
    /// Existed and was updated (v3)
    Updated,
    /// Was missing and got created (v3)
    Created,
    /// Not sent: invalid record, or missing with creation disabled
    Skipped,
    /// The request carrying this record failed
    Failed,
}

/// Outcome of one `submit` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    /// Per-record outcomes, in input order
    pub records: Vec<(String, RecordOutcome)>,
    /// Number of HTTP requests issued
    pub requests: usize,
}

impl SubmitReport {
    /// Record an outcome for `fqdn`
    pub fn push(&mut self, fqdn: impl Into<String>, outcome: RecordOutcome) {
        self.records.push((fqdn.into(), outcome));
    }

    /// Number of records that ended in `outcome`
    pub fn count(&self, outcome: RecordOutcome) -> usize {
        self.records.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Number of records that failed
    pub fn failures(&self) -> usize {
        self.count(RecordOutcome::Failed)
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: SubmitReport) {
        self.records.extend(other.records);
        self.requests += other.requests;
    }
}

/// Trait for inventory backend clients
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Submit `machines` using this client's protocol generation
    async fn submit(&self, machines: &[MachineRecord]) -> SubmitReport;

    /// Protocol generation spoken by this client
    fn protocol(&self) -> ProtocolVersion;

    /// Base URL of the backend (for logging)
    fn base_url(&self) -> &str;
}

/// Helper trait for constructing inventory clients from configuration
pub trait InventoryClientFactory: Send + Sync {
    /// Create an InventoryClient instance from a zone's `idb` block
    fn create(&self, config: &InventoryConfig) -> Result<Box<dyn InventoryClient>, crate::Error>;
}
