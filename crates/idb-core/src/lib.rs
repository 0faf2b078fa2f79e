// # idb-core
//
// Core library for reconciling virtual-machine inventory against the IDB.
//
// ## Architecture Overview
//
// - **MachineRecord**: Normalized description of one discovered machine
// - **ComputeDriver**: Capability contract for provider drivers (connect, list, identify)
// - **ProviderZone**: Enumerates one provider endpoint (libvirt fleet or DigitalOcean)
// - **InventoryClient**: Submits records using the backend's protocol generation (v2/v3)
// - **Zone**: A provider zone bound to its inventory client by configuration
// - **ReconciliationRun**: Drives enumerate → submit over every zone
// - **Registry**: Maps driver kinds and protocol versions to implementations
//
// ## Design Principles
//
// 1. **Read-only providers**: Zones enumerate, they never mutate machines
// 2. **Failure isolation**: Hosts, zones, chunks and records fail independently
// 3. **Eager configuration**: Every zone is validated before any network call
// 4. **Composition**: Enumeration and submission are selected independently

pub mod config;
pub mod engine;
pub mod error;
pub mod machine;
pub mod registry;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{
    DriverConfig, DriverKind, IaasConfig, InventoryConfig, LibvirtHost, ProtocolVersion, ZoneConfig,
};
pub use engine::{ReconciliationRun, RunReport, ZoneReport};
pub use error::{Error, Result};
pub use machine::MachineRecord;
pub use registry::Registry;
pub use traits::{ComputeDriver, ComputeSession, InventoryClient, RecordOutcome, SubmitReport};
pub use zone::{DigitalOceanZone, LibvirtZone, ProviderZone, Zone};
