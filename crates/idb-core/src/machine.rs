//! Normalized machine records
//!
//! A [`MachineRecord`] is what every provider zone produces and what every
//! inventory client consumes. Its serialized form is the record object the
//! IDB API expects in both protocol generations:
//!
//! ```json
//! {"fqdn": "vm1.example.org", "vmhost": "kvm01", "device_type_id": 2, "cores": 2, "ram": 2048}
//! ```

use serde::{Deserialize, Serialize};

/// Device type the IDB uses for virtual machines
pub const VIRTUAL_MACHINE_DEVICE_TYPE: u32 = 2;

/// One discovered machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    /// Identifying key, also the remote resource identifier
    pub fqdn: String,

    /// Host the machine runs on; empty for public cloud
    #[serde(rename = "vmhost")]
    pub hypervisor_host: String,

    /// Always [`VIRTUAL_MACHINE_DEVICE_TYPE`]
    pub device_type_id: u32,

    /// Number of virtual CPUs, when the provider reports it
    #[serde(rename = "cores", skip_serializing_if = "Option::is_none", default)]
    pub cpu_count: Option<u32>,

    /// Memory in MiB, when the provider reports it
    #[serde(rename = "ram", skip_serializing_if = "Option::is_none", default)]
    pub memory_mb: Option<u64>,
}

impl MachineRecord {
    /// Create a record without capacity attributes
    pub fn new(fqdn: impl Into<String>, hypervisor_host: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            hypervisor_host: hypervisor_host.into(),
            device_type_id: VIRTUAL_MACHINE_DEVICE_TYPE,
            cpu_count: None,
            memory_mb: None,
        }
    }

    /// Set the CPU count
    pub fn with_cpu_count(mut self, cpu_count: Option<u32>) -> Self {
        self.cpu_count = cpu_count;
        self
    }

    /// Set the memory size in MiB
    pub fn with_memory_mb(mut self, memory_mb: Option<u64>) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    /// Records without an fqdn are never sent to the IDB
    pub fn is_submittable(&self) -> bool {
        !self.fqdn.trim().is_empty()
    }
}
