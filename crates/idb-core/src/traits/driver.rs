// # Compute Driver Trait
//
// Defines the capability contract a provider driver must satisfy so that a
// provider zone can enumerate machines through it.
//
// ## Implementations
//
// - libvirt (qemu+ssh via virsh): `idb-driver-libvirt` crate
// - DigitalOcean (REST API v2): `idb-driver-digitalocean` crate
//
// ## Usage
//
// ```rust,ignore
// use idb_core::traits::{ComputeDriver, Endpoint};
//
// let session = driver
//     .connect(&Endpoint::Hypervisor { uri: "qemu+ssh://root@kvm01/system".into() })
//     .await?;
// let host = session.host_identity().await?;
// for instance in session.list_instances().await? {
//     println!("{} on {:?}", instance.name, host);
// }
// ```

use async_trait::async_trait;

/// Where a driver should connect to
#[derive(Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A hypervisor management URI (e.g. `qemu+ssh://user@host/system`)
    Hypervisor {
        /// Management URI
        uri: String,
    },

    /// A token-authenticated cloud API
    Cloud {
        /// API token
        /// ⚠️ NEVER log this value
        token: String,
        /// API version (e.g. "v2")
        api_version: String,
    },
}

// Custom Debug implementation that hides the cloud token
impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Hypervisor { uri } => f.debug_struct("Hypervisor").field("uri", uri).finish(),
            Endpoint::Cloud { api_version, .. } => f
                .debug_struct("Cloud")
                .field("token", &"<REDACTED>")
                .field("api_version", api_version)
                .finish(),
        }
    }
}

/// One instance as reported by a provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceInfo {
    /// Instance name, used as the fqdn
    pub name: String,
    /// Host the provider says the instance runs on, if any
    pub host_hint: Option<String>,
    /// Virtual CPU count
    pub cpu: Option<u32>,
    /// Memory in MiB
    pub memory_mb: Option<u64>,
}

impl InstanceInfo {
    /// Create an instance with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// An open connection to one provider endpoint
#[async_trait]
pub trait ComputeSession: Send + Sync {
    /// List every instance visible through this session
    async fn list_instances(&self) -> Result<Vec<InstanceInfo>, crate::Error>;

    /// Hostname reported by the connected hypervisor
    ///
    /// Cloud sessions have no hypervisor and return `Ok(None)`.
    async fn host_identity(&self) -> Result<Option<String>, crate::Error> {
        Ok(None)
    }
}

/// Trait for provider driver implementations
///
/// Drivers are read-only: they connect and enumerate, never mutate.
/// Transport and authentication errors are returned as-is; the zone that
/// owns the driver decides how far a failure reaches.
#[async_trait]
pub trait ComputeDriver: Send + Sync {
    /// Open a session against `endpoint`
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ComputeSession>, crate::Error>;

    /// Get the driver name (for logging/debugging)
    fn driver_name(&self) -> &'static str;
}
