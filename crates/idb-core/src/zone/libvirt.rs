// # Libvirt Zone
//
// Crawls a list of libvirt hosts for virtual machines.
//
// Each host is reached through its own `qemu+ssh://user@host/system`
// session. Hosts are independent: a host that cannot be reached, refuses the
// login or returns garbage is logged and skipped, and its machines are simply
// missing from this cycle's result.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span};

use crate::config::LibvirtHost;
use crate::error::Result;
use crate::machine::MachineRecord;
use crate::traits::{ComputeDriver, Endpoint};

/// Provider zone backed by a libvirt hypervisor fleet
pub struct LibvirtZone {
    /// Hosts, in enumeration order
    hosts: Vec<LibvirtHost>,

    /// Driver used to open one session per host
    driver: Arc<dyn ComputeDriver>,
}

impl LibvirtZone {
    /// Create a zone over `hosts`
    pub fn new(hosts: Vec<LibvirtHost>, driver: Arc<dyn ComputeDriver>) -> Self {
        Self { hosts, driver }
    }

    /// Configured hosts, in enumeration order
    pub fn hosts(&self) -> &[LibvirtHost] {
        &self.hosts
    }

    /// Enumerate every host, skipping the ones that fail
    pub async fn enumerate(&self) -> Vec<MachineRecord> {
        let mut machines = Vec::new();

        for host in &self.hosts {
            let span = info_span!("host", host = %host.name);

            let found = async {
                match self.enumerate_host(host).await {
                    Ok(found) => found,
                    Err(e) => {
                        error!("LibvirtZone: {}, continuing with next host", e);
                        Vec::new()
                    }
                }
            }
            .instrument(span)
            .await;

            machines.extend(found);
        }

        machines
    }

    /// Enumerate a single host; all-or-nothing
    async fn enumerate_host(&self, host: &LibvirtHost) -> Result<Vec<MachineRecord>> {
        let uri = host.uri();
        info!("LibvirtZone: retrieving nodes from {}", uri);

        let session = self.driver.connect(&Endpoint::Hypervisor { uri }).await?;

        // The hypervisor's own idea of its hostname wins over the configured
        // SSH name, which may be an alias or an address.
        let hypervisor = session
            .host_identity()
            .await?
            .unwrap_or_else(|| host.name.clone());

        let machines = session
            .list_instances()
            .await?
            .into_iter()
            .map(|instance| {
                debug!("LibvirtZone: got node {:?}", instance);
                MachineRecord::new(instance.name, hypervisor.clone())
                    .with_cpu_count(instance.cpu)
                    .with_memory_mb(instance.memory_mb)
            })
            .collect::<Vec<_>>();

        info!(
            "LibvirtZone: {} node(s) on hypervisor {}",
            machines.len(),
            hypervisor
        );

        Ok(machines)
    }
}

impl std::fmt::Debug for LibvirtZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibvirtZone")
            .field("hosts", &self.hosts)
            .field("driver", &self.driver.driver_name())
            .finish()
    }
}
