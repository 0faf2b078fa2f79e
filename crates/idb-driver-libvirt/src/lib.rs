// # libvirt Compute Driver
//
// This crate lets a libvirt zone talk to its hypervisors through the `virsh`
// command line client.
//
// ## How It Works
//
// Every call runs `virsh -c <uri> <command>` as a child process, so the
// usual `qemu+ssh://user@host/system` URIs work with whatever SSH keys and
// agent the calling user has. The driver only reads:
//
// | Capability      | virsh command          | Parsed from                    |
// |-----------------|------------------------|--------------------------------|
// | connect         | `uri`                  | exit status                    |
// | host identity   | `hostname`             | first line of stdout           |
// | list instances  | `list --all --name`    | one domain name per line       |
// | instance detail | `dominfo --domain <n>` | `CPU(s)` and `Used memory`     |
//
// ## Failure Model
//
// A command that cannot be spawned, exits non-zero or runs past the timeout
// is a driver error. The zone decides what that means for the host; the
// driver never retries. The one exception is `dominfo`: a domain whose
// details cannot be read (it may have vanished since `list`) is still
// reported, by name only.

use async_trait::async_trait;
use idb_core::traits::{ComputeDriver, ComputeSession, Endpoint, InstanceInfo};
use idb_core::{DriverKind, Error, Registry, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Driver name used in errors and logs
const DRIVER_NAME: &str = "libvirt";

/// Default `virsh` executable, resolved through `PATH`
pub const DEFAULT_VIRSH: &str = "virsh";

/// Default limit for a single virsh invocation (60 seconds)
///
/// SSH connection setup dominates; the commands themselves are cheap.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Compute driver backed by the `virsh` CLI
#[derive(Debug, Clone)]
pub struct VirshDriver {
    /// Program to execute
    program: String,

    /// Per-command timeout
    timeout: Duration,
}

impl VirshDriver {
    /// Create a driver using `virsh` from `PATH`
    pub fn new() -> Self {
        Self {
            program: DEFAULT_VIRSH.to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Use a different virsh executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Override the per-command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for VirshDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputeDriver for VirshDriver {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ComputeSession>> {
        let uri = match endpoint {
            Endpoint::Hypervisor { uri } => uri.clone(),
            Endpoint::Cloud { .. } => {
                return Err(Error::driver(
                    DRIVER_NAME,
                    "cloud endpoints are not supported, expected a hypervisor URI",
                ));
            }
        };

        let session = VirshSession {
            program: self.program.clone(),
            uri,
            timeout: self.timeout,
        };

        // `virsh uri` opens and closes a connection, which is enough to
        // surface unreachable hosts and rejected logins up front.
        session.virsh(&["uri"]).await?;

        Ok(Box::new(session))
    }

    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }
}

/// One hypervisor reached through `virsh -c <uri>`
#[derive(Debug, Clone)]
pub struct VirshSession {
    program: String,
    uri: String,
    timeout: Duration,
}

impl VirshSession {
    /// Run a virsh command against this session's URI and return stdout
    async fn virsh(&self, args: &[&str]) -> Result<String> {
        debug!(uri = %self.uri, "{} -c {} {}", self.program, self.uri, args.join(" "));

        let child = Command::new(&self.program)
            .arg("-c")
            .arg(&self.uri)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::driver(
                    DRIVER_NAME,
                    format!(
                        "`virsh {}` against {} timed out after {:?}",
                        args.join(" "),
                        self.uri,
                        self.timeout
                    ),
                )
            })?
            .map_err(|e| {
                Error::driver(
                    DRIVER_NAME,
                    format!("Failed to execute {}: {}", self.program, e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::driver(
                DRIVER_NAME,
                format!(
                    "`virsh {}` against {} failed ({}): {}",
                    args.join(" "),
                    self.uri,
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Details for one domain
    async fn describe(&self, name: &str) -> Result<InstanceInfo> {
        let text = self.virsh(&["dominfo", "--domain", name]).await?;
        let details = parse_dominfo(&text);

        if details.cpu.is_none() || details.memory_mb.is_none() {
            warn!("Incomplete dominfo for {} on {}", name, self.uri);
        }

        Ok(InstanceInfo {
            name: name.to_string(),
            host_hint: None,
            cpu: details.cpu,
            memory_mb: details.memory_mb,
        })
    }
}

#[async_trait]
impl ComputeSession for VirshSession {
    async fn list_instances(&self) -> Result<Vec<InstanceInfo>> {
        let text = self.virsh(&["list", "--all", "--name"]).await?;

        let mut instances = Vec::new();
        for name in parse_domain_names(&text) {
            match self.describe(name).await {
                Ok(instance) => instances.push(instance),
                Err(e) => {
                    warn!("No details for {} on {}: {}", name, self.uri, e);
                    instances.push(InstanceInfo::named(name));
                }
            }
        }

        Ok(instances)
    }

    async fn host_identity(&self) -> Result<Option<String>> {
        let text = self.virsh(&["hostname"]).await?;
        Ok(text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }
}

/// Capacity fields read from `virsh dominfo`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DomainDetails {
    cpu: Option<u32>,
    memory_mb: Option<u64>,
}

/// Domain names from `virsh list --all --name`, one per non-blank line
fn parse_domain_names(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Read `CPU(s)` and `Used memory` from `virsh dominfo` output
///
/// ```text
/// Id:             3
/// Name:           vm1.example.org
/// CPU(s):         2
/// Max memory:     4194304 KiB
/// Used memory:    2097152 KiB
/// ```
fn parse_dominfo(text: &str) -> DomainDetails {
    let mut details = DomainDetails::default();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        match key.trim() {
            "CPU(s)" => details.cpu = value.trim().parse().ok(),
            "Used memory" => details.memory_mb = parse_memory_mb(value),
            _ => {}
        }
    }

    details
}

/// Convert a virsh memory value such as `2097152 KiB` to MiB
fn parse_memory_mb(value: &str) -> Option<u64> {
    let mut parts = value.split_whitespace();
    let amount: u64 = parts.next()?.parse().ok()?;

    match parts.next().unwrap_or("KiB") {
        "KiB" => Some(amount / 1024),
        "MiB" => Some(amount),
        "GiB" => amount.checked_mul(1024),
        _ => None,
    }
}

/// Register the libvirt driver with a registry
pub fn register(registry: &mut Registry) {
    registry.register_driver(DriverKind::Libvirt, Arc::new(VirshDriver::new()));
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMINFO: &str = "\
Id:             3
Name:           vm1.example.org
UUID:           4a1a0c5e-2d0f-4bd0-9a5c-1f3d3c1b7e10
OS Type:        hvm
State:          running
CPU(s):         2
CPU time:       1234.5s
Max memory:     4194304 KiB
Used memory:    2097152 KiB
Persistent:     yes
Autostart:      enable
";

    #[test]
    fn test_parse_dominfo() {
        assert_eq!(
            parse_dominfo(DOMINFO),
            DomainDetails {
                cpu: Some(2),
                memory_mb: Some(2048),
            }
        );
    }

    #[test]
    fn test_parse_dominfo_missing_fields() {
        let details = parse_dominfo("Name:           vm1\nState:          shut off\n");
        assert_eq!(details, DomainDetails::default());
    }

    #[test]
    fn test_parse_memory_units() {
        assert_eq!(parse_memory_mb(" 1048576 KiB"), Some(1024));
        assert_eq!(parse_memory_mb("512 MiB"), Some(512));
        assert_eq!(parse_memory_mb("2 GiB"), Some(2048));
        assert_eq!(parse_memory_mb("lots"), None);
        assert_eq!(parse_memory_mb("12 bytes"), None);
        assert_eq!(parse_memory_mb(&format!("{} GiB", u64::MAX)), None);
    }

    #[test]
    fn test_parse_domain_names() {
        let text = "vm1.example.org\nvm2.example.org\n\n";
        assert_eq!(
            parse_domain_names(text),
            vec!["vm1.example.org", "vm2.example.org"]
        );
        assert!(parse_domain_names("\n").is_empty());
    }

    #[tokio::test]
    async fn test_connect_rejects_cloud_endpoint() {
        let driver = VirshDriver::new();
        let endpoint = Endpoint::Cloud {
            token: "t".to_string(),
            api_version: "v2".to_string(),
        };

        let err = driver.connect(&endpoint).await.err().unwrap();
        assert!(matches!(err, Error::Driver { .. }));
    }

    #[tokio::test]
    async fn test_connect_missing_program() {
        let driver = VirshDriver::new().with_program("/nonexistent/virsh");
        let endpoint = Endpoint::Hypervisor {
            uri: "qemu+ssh://root@kvm01/system".to_string(),
        };

        let err = driver.connect(&endpoint).await.err().unwrap();
        assert!(err.to_string().contains("Failed to execute"));
    }

    /// Shell stand-in for virsh
    ///
    /// The driver runs `<program> -c <uri> <args>`; with `sh` as the program
    /// the URI slot carries this script and the virsh arguments arrive as
    /// `$0 $1 $2`. `vm2` vanishes between `list` and `dominfo`.
    const FAKE_VIRSH: &str = r#"
case "$0" in
  uri) echo "qemu+ssh://root@kvm01/system" ;;
  hostname) echo "kvm01.example.org" ;;
  list) printf 'vm1\nvm2\n' ;;
  dominfo)
    [ "$1" = "--domain" ] || exit 2
    if [ "$2" = "vm1" ]; then
      printf 'Name:           vm1\nCPU(s):         2\nUsed memory:    2097152 KiB\n'
    else
      echo "error: failed to get domain '$2'" >&2
      exit 1
    fi ;;
  *) exit 1 ;;
esac
"#;

    fn fake_session(script: &str) -> VirshSession {
        VirshSession {
            program: "sh".to_string(),
            uri: script.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_instances_keeps_domains_without_details() {
        let instances = fake_session(FAKE_VIRSH).list_instances().await.unwrap();

        assert_eq!(
            instances,
            vec![
                InstanceInfo {
                    name: "vm1".to_string(),
                    host_hint: None,
                    cpu: Some(2),
                    memory_mb: Some(2048),
                },
                InstanceInfo::named("vm2"),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_and_identify_through_program() {
        let driver = VirshDriver::new().with_program("sh");
        let endpoint = Endpoint::Hypervisor {
            uri: FAKE_VIRSH.to_string(),
        };

        let session = driver.connect(&endpoint).await.unwrap();
        assert_eq!(
            session.host_identity().await.unwrap(),
            Some("kvm01.example.org".to_string())
        );
        assert_eq!(session.list_instances().await.unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_listing_is_an_error() {
        let session = fake_session("echo 'error: failed to connect' >&2; exit 1");

        let err = session.list_instances().await.unwrap_err();
        assert!(err.to_string().contains("failed to connect"));
    }

    #[test]
    fn test_register() {
        let mut registry = Registry::new();
        register(&mut registry);
        assert!(registry.has_driver(DriverKind::Libvirt));
        assert!(!registry.has_driver(DriverKind::DigitalOcean));
    }
}
