//! Configuration types for the IDB reconciliation system
//!
//! The configuration is a JSON document of the form:
//!
//! ```json
//! {
//!   "zones": [
//!     {
//!       "idb": {"version": 3, "url": "https://idb.example.org/api/v3", "token": "...",
//!               "create": true, "verify": true},
//!       "driver": {"name": "libvirt", "hosts": [{"name": "kvm01", "user": "root"}]}
//!     },
//!     {
//!       "idb": {"version": 2, "url": "https://idb.example.org/api/v2", "token": "...",
//!               "chunksize": 25},
//!       "driver": {"name": "digitalocean", "token": "...", "version": "v2"}
//!     }
//!   ]
//! }
//! ```
//!
//! Zone blocks are parsed by hand rather than through `serde` derives so that
//! every failure names the offending key. The `idb` block is always resolved
//! before the `driver` block.

use serde_json::Value;

use crate::error::{Error, Result};

/// Default number of machines per protocol-v2 request
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Whole adapter configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaasConfig {
    /// Zones, in the order they are reconciled
    pub zones: Vec<ZoneConfig>,
}

impl IaasConfig {
    /// Parse the configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse the configuration from an already decoded JSON value
    ///
    /// Every zone is validated here; the first bad zone aborts parsing.
    pub fn from_value(value: &Value) -> Result<Self> {
        let zones = value
            .get("zones")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::config("configuration has no `zones` array"))?;

        let zones = zones
            .iter()
            .map(ZoneConfig::from_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { zones })
    }
}

/// One zone: a provider endpoint plus the inventory backend it reports to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneConfig {
    /// The zone's `idb` block
    pub inventory: InventoryConfig,
    /// The zone's `driver` block
    pub driver: DriverConfig,
}

impl ZoneConfig {
    /// Parse one zone block
    pub fn from_value(value: &Value) -> Result<Self> {
        // Top-level `create`/`verify` keys are superseded by the ones in `idb`
        // and deliberately not read here.
        let idb = value
            .get("idb")
            .ok_or_else(|| Error::invalid_zone_config("idb"))?;
        let inventory = InventoryConfig::from_value(idb)?;

        let driver = value
            .get("driver")
            .ok_or_else(|| Error::invalid_zone_config("driver"))?;
        let driver = DriverConfig::from_value(driver)?;

        Ok(Self { inventory, driver })
    }
}

/// Inventory backend protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Bulk/chunked overwrite with `PUT /machines`
    V2,
    /// Per-record probe, create and update
    V3,
}

impl ProtocolVersion {
    /// Parse the `idb.version` value (`2`, `3`, `"2"` or `"3"`)
    fn from_value(value: &Value) -> Option<Self> {
        let version = match value {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };

        match version {
            2 => Some(ProtocolVersion::V2),
            3 => Some(ProtocolVersion::V3),
            _ => None,
        }
    }

    /// Numeric version
    pub fn number(&self) -> u8 {
        match self {
            ProtocolVersion::V2 => 2,
            ProtocolVersion::V3 => 3,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// A zone's `idb` block
#[derive(Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    /// Base URL of the IDB API
    pub url: String,
    /// API token sent as `X-IDB-API-Token`
    pub token: String,
    /// Protocol generation
    pub protocol: ProtocolVersion,
    /// Create machines the IDB does not know yet
    pub create: bool,
    /// Verify the backend's TLS certificate chain
    pub verify: bool,
    /// Machines per request (protocol v2 only)
    pub chunk_size: usize,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryConfig")
            .field("url", &self.url)
            .field("token", &"<REDACTED>")
            .field("protocol", &self.protocol)
            .field("create", &self.create)
            .field("verify", &self.verify)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl InventoryConfig {
    /// Create an inventory configuration with defaults for the optional keys
    pub fn new(url: impl Into<String>, token: impl Into<String>, protocol: ProtocolVersion) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            protocol,
            create: false,
            verify: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Enable or disable machine creation
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Enable or disable TLS verification
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Set the v2 chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Parse an `idb` block
    pub fn from_value(value: &Value) -> Result<Self> {
        let protocol = value
            .get("version")
            .and_then(ProtocolVersion::from_value)
            .ok_or_else(|| Error::invalid_zone_config("idb.version"))?;

        let url = required_str(value, "idb", "url")?;
        let token = required_str(value, "idb", "token")?;
        let create = optional_bool(value, "idb", "create", false)?;
        let verify = optional_bool(value, "idb", "verify", true)?;

        let chunk_size = match value.get("chunksize") {
            None | Some(Value::Null) => DEFAULT_CHUNK_SIZE,
            Some(v) => v
                .as_u64()
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .ok_or_else(|| Error::invalid_zone_config("idb.chunksize"))?,
        };

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            token,
            protocol,
            create,
            verify,
            chunk_size,
        })
    }
}

/// Supported provider drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// libvirt hypervisors reached over SSH
    Libvirt,
    /// DigitalOcean droplets
    DigitalOcean,
}

impl DriverKind {
    /// Name used in the `driver.name` key
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Libvirt => "libvirt",
            DriverKind::DigitalOcean => "digitalocean",
        }
    }

    /// Look a driver up by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "libvirt" => Some(DriverKind::Libvirt),
            "digitalocean" => Some(DriverKind::DigitalOcean),
            _ => None,
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One libvirt host of a zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibvirtHost {
    /// Hostname to SSH into
    pub name: String,
    /// Login user on that host
    pub user: String,
}

impl LibvirtHost {
    /// Create a host descriptor
    pub fn new(name: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user: user.into(),
        }
    }

    /// Management URI for this host
    pub fn uri(&self) -> String {
        format!("qemu+ssh://{}@{}/system", self.user, self.name)
    }
}

/// A zone's `driver` block
#[derive(Clone, PartialEq, Eq)]
pub enum DriverConfig {
    /// libvirt hypervisor fleet
    Libvirt {
        /// Hosts, in enumeration order
        hosts: Vec<LibvirtHost>,
    },

    /// DigitalOcean account
    DigitalOcean {
        /// DigitalOcean API token
        token: String,
        /// DigitalOcean API version
        version: String,
    },
}

// Custom Debug implementation that hides the DigitalOcean token
impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverConfig::Libvirt { hosts } => {
                f.debug_struct("Libvirt").field("hosts", hosts).finish()
            }
            DriverConfig::DigitalOcean { version, .. } => f
                .debug_struct("DigitalOcean")
                .field("token", &"<REDACTED>")
                .field("version", version)
                .finish(),
        }
    }
}

impl DriverConfig {
    /// Parse a `driver` block
    pub fn from_value(value: &Value) -> Result<Self> {
        let name = match value.get("name") {
            Some(Value::String(name)) => name.as_str(),
            Some(other) => return Err(Error::unknown_driver(other.to_string())),
            None => return Err(Error::unknown_driver("<none>")),
        };

        match DriverKind::from_name(name) {
            Some(DriverKind::Libvirt) => {
                let hosts = value
                    .get("hosts")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::invalid_zone_config("driver.hosts"))?;

                let hosts = hosts
                    .iter()
                    .enumerate()
                    .map(|(i, host)| {
                        let path = format!("driver.hosts[{}]", i);
                        Ok(LibvirtHost {
                            name: required_str(host, &path, "name")?,
                            user: required_str(host, &path, "user")?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(DriverConfig::Libvirt { hosts })
            }
            Some(DriverKind::DigitalOcean) => Ok(DriverConfig::DigitalOcean {
                token: required_str(value, "driver", "token")?,
                version: required_str(value, "driver", "version")?,
            }),
            None => Err(Error::unknown_driver(name)),
        }
    }

    /// Which driver this block selects
    pub fn kind(&self) -> DriverKind {
        match self {
            DriverConfig::Libvirt { .. } => DriverKind::Libvirt,
            DriverConfig::DigitalOcean { .. } => DriverKind::DigitalOcean,
        }
    }
}

fn required_str(value: &Value, path: &str, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_zone_config(format!("{}.{}", path, key)))
}

fn optional_bool(value: &Value, path: &str, key: &str, default: bool) -> Result<bool> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(Error::invalid_zone_config(format!("{}.{}", path, key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn idb_block() -> Value {
        json!({"version": 3, "url": "https://idb.example.org/api/", "token": "idbtoken"})
    }

    #[test]
    fn test_libvirt_zone_keeps_host_order() {
        let zone = ZoneConfig::from_value(&json!({
            "idb": idb_block(),
            "driver": {
                "name": "libvirt",
                "hosts": [
                    {"name": "host0.example.org", "user": "testuser0"},
                    {"name": "host1.example.org", "user": "testuser1"},
                ]
            }
        }))
        .unwrap();

        assert_eq!(
            zone.driver,
            DriverConfig::Libvirt {
                hosts: vec![
                    LibvirtHost::new("host0.example.org", "testuser0"),
                    LibvirtHost::new("host1.example.org", "testuser1"),
                ]
            }
        );
    }

    #[test]
    fn test_digitalocean_zone() {
        let zone = ZoneConfig::from_value(&json!({
            "idb": idb_block(),
            "driver": {"name": "digitalocean", "token": "testtoken", "version": "v2"}
        }))
        .unwrap();

        assert_eq!(zone.driver.kind(), DriverKind::DigitalOcean);
        assert_eq!(
            zone.driver,
            DriverConfig::DigitalOcean {
                token: "testtoken".to_string(),
                version: "v2".to_string(),
            }
        );
    }

    #[test]
    fn test_inventory_defaults() {
        let inventory = InventoryConfig::from_value(&json!({
            "version": 2, "url": "https://idb.example.org/", "token": "t"
        }))
        .unwrap();

        assert_eq!(inventory.protocol, ProtocolVersion::V2);
        assert_eq!(inventory.url, "https://idb.example.org");
        assert!(!inventory.create);
        assert!(inventory.verify);
        assert_eq!(inventory.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_inventory_explicit_flags() {
        let inventory = InventoryConfig::from_value(&json!({
            "version": "3", "url": "u", "token": "t",
            "create": true, "verify": false, "chunksize": 25
        }))
        .unwrap();

        assert_eq!(inventory.protocol, ProtocolVersion::V3);
        assert!(inventory.create);
        assert!(!inventory.verify);
        assert_eq!(inventory.chunk_size, 25);
    }

    #[test]
    fn test_top_level_flags_are_ignored() {
        let zone = ZoneConfig::from_value(&json!({
            "create": true,
            "verify": false,
            "idb": idb_block(),
            "driver": {"name": "digitalocean", "token": "t", "version": "v2"}
        }))
        .unwrap();

        assert!(!zone.inventory.create);
        assert!(zone.inventory.verify);
    }

    #[test]
    fn test_unknown_protocol_version() {
        for version in [json!(1), json!(4), json!("v3"), json!(null)] {
            let err = InventoryConfig::from_value(&json!({
                "version": version, "url": "u", "token": "t"
            }))
            .unwrap_err();
            assert!(
                matches!(err, Error::InvalidZoneConfig { ref key } if key == "idb.version"),
                "unexpected error: {}",
                err
            );
        }
    }

    #[test]
    fn test_missing_inventory_keys_are_named() {
        let err = InventoryConfig::from_value(&json!({"version": 2, "token": "t"})).unwrap_err();
        assert!(matches!(err, Error::InvalidZoneConfig { ref key } if key == "idb.url"));

        let err = InventoryConfig::from_value(&json!({"version": 2, "url": "u"})).unwrap_err();
        assert!(matches!(err, Error::InvalidZoneConfig { ref key } if key == "idb.token"));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let err = InventoryConfig::from_value(&json!({
            "version": 2, "url": "u", "token": "t", "chunksize": 0
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidZoneConfig { ref key } if key == "idb.chunksize"));
    }

    #[test]
    fn test_unknown_or_missing_driver_name() {
        for driver in [
            json!({"name": "vmware"}),
            json!({"token": "t"}),
            json!({"name": 7}),
        ] {
            let err = ZoneConfig::from_value(&json!({"idb": idb_block(), "driver": driver}))
                .unwrap_err();
            assert!(matches!(err, Error::UnknownDriver(_)), "unexpected error: {}", err);
        }
    }

    #[test]
    fn test_inventory_block_is_checked_before_driver() {
        let err = ZoneConfig::from_value(&json!({
            "idb": {"version": 9, "url": "u", "token": "t"},
            "driver": {"name": "vmware"}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidZoneConfig { ref key } if key == "idb.version"));

        let err = ZoneConfig::from_value(&json!({"driver": {"name": "libvirt", "hosts": []}}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidZoneConfig { ref key } if key == "idb"));
    }

    #[test]
    fn test_missing_driver_keys_are_named() {
        let err = ZoneConfig::from_value(&json!({"idb": idb_block()})).unwrap_err();
        assert!(matches!(err, Error::InvalidZoneConfig { ref key } if key == "driver"));

        let err = ZoneConfig::from_value(&json!({
            "idb": idb_block(),
            "driver": {"name": "libvirt"}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidZoneConfig { ref key } if key == "driver.hosts"));

        let err = ZoneConfig::from_value(&json!({
            "idb": idb_block(),
            "driver": {"name": "libvirt", "hosts": [{"name": "h0", "user": "u"}, {"name": "h1"}]}
        }))
        .unwrap_err();
        assert!(
            matches!(err, Error::InvalidZoneConfig { ref key } if key == "driver.hosts[1].user")
        );

        let err = ZoneConfig::from_value(&json!({
            "idb": idb_block(),
            "driver": {"name": "digitalocean", "token": "t"}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidZoneConfig { ref key } if key == "driver.version"));
    }

    #[test]
    fn test_libvirt_host_uri() {
        let host = LibvirtHost::new("host.example.org", "testuser");
        assert_eq!(host.uri(), "qemu+ssh://testuser@host.example.org/system");
    }

    #[test]
    fn test_tokens_not_exposed_in_debug() {
        let inventory = InventoryConfig::new("u", "secret_idb_token", ProtocolVersion::V2);
        let driver = DriverConfig::DigitalOcean {
            token: "secret_do_token".to_string(),
            version: "v2".to_string(),
        };

        assert!(!format!("{:?}", inventory).contains("secret_idb_token"));
        assert!(!format!("{:?}", driver).contains("secret_do_token"));
    }

    #[test]
    fn test_config_requires_zones() {
        assert!(matches!(
            IaasConfig::from_value(&json!({})).unwrap_err(),
            Error::Config(_)
        ));

        let config = IaasConfig::from_json_str(r#"{"zones": []}"#).unwrap();
        assert!(config.zones.is_empty());
    }
}
