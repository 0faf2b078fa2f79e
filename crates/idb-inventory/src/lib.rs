// # IDB Inventory Clients
//
// This crate provides the HTTP clients that submit machine records to the
// IDB, one per backend protocol generation:
//
// - **v2** ([`InventoryClientV2`]): bulk overwrite. Records are sent in
//   chunks with `PUT /machines`; the backend decides per record whether to
//   create or update.
// - **v3** ([`InventoryClientV3`]): per-record reconcile. Each record is
//   probed with `GET /machines/{fqdn}`, then updated with
//   `PUT /machines/{fqdn}` or created with `POST /machines`.
//
// ## Behavior Shared By Both Clients
//
// - One request per chunk (v2) or per probe/write (v3), sent sequentially
// - No retry, no rollback: failures are logged and the next chunk/record is
//   attempted
// - `X-IDB-API-Token` on every request; the token never appears in logs
// - TLS certificate verification follows the zone's `verify` flag
//
// ## API Reference
//
// | Protocol | Method | Path               | Body                                   |
// |----------|--------|--------------------|----------------------------------------|
// | v2       | PUT    | `/machines`        | `{"create_machine": bool, "machines": [...]}` |
// | v3       | GET    | `/machines/{fqdn}` | (none)                                 |
// | v3       | POST   | `/machines`        | record                                 |
// | v3       | PUT    | `/machines/{fqdn}` | record                                 |

mod v2;
mod v3;

pub use v2::InventoryClientV2;
pub use v3::InventoryClientV3;

use idb_core::config::{InventoryConfig, ProtocolVersion};
use idb_core::traits::{InventoryClient, InventoryClientFactory};
use idb_core::{Error, Registry, Result};
use std::time::Duration;

/// Header carrying the IDB API token
pub const TOKEN_HEADER: &str = "X-IDB-API-Token";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by all requests of one inventory client
fn http_client(verify: bool) -> Result<reqwest::Client> {
    if !verify {
        tracing::warn!("TLS certificate verification disabled for IDB requests");
    }

    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .danger_accept_invalid_certs(!verify)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-2xx response into an inventory error, keeping the body for logs
async fn status_error(response: reqwest::Response, what: &str) -> Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status.as_u16() {
        401 | 403 => Error::inventory(format!(
            "{}: authentication failed, check the IDB API token. Status: {}",
            what, status
        )),
        500..=599 => Error::inventory(format!(
            "{}: IDB server error: {} - {}",
            what, status, body
        )),
        _ => Error::inventory(format!("{}: {} - {}", what, status, body)),
    }
}

/// Factory for creating inventory clients
pub struct InventoryFactory;

impl InventoryClientFactory for InventoryFactory {
    fn create(&self, config: &InventoryConfig) -> Result<Box<dyn InventoryClient>> {
        if config.token.is_empty() {
            return Err(Error::config("IDB API token is required"));
        }

        Ok(match config.protocol {
            ProtocolVersion::V2 => Box::new(InventoryClientV2::from_config(config)?),
            ProtocolVersion::V3 => Box::new(InventoryClientV3::from_config(config)?),
        })
    }
}

/// Register both protocol generations with a registry
///
/// # Example
///
/// ```rust
/// use idb_core::{ProtocolVersion, Registry};
///
/// let mut registry = Registry::new();
/// idb_inventory::register(&mut registry);
/// assert!(registry.has_inventory(ProtocolVersion::V2));
/// assert!(registry.has_inventory(ProtocolVersion::V3));
/// ```
pub fn register(registry: &mut Registry) {
    registry.register_inventory(ProtocolVersion::V2, Box::new(InventoryFactory));
    registry.register_inventory(ProtocolVersion::V3, Box::new(InventoryFactory));
}
