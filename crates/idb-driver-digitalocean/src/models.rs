//! DigitalOcean API response models
//!
//! Only the fields the inventory needs are modeled; everything else in the
//! droplet object is ignored.

use serde::Deserialize;

/// Droplet (instance) from the API
#[derive(Debug, Clone, Deserialize)]
pub struct Droplet {
    /// Droplet name, used as the fqdn
    pub name: String,
    /// Memory in MB
    #[serde(default)]
    pub memory: Option<u64>,
    /// vCPU count
    #[serde(default)]
    pub vcpus: Option<u32>,
}

/// `GET /droplets` response
#[derive(Debug, Deserialize)]
pub struct DropletListResponse {
    /// Droplets on this page
    pub droplets: Vec<Droplet>,
    /// Links for pagination
    #[serde(default)]
    pub links: Option<Links>,
}

impl DropletListResponse {
    /// Absolute URL of the next page, if any
    pub fn next_page(&self) -> Option<&str> {
        self.links
            .as_ref()?
            .pages
            .as_ref()?
            .next
            .as_deref()
    }
}

/// Pagination links
#[derive(Debug, Clone, Deserialize)]
pub struct Links {
    /// Pages
    #[serde(default)]
    pub pages: Option<Pages>,
}

/// Page links
#[derive(Debug, Clone, Deserialize)]
pub struct Pages {
    /// Next page
    #[serde(default)]
    pub next: Option<String>,
}
