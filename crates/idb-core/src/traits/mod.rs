//! Core traits for the IDB reconciliation system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ComputeDriver`]: Connect to a provider and list its instances
//! - [`InventoryClient`]: Submit machine records to the IDB

pub mod driver;
pub mod inventory;

pub use driver::{ComputeDriver, ComputeSession, Endpoint, InstanceInfo};
pub use inventory::{InventoryClient, InventoryClientFactory, RecordOutcome, SubmitReport};
