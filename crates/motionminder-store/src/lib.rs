//! # Motion Minder Store
//!
//! Persistent per-axis odometer and maintenance-threshold state with
//! atomic per-axis updates and crash-consistent snapshot writes.

pub mod record;
pub mod store;

pub use record::OdometerRecord;
pub use store::{delete_store, OdometerStore};
