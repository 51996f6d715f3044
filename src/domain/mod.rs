//! Domain models - core measurement types
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - divisions, curve sides, encoders, bend radius, excess, points
//! - `command` - profile mutations, their recomputation cascade, device commands
//! - `reading` - sensor readings decoded from device topics
//! - `record` - flat persistence record and scan-point string codec
//! - `error` - engine and decode errors

pub mod command;
pub mod error;
pub mod reading;
pub mod record;
pub mod types;

// Re-export commonly used types at module level
pub use command::{DeviceCommand, Mutation, Recompute};
pub use error::{DecodeError, GeometryError};
pub use reading::{DeviceTopics, SensorReading};
pub use record::{ProfileIdentity, ProfileRecord};
