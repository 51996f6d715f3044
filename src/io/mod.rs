//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `mqtt` - MQTT client for receiving measuring-device readings
//! - `egress` - Profile records (JSONL) and clearance reports (JSON) to file

pub mod egress;
pub mod mqtt;

// Re-export commonly used types
pub use egress::{read_records, Egress};
pub use mqtt::start_device_client;
