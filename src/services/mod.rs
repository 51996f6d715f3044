//! Services - clearance geometry and measurement state
//!
//! This module contains the core business logic services:
//! - `bend_radius` - Radius of curvature from the encoder chords
//! - `excess` - Center and end excess from the bend radius
//! - `envelope` - Envelope reference store and active-envelope transform
//! - `clearance` - Per-point clearance against the active envelope
//! - `profile` - Profile aggregate and its recomputation cascade
//! - `report` - Clearance report for display and export
//! - `session` - Reading dispatcher driving one profile

pub mod bend_radius;
pub mod clearance;
pub mod envelope;
pub mod excess;
pub mod profile;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use bend_radius::calculate_bend_radius;
pub use clearance::{calculate_clearances, ClearanceEvaluator, ClearanceResult, ClearanceSummary};
pub use envelope::{adjust_envelope, ActiveEnvelope, EnvelopeStore};
pub use excess::calculate_excess;
pub use profile::{Profile, SharedProfile};
pub use report::ProfileReport;
pub use session::{Outcome, Session};
