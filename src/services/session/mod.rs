//! Measurement session and reading dispatch
//!
//! The Session is the single consumer of device readings. It:
//! - Applies each reading to the shared profile through one dispatcher
//! - Drops scan points that fall inside the device dead-zone
//! - Logs clearance progress while a scan is running
//! - Summarizes (and optionally saves) the profile when a scan completes

mod handlers;
#[cfg(test)]
mod tests;

use crate::domain::command::Recompute;
use crate::domain::reading::SensorReading;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::egress::Egress;
use crate::services::clearance::ClearanceSummary;
use crate::services::profile::SharedProfile;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// What a single reading did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Applied to the profile with the given recomputation
    Applied(Recompute),
    /// Scan point inside the dead-zone, not recorded
    Dropped,
    /// End of a scan, with the clearance summary at that moment
    ScanComplete(ClearanceSummary),
}

/// Consumer of device readings for one profile
pub struct Session {
    /// Profile being measured
    pub(crate) profile: SharedProfile,
    /// Application configuration
    pub(crate) config: Config,
    /// Metrics collector
    pub(crate) metrics: Arc<Metrics>,
    /// Saves the profile on scan completion (optional)
    pub(crate) egress: Option<Egress>,
    /// Scan points accepted since the session started
    pub(crate) accepted_points: u64,
}

impl Session {
    pub fn new(profile: SharedProfile, config: Config, metrics: Arc<Metrics>) -> Self {
        Self { profile, config, metrics, egress: None, accepted_points: 0 }
    }

    /// Save record and report whenever a scan completes
    pub fn with_egress(mut self, egress: Egress) -> Self {
        self.egress = Some(egress);
        self
    }

    /// Consume readings until the channel closes or shutdown is signalled
    pub async fn run(
        &mut self,
        mut reading_rx: mpsc::Receiver<SensorReading>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                reading = reading_rx.recv() => {
                    match reading {
                        Some(r) => {
                            self.process_reading(r);
                        }
                        None => break, // Channel closed
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(accepted_points = %self.accepted_points, "session_stopped");
    }

    /// Process a single reading, dispatching to the appropriate handler
    pub fn process_reading(&mut self, reading: SensorReading) -> Outcome {
        let process_start = Instant::now();

        let outcome = match reading {
            SensorReading::Encoder { side, angle_deg } => self.handle_encoder(side, angle_deg),
            SensorReading::SuperElevation { angle_deg } => {
                self.handle_super_elevation(angle_deg)
            }
            SensorReading::ScanPoint(point) => self.handle_scan_point(point),
            SensorReading::ScanComplete => self.handle_scan_complete(),
            SensorReading::Image { side, data } => self.handle_image(side, data),
        };

        // Record processing latency (lock-free)
        let latency_us = process_start.elapsed().as_micros() as u64;
        self.metrics.record_reading_processed(latency_us);

        outcome
    }

    pub fn profile(&self) -> &SharedProfile {
        &self.profile
    }

    /// Scan points accepted since the session started
    pub fn accepted_points(&self) -> u64 {
        self.accepted_points
    }
}
