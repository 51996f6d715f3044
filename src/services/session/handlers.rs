//! Reading handlers for the Session
//!
//! Each handler applies one kind of reading to the profile and emits the
//! matching log events and metrics. The profile lock is never held across an
//! await point.

use super::{Outcome, Session};
use crate::domain::command::{Mutation, Recompute};
use crate::domain::types::{EncoderSide, ImageSide, ScanPoint};
use crate::services::clearance::ClearanceSummary;
use tracing::{debug, info, warn};

impl Session {
    /// Apply a mutation and count the envelope rebuild it caused
    fn apply(&mut self, mutation: Mutation) -> Recompute {
        let cascade = self.profile.lock().apply(mutation);
        if cascade >= Recompute::Envelope {
            self.metrics.record_envelope_recompute();
        }
        cascade
    }

    pub(crate) fn handle_encoder(&mut self, side: EncoderSide, angle_deg: f64) -> Outcome {
        let cascade = self.apply(Mutation::Encoder { side, angle_deg });

        let profile = self.profile.lock();
        match (profile.bend_radius(), profile.last_error()) {
            (Some(radius), _) => info!(
                side = ?side,
                angle_deg = %angle_deg,
                bend_radius = %radius.representative(),
                "encoder_updated"
            ),
            (None, Some(e)) => info!(
                side = ?side,
                angle_deg = %angle_deg,
                pending = %e,
                "encoder_updated"
            ),
            (None, None) => info!(side = ?side, angle_deg = %angle_deg, "encoder_updated"),
        }

        Outcome::Applied(cascade)
    }

    pub(crate) fn handle_super_elevation(&mut self, angle_deg: f64) -> Outcome {
        let cascade = self.apply(Mutation::SuperElevation { angle_deg });

        let (offset_in, lean) = {
            let profile = self.profile.lock();
            let offset_in = profile
                .super_elevation()
                .map(|se| se.offset(self.config.gauge_in()))
                .unwrap_or(0.0);
            let lean = profile
                .super_elevation()
                .zip(profile.curve_side())
                .map(|(se, side)| se.lean(side).as_str());
            (offset_in, lean)
        };
        info!(
            angle_deg = %angle_deg,
            offset_in = format!("{:.3}", offset_in),
            lean = lean.unwrap_or("unknown"),
            "super_elevation_updated"
        );

        Outcome::Applied(cascade)
    }

    /// Record a scan point unless it falls in the dead-zone
    ///
    /// The new point is evaluated immediately so violations surface while
    /// the scan is still running.
    pub(crate) fn handle_scan_point(&mut self, point: ScanPoint) -> Outcome {
        if self.config.deadzone().contains(point.x, point.y) {
            self.metrics.record_deadzone_dropped();
            debug!(x = %point.x, y = %point.y, "scan_point_in_deadzone");
            return Outcome::Dropped;
        }

        let cascade = self.apply(Mutation::ScanPoint(point));
        self.accepted_points += 1;
        self.metrics.record_scan_point();

        let latest = {
            let mut profile = self.profile.lock();
            let total = profile.scan_points().len();
            let results = profile.clearances();
            // Fewer results than points means no envelope to evaluate against
            if results.len() == total {
                results.last().copied()
            } else {
                None
            }
        };

        if let Some(result) = latest {
            if result.is_violation {
                self.metrics.record_violations(1);
                warn!(x = %point.x, y = %point.y, "clearance_violation");
            }
        }

        let every = self.config.progress_every();
        if every > 0 && self.accepted_points % every == 0 {
            let summary = self.profile.lock().summary();
            log_summary("scan_progress", &summary);
        }

        Outcome::Applied(cascade)
    }

    pub(crate) fn handle_scan_complete(&mut self) -> Outcome {
        self.metrics.record_scan_completed();

        let summary = {
            let mut profile = self.profile.lock();
            let summary = profile.summary();
            if let Some(egress) = &self.egress {
                if !egress.save(&mut profile, self.config.gauge_in()) {
                    warn!(profile_id = %profile.id(), "profile_not_saved");
                }
            }
            summary
        };
        log_summary("scan_complete", &summary);

        Outcome::ScanComplete(summary)
    }

    pub(crate) fn handle_image(&mut self, side: ImageSide, data: Vec<u8>) -> Outcome {
        let bytes = data.len();
        let cascade = self.apply(Mutation::Image { side, data });
        info!(side = ?side, bytes = %bytes, "image_received");
        Outcome::Applied(cascade)
    }
}

fn log_summary(event: &'static str, summary: &ClearanceSummary) {
    if summary.envelope_missing {
        warn!(event = event, evaluated = %summary.evaluated, "no_envelope_loaded");
        return;
    }
    info!(
        event = event,
        evaluated = %summary.evaluated,
        violations = %summary.violations,
        min_horizontal = ?summary.min_horizontal,
        min_vertical = ?summary.min_vertical,
        "clearance_summary"
    );
}
