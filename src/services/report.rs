//! Clearance report for display and export
//!
//! Infinite clearances and radii serialize as JSON `null`.

use crate::domain::record::ProfileIdentity;
use crate::domain::types::{CurveSide, DivisionId, Lean, ScanPoint};
use crate::services::clearance::{signed_boundary_distance, ClearanceResult, ClearanceSummary};
use crate::services::envelope::EnvelopeVertex;
use crate::services::profile::Profile;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Warning shown when no envelope matches the selected division
pub const WARN_NO_ENVELOPE: &str = "no envelope loaded";

/// Super elevation as printed on the report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SuperElevationReport {
    pub angle_deg: f64,
    /// Lateral offset of the high rail (inches)
    pub offset_in: f64,
    pub lean: Option<Lean>,
}

/// Clearance of one scan point with its coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointReport {
    pub point: ScanPoint,
    #[serde(flatten)]
    pub clearance: ClearanceResult,
    pub boundary_distance: Option<f64>,
}

/// Everything the reporting layer prints for one profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileReport {
    pub id: String,
    /// RFC 3339 UTC time the report was produced
    pub generated_at: String,
    #[serde(flatten)]
    pub identity: ProfileIdentity,
    /// Height of the vertical clearance datum (inches)
    pub datum_y_in: f64,
    pub curve_side: Option<CurveSide>,
    pub division: Option<DivisionId>,
    pub bend_radius: Option<f64>,
    pub center_excess: f64,
    pub end_excess: f64,
    pub super_elevation: Option<SuperElevationReport>,
    pub envelope: Vec<EnvelopeVertex>,
    pub points: Vec<PointReport>,
    pub summary: ClearanceSummary,
    pub warnings: Vec<String>,
}

impl ProfileReport {
    pub fn from_profile(profile: &mut Profile, gauge_in: f64) -> Self {
        let summary = profile.summary();
        let results = profile.clearances().to_vec();

        let points = profile
            .scan_points()
            .iter()
            .zip(results)
            .map(|(point, clearance)| PointReport {
                point: *point,
                clearance,
                boundary_distance: signed_boundary_distance(profile.active_envelope(), *point),
            })
            .collect();

        let mut warnings = Vec::new();
        if summary.envelope_missing {
            warnings.push(WARN_NO_ENVELOPE.to_string());
        }
        if let Some(error) = profile.last_error() {
            warnings.push(error.to_string());
        }

        let side = profile.curve_side();
        let super_elevation = profile.super_elevation().map(|se| SuperElevationReport {
            angle_deg: se.angle_deg,
            offset_in: se.offset(gauge_in),
            lean: side.map(|s| se.lean(s)),
        });

        let excess = profile.excess();
        Self {
            id: profile.id().to_string(),
            generated_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            identity: profile.identity().clone(),
            datum_y_in: profile.datum_y(),
            curve_side: side,
            division: profile.division(),
            bend_radius: profile.bend_radius().map(|r| r.representative()),
            center_excess: excess.map(|e| e.report_center()).unwrap_or(0.0),
            end_excess: excess.map(|e| e.report_end()).unwrap_or(0.0),
            super_elevation,
            envelope: profile.active_envelope().to_vec(),
            points,
            summary,
            warnings,
        }
    }

    /// Violation anywhere in the scan
    pub fn has_violation(&self) -> bool {
        self.summary.violation
    }
}
