//! Profile aggregate
//!
//! A profile owns the raw inputs captured at one location (encoder angles,
//! super elevation, division, curve side, scan points, images) and the values
//! derived from them. Every input change goes through [`Profile::apply`],
//! which runs exactly the recomputation the mutation requires:
//! - encoders, division, curve side: bend radius, then excess, then envelope
//! - super elevation: envelope only
//! - scan points, images: nothing
//!
//! Clearance results are evaluated lazily and incrementally against the
//! current envelope revision.

use crate::domain::command::{Mutation, Recompute};
use crate::domain::error::{DecodeError, GeometryError};
use crate::domain::record::{decode_scan_points, encode_scan_points, ProfileIdentity, ProfileRecord};
use crate::domain::types::{
    BendRadius, CurveSide, DivisionId, EncoderPair, EncoderSide, Excess, ImageSide, ScanPoint,
    SuperElevation,
};
use crate::services::bend_radius::calculate_bend_radius;
use crate::services::clearance::{
    ClearanceEvaluator, ClearanceResult, ClearanceSummary, MIN_POLYGON_VERTICES,
};
use crate::services::envelope::{adjust_envelope, ActiveEnvelope, EnvelopeStore, EnvelopeVertex};
use crate::services::excess::calculate_excess;
use crate::services::report::ProfileReport;
use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Profile shared between the session and its readers
pub type SharedProfile = Arc<Mutex<Profile>>;

/// One clearance measurement location
#[derive(Debug, Clone)]
pub struct Profile {
    id: String,
    identity: ProfileIdentity,

    encoders: EncoderPair,
    super_elevation: Option<SuperElevation>,
    curve_side: Option<CurveSide>,
    division: Option<DivisionId>,
    scan_points: Vec<ScanPoint>,
    image_inside: Option<Vec<u8>>,
    image_outside: Option<Vec<u8>>,

    envelope_store: Arc<EnvelopeStore>,

    bend_radius: Option<BendRadius>,
    excess: Option<Excess>,
    active_envelope: ActiveEnvelope,
    envelope_revision: u64,
    last_error: Option<GeometryError>,
    evaluator: ClearanceEvaluator,

    changes_made: bool,
}

impl Profile {
    /// Empty profile with a fresh time-sortable id
    pub fn new(identity: ProfileIdentity, envelope_store: Arc<EnvelopeStore>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            identity,
            encoders: EncoderPair::default(),
            super_elevation: None,
            curve_side: None,
            division: None,
            scan_points: Vec::new(),
            image_inside: None,
            image_outside: None,
            envelope_store,
            bend_radius: None,
            excess: None,
            active_envelope: Vec::new(),
            envelope_revision: 0,
            last_error: None,
            evaluator: ClearanceEvaluator::default(),
            changes_made: false,
        }
    }

    /// Use a different vertical-ray datum for clearance evaluation
    pub fn with_datum_y(mut self, datum_y: f64) -> Self {
        self.evaluator = ClearanceEvaluator::new(datum_y);
        self
    }

    /// Wrap for sharing with a session
    pub fn into_shared(self) -> SharedProfile {
        Arc::new(Mutex::new(self))
    }

    /// Apply one input change and run its recomputation cascade
    pub fn apply(&mut self, mutation: Mutation) -> Recompute {
        let cascade = mutation.cascade();
        debug!(profile_id = %self.id, mutation = mutation.as_str(), cascade = ?cascade, "mutation_applied");

        match mutation {
            Mutation::Encoder { side, angle_deg } => self.encoders.set(side, angle_deg),
            Mutation::SuperElevation { angle_deg } => {
                self.super_elevation = Some(SuperElevation::new(angle_deg))
            }
            Mutation::ScanPoint(point) => self.scan_points.push(point),
            Mutation::Division(division) => self.division = Some(division),
            Mutation::CurveSide(side) => self.curve_side = Some(side),
            Mutation::Image { side: ImageSide::Inside, data } => self.image_inside = Some(data),
            Mutation::Image { side: ImageSide::Outside, data } => self.image_outside = Some(data),
        }

        self.changes_made = true;
        self.recompute(cascade);
        cascade
    }

    pub fn set_encoder(&mut self, side: EncoderSide, angle_deg: f64) {
        self.apply(Mutation::Encoder { side, angle_deg });
    }

    pub fn set_super_elevation(&mut self, angle_deg: f64) {
        self.apply(Mutation::SuperElevation { angle_deg });
    }

    pub fn append_scan_point(&mut self, x: f64, y: f64) {
        self.apply(Mutation::ScanPoint(ScanPoint::new(x, y)));
    }

    pub fn set_division(&mut self, division: DivisionId) {
        self.apply(Mutation::Division(division));
    }

    pub fn set_curve_side(&mut self, side: CurveSide) {
        self.apply(Mutation::CurveSide(side));
    }

    pub fn set_image(&mut self, side: ImageSide, data: Vec<u8>) {
        self.apply(Mutation::Image { side, data });
    }

    fn recompute(&mut self, cascade: Recompute) {
        match cascade {
            Recompute::Nothing => {}
            Recompute::Envelope => self.recompute_envelope(),
            Recompute::Geometry => {
                self.recompute_bend_radius();
                self.recompute_excess();
                self.recompute_envelope();
            }
        }
    }

    fn recompute_bend_radius(&mut self) {
        let result = match self.curve_side {
            Some(side) => calculate_bend_radius(&self.encoders, side),
            None if self.encoders.is_straight() => Ok(BendRadius::Straight),
            None if !self.encoders.is_complete() => Err(GeometryError::EncodersMissing),
            None => Err(GeometryError::CurveSideMissing),
        };

        match result {
            Ok(radius) => {
                debug!(profile_id = %self.id, radius = radius.representative(), "bend_radius_computed");
                self.bend_radius = Some(radius);
                self.last_error = None;
            }
            Err(e) => {
                if matches!(e, GeometryError::NumericDegeneracy { .. }) {
                    warn!(profile_id = %self.id, error = %e, "bend_radius_degenerate");
                } else {
                    debug!(profile_id = %self.id, error = %e, "bend_radius_pending");
                }
                self.bend_radius = None;
                self.last_error = Some(e);
            }
        }
    }

    fn recompute_excess(&mut self) {
        self.excess = match (self.division, self.curve_side) {
            (Some(division), Some(side)) => {
                Some(calculate_excess(self.bend_radius.as_ref(), division, side))
            }
            _ => None,
        };
    }

    fn recompute_envelope(&mut self) {
        self.active_envelope = match self.division {
            Some(division) => adjust_envelope(
                self.envelope_store.points_for(division),
                division,
                self.curve_side,
                self.excess.as_ref(),
                self.super_elevation.as_ref(),
            ),
            None => Vec::new(),
        };
        self.envelope_revision += 1;

        if self.division.is_some() && self.active_envelope.len() < MIN_POLYGON_VERTICES {
            warn!(
                profile_id = %self.id,
                division = ?self.division,
                vertices = self.active_envelope.len(),
                "envelope_missing"
            );
        }
    }

    /// Clearance of every scan point against the current envelope
    ///
    /// Only points appended since the last call are evaluated unless the
    /// envelope changed in between.
    pub fn clearances(&mut self) -> &[ClearanceResult] {
        self.evaluator.evaluate(self.envelope_revision, &self.active_envelope, &self.scan_points)
    }

    /// Scalar summary over all scan points
    pub fn summary(&mut self) -> ClearanceSummary {
        let envelope_missing = self.envelope_missing();
        ClearanceSummary::from_results(self.clearances(), envelope_missing)
    }

    /// Full report for display and export
    pub fn report(&mut self, gauge_in: f64) -> ProfileReport {
        ProfileReport::from_profile(self, gauge_in)
    }

    /// Active envelope has too few vertices to evaluate against
    pub fn envelope_missing(&self) -> bool {
        self.active_envelope.len() < MIN_POLYGON_VERTICES
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &ProfileIdentity {
        &self.identity
    }

    pub fn encoders(&self) -> &EncoderPair {
        &self.encoders
    }

    pub fn super_elevation(&self) -> Option<&SuperElevation> {
        self.super_elevation.as_ref()
    }

    pub fn curve_side(&self) -> Option<CurveSide> {
        self.curve_side
    }

    pub fn division(&self) -> Option<DivisionId> {
        self.division
    }

    pub fn scan_points(&self) -> &[ScanPoint] {
        &self.scan_points
    }

    pub fn image(&self, side: ImageSide) -> Option<&[u8]> {
        match side {
            ImageSide::Inside => self.image_inside.as_deref(),
            ImageSide::Outside => self.image_outside.as_deref(),
        }
    }

    pub fn bend_radius(&self) -> Option<&BendRadius> {
        self.bend_radius.as_ref()
    }

    pub fn excess(&self) -> Option<&Excess> {
        self.excess.as_ref()
    }

    pub fn active_envelope(&self) -> &[EnvelopeVertex] {
        &self.active_envelope
    }

    /// Vertical clearance datum used for evaluation (inches)
    pub fn datum_y(&self) -> f64 {
        self.evaluator.datum_y()
    }

    /// Bumped every time the active envelope is rebuilt
    pub fn envelope_revision(&self) -> u64 {
        self.envelope_revision
    }

    /// Why the bend radius is currently unavailable
    pub fn last_error(&self) -> Option<&GeometryError> {
        self.last_error.as_ref()
    }

    /// Inputs changed since the last save
    pub fn changes_made(&self) -> bool {
        self.changes_made
    }

    pub fn mark_saved(&mut self) {
        self.changes_made = false;
    }

    /// Flat record for persistence
    pub fn to_record(&self) -> ProfileRecord {
        ProfileRecord {
            id: self.id.clone(),
            identity: self.identity.clone(),
            curve_side: self.curve_side,
            division: self.division,
            left_encoder_deg: self.encoders.left_angle_deg,
            right_encoder_deg: self.encoders.right_angle_deg,
            super_elevation_deg: self.super_elevation.map(|se| se.angle_deg),
            bend_radius: self.bend_radius,
            excess: self.excess,
            scan_points: encode_scan_points(&self.scan_points),
            image_inside: self.image_inside.as_ref().map(|data| STANDARD.encode(data)),
            image_outside: self.image_outside.as_ref().map(|data| STANDARD.encode(data)),
        }
    }

    /// Rebuild a profile from a record, recomputing every derived value
    ///
    /// The stored bend radius and excess are not trusted; a mismatch with the
    /// recomputed values is logged. The loaded profile has no unsaved changes.
    pub fn from_record(
        record: ProfileRecord,
        envelope_store: Arc<EnvelopeStore>,
    ) -> Result<Self, DecodeError> {
        let decode_image = |encoded: &Option<String>| {
            encoded
                .as_ref()
                .map(|text| STANDARD.decode(text))
                .transpose()
                .map_err(|e| DecodeError::Image { reason: e.to_string() })
        };

        let mut profile = Profile::new(record.identity.clone(), envelope_store);
        profile.id = record.id.clone();
        profile.encoders = EncoderPair {
            left_angle_deg: record.left_encoder_deg,
            right_angle_deg: record.right_encoder_deg,
        };
        profile.super_elevation = record.super_elevation_deg.map(SuperElevation::new);
        profile.curve_side = record.curve_side;
        profile.division = record.division;
        profile.scan_points = decode_scan_points(&record.scan_points)?;
        profile.image_inside = decode_image(&record.image_inside)?;
        profile.image_outside = decode_image(&record.image_outside)?;

        profile.recompute(Recompute::Geometry);

        if profile.bend_radius != record.bend_radius || profile.excess != record.excess {
            warn!(
                profile_id = %profile.id,
                stored_radius = ?record.bend_radius,
                computed_radius = ?profile.bend_radius,
                "stored_geometry_mismatch"
            );
        }

        Ok(profile)
    }
}
