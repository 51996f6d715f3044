//! Shared types for the clearance engine
//!
//! Units are inches and degrees throughout. Angles follow the standard
//! mathematical convention (0° = +x axis, counter-clockwise positive).

use serde::{Deserialize, Serialize};

/// Degrees to radians
pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
/// Radians to degrees
pub const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

/// Standard track gauge used for the super-elevation offset (inches)
pub const TRACK_GAUGE_IN: f64 = 56.5;

/// Rail-authority clearance standard selecting a subset of envelope points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivisionId {
    A,
    B,
}

impl DivisionId {
    /// Label used by the envelope reference table
    pub fn label(&self) -> &'static str {
        match self {
            DivisionId::A => "A Division",
            DivisionId::B => "B Division",
        }
    }

    /// (center, end) excess numerators in square inches
    pub fn excess_numerators(&self) -> (f64, f64) {
        match self {
            DivisionId::A => (1944.0, 1512.0),
            DivisionId::B => (4374.0, 2945.0),
        }
    }
}

impl std::fmt::Display for DivisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DivisionId {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "a" | "a division" => Ok(DivisionId::A),
            "b" | "b division" => Ok(DivisionId::B),
            _ => Err(UnknownLabel { kind: "division", value: s.trim().to_string() }),
        }
    }
}

/// Returned when a textual label does not name a known variant
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown {kind} label '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Which rail of the curve is being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveSide {
    Inside,
    Outside,
}

impl CurveSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveSide::Inside => "inside",
            CurveSide::Outside => "outside",
        }
    }
}

impl std::str::FromStr for CurveSide {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inside" | "in" | "i" => Ok(CurveSide::Inside),
            "outside" | "out" | "o" => Ok(CurveSide::Outside),
            _ => Err(UnknownLabel { kind: "curve side", value: s.trim().to_string() }),
        }
    }
}

/// Which encoder (measurement chord) a reading belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncoderSide {
    Left,
    Right,
}

/// Camera looking at the inside or outside rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSide {
    Inside,
    Outside,
}

/// Purpose of the profile, carried through to reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfileKind {
    #[default]
    Verification,
    Installation,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Verification => "verification",
            ProfileKind::Installation => "installation",
        }
    }
}

impl std::str::FromStr for ProfileKind {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verification" => Ok(ProfileKind::Verification),
            "installation" => Ok(ProfileKind::Installation),
            _ => Err(UnknownLabel { kind: "profile kind", value: s.trim().to_string() }),
        }
    }
}

/// Direction the device faced while measuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    North,
    South,
}

/// Captured encoder angles; each is absent until the device reports it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EncoderPair {
    pub left_angle_deg: Option<f64>,
    pub right_angle_deg: Option<f64>,
}

impl EncoderPair {
    pub fn new(left_angle_deg: f64, right_angle_deg: f64) -> Self {
        Self { left_angle_deg: Some(left_angle_deg), right_angle_deg: Some(right_angle_deg) }
    }

    pub fn set(&mut self, side: EncoderSide, angle_deg: f64) {
        match side {
            EncoderSide::Left => self.left_angle_deg = Some(angle_deg),
            EncoderSide::Right => self.right_angle_deg = Some(angle_deg),
        }
    }

    /// Both angles, once both have been captured
    pub fn both(&self) -> Option<(f64, f64)> {
        Some((self.left_angle_deg?, self.right_angle_deg?))
    }

    pub fn is_complete(&self) -> bool {
        self.both().is_some()
    }

    /// Straight-track marker: left chord at 180°, right chord at 0°
    pub fn is_straight(&self) -> bool {
        self.both() == Some((180.0, 0.0))
    }
}

/// Whether the track cant leans toward or away from the evaluated rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lean {
    Towards,
    Away,
}

impl Lean {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lean::Towards => "towards",
            Lean::Away => "away",
        }
    }
}

/// Track cant measured by the device tilt sensor (signed)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuperElevation {
    pub angle_deg: f64,
}

impl SuperElevation {
    pub fn new(angle_deg: f64) -> Self {
        Self { angle_deg }
    }

    /// Lateral offset of the high rail for the given gauge
    pub fn offset(&self, gauge_in: f64) -> f64 {
        gauge_in * (self.angle_deg * DEG_TO_RAD).sin()
    }

    /// Positive angles lean toward the outside rail
    pub fn lean(&self, side: CurveSide) -> Lean {
        let leaning_to = if self.angle_deg > 0.0 { CurveSide::Outside } else { CurveSide::Inside };
        if leaning_to == side {
            Lean::Towards
        } else {
            Lean::Away
        }
    }
}

/// Point captured by the rangefinder, device-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    pub x: f64,
    pub y: f64,
}

impl ScanPoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Raw clearance-envelope vertex from the reference table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub division: DivisionId,
}

/// Fitted radius of curvature
///
/// Inside curves fit one circle through both chords; outside curves measure
/// each chord independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BendRadius {
    Straight,
    Inside { radius: f64 },
    Outside { left: f64, right: f64 },
}

impl BendRadius {
    /// Single value shown on reports (tightest radius for outside curves)
    pub fn representative(&self) -> f64 {
        match *self {
            BendRadius::Straight => f64::INFINITY,
            BendRadius::Inside { radius } => radius,
            BendRadius::Outside { left, right } => left.min(right),
        }
    }

    pub fn is_straight(&self) -> bool {
        matches!(self, BendRadius::Straight)
    }
}

/// Center and end excess for one radius
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExcessPair {
    pub center: f64,
    pub end: f64,
}

impl ExcessPair {
    pub const ZERO: ExcessPair = ExcessPair { center: 0.0, end: 0.0 };
}

/// Lateral corrections for vehicle overhang on curved track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Excess {
    Inside(ExcessPair),
    Outside { left: ExcessPair, right: ExcessPair },
}

impl Excess {
    pub fn zero(side: CurveSide) -> Self {
        match side {
            CurveSide::Inside => Excess::Inside(ExcessPair::ZERO),
            CurveSide::Outside => Excess::Outside { left: ExcessPair::ZERO, right: ExcessPair::ZERO },
        }
    }

    /// Horizontal shift applied to the envelope
    ///
    /// Inside curves contract by the center excess; outside curves widen by
    /// the worst end excess.
    pub fn applied_shift(&self) -> f64 {
        match self {
            Excess::Inside(pair) => -pair.center,
            Excess::Outside { left, right } => left.end.max(right.end),
        }
    }

    /// Center excess printed on reports
    pub fn report_center(&self) -> f64 {
        match self {
            Excess::Inside(pair) => pair.center,
            Excess::Outside { left, right } => left.center.min(right.center),
        }
    }

    /// End excess printed on reports
    pub fn report_end(&self) -> f64 {
        match self {
            Excess::Inside(pair) => pair.end,
            Excess::Outside { left, right } => left.end.max(right.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_from_str() {
        assert_eq!("A".parse::<DivisionId>().unwrap(), DivisionId::A);
        assert_eq!(" B Division ".parse::<DivisionId>().unwrap(), DivisionId::B);
        assert_eq!("a division".parse::<DivisionId>().unwrap(), DivisionId::A);
        assert!("C Division".parse::<DivisionId>().is_err());
    }

    #[test]
    fn test_division_label_round_trip() {
        for division in [DivisionId::A, DivisionId::B] {
            assert_eq!(division.label().parse::<DivisionId>().unwrap(), division);
        }
    }

    #[test]
    fn test_labels_parse_back() {
        for side in [CurveSide::Inside, CurveSide::Outside] {
            assert_eq!(side.as_str().parse::<CurveSide>().unwrap(), side);
        }
        for kind in [ProfileKind::Verification, ProfileKind::Installation] {
            assert_eq!(kind.as_str().parse::<ProfileKind>().unwrap(), kind);
        }
        assert_eq!(Lean::Towards.as_str(), "towards");
        assert_eq!(Lean::Away.as_str(), "away");
    }

    #[test]
    fn test_encoder_pair_presence() {
        let mut pair = EncoderPair::default();
        assert!(!pair.is_complete());
        pair.set(EncoderSide::Left, 180.0);
        assert!(!pair.is_complete());
        assert!(!pair.is_straight());
        pair.set(EncoderSide::Right, 0.0);
        assert!(pair.is_complete());
        assert!(pair.is_straight());
    }

    #[test]
    fn test_super_elevation_lean() {
        let positive = SuperElevation::new(2.5);
        assert_eq!(positive.lean(CurveSide::Outside), Lean::Towards);
        assert_eq!(positive.lean(CurveSide::Inside), Lean::Away);

        let negative = SuperElevation::new(-1.0);
        assert_eq!(negative.lean(CurveSide::Inside), Lean::Towards);
        assert_eq!(negative.lean(CurveSide::Outside), Lean::Away);
    }

    #[test]
    fn test_super_elevation_offset() {
        let se = SuperElevation::new(90.0);
        assert!((se.offset(TRACK_GAUGE_IN) - 56.5).abs() < 1e-9);
        assert_eq!(SuperElevation::new(0.0).offset(TRACK_GAUGE_IN), 0.0);
    }

    #[test]
    fn test_excess_applied_shift() {
        let inside = Excess::Inside(ExcessPair { center: 3.0, end: 2.0 });
        assert_eq!(inside.applied_shift(), -3.0);

        let outside = Excess::Outside {
            left: ExcessPair { center: 3.0, end: 2.0 },
            right: ExcessPair { center: 4.0, end: 2.5 },
        };
        assert_eq!(outside.applied_shift(), 2.5);
        assert_eq!(outside.report_center(), 3.0);
        assert_eq!(outside.report_end(), 2.5);
    }

    #[test]
    fn test_bend_radius_representative() {
        assert!(BendRadius::Straight.representative().is_infinite());
        assert_eq!(BendRadius::Outside { left: 900.0, right: 800.0 }.representative(), 800.0);
    }
}
