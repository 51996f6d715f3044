//! Bend radius from the two encoder chords
//!
//! Each encoder angle gives the direction of a fixed-length chord laid from
//! the device along the rail. Inside curves fit one circle through the device
//! and both chord endpoints. Outside curves measure each chord on its own,
//! assuming the center lies on the y axis through the device. The two models
//! are intentionally different and must not be unified.

use crate::domain::error::GeometryError;
use crate::domain::types::{BendRadius, CurveSide, EncoderPair, DEG_TO_RAD};

/// Inside chord length: 25 ft
pub const INSIDE_CHORD_IN: f64 = 300.0;
/// Outside chord length: 50 ft
pub const OUTSIDE_CHORD_IN: f64 = 600.0;

/// Chord components closer to zero than this fraction of the chord length
/// make a slope (or its perpendicular) undefined
const DEGENERACY_EPSILON: f64 = 1e-9;

/// Endpoint of a chord from the origin
#[derive(Debug, Clone, Copy)]
struct Chord {
    x: f64,
    y: f64,
}

impl Chord {
    fn new(length: f64, angle_deg: f64) -> Self {
        let angle = angle_deg * DEG_TO_RAD;
        Self { x: length * angle.cos(), y: length * angle.sin() }
    }

    /// Slope of the chord, rejecting vertical and horizontal chords
    fn slope(&self, length: f64) -> Result<f64, &'static str> {
        let tolerance = DEGENERACY_EPSILON * length;
        if self.x.abs() < tolerance {
            return Err("chord is vertical");
        }
        if self.y.abs() < tolerance {
            return Err("chord is horizontal");
        }
        Ok(self.y / self.x)
    }
}

/// Compute the bend radius for the captured encoders
pub fn calculate_bend_radius(
    encoders: &EncoderPair,
    side: CurveSide,
) -> Result<BendRadius, GeometryError> {
    let (left_deg, right_deg) = encoders.both().ok_or(GeometryError::EncodersMissing)?;

    if encoders.is_straight() {
        return Ok(BendRadius::Straight);
    }

    let degenerate = |reason| GeometryError::NumericDegeneracy {
        left_angle_deg: left_deg,
        right_angle_deg: right_deg,
        reason,
    };

    match side {
        CurveSide::Inside => {
            let radius = inside_radius(left_deg, right_deg).map_err(degenerate)?;
            Ok(BendRadius::Inside { radius })
        }
        CurveSide::Outside => {
            let left = outside_radius(left_deg).map_err(degenerate)?;
            let right = outside_radius(right_deg).map_err(degenerate)?;
            Ok(BendRadius::Outside { left, right })
        }
    }
}

/// Circle through the origin and both chord endpoints
///
/// The center is the intersection of the perpendicular bisectors of the two
/// chords.
fn inside_radius(left_deg: f64, right_deg: f64) -> Result<f64, &'static str> {
    let l = Chord::new(INSIDE_CHORD_IN, left_deg);
    let r = Chord::new(INSIDE_CHORD_IN, right_deg);

    let l_slope = l.slope(INSIDE_CHORD_IN)?;
    let r_slope = r.slope(INSIDE_CHORD_IN)?;

    let slope_gap = r_slope - l_slope;
    if slope_gap.abs() < DEGENERACY_EPSILON {
        return Err("chords are parallel");
    }

    let l_perp = -1.0 / l_slope;

    let cx = (l_slope * r_slope * (l.y - r.y) + r_slope * l.x - l_slope * r.x) / (2.0 * slope_gap);
    let cy = l_perp * (cx - l.x / 2.0) + l.y / 2.0;

    Ok((cx * cx + cy * cy).sqrt())
}

/// Single-chord radius with the center pinned to x = 0
fn outside_radius(angle_deg: f64) -> Result<f64, &'static str> {
    let chord = Chord::new(OUTSIDE_CHORD_IN, angle_deg);
    let slope = chord.slope(OUTSIDE_CHORD_IN)?;
    let perp = -1.0 / slope;

    let cx = 0.0;
    let cy = perp * (cx - chord.x / 2.0) + chord.y / 2.0;

    Ok((cx * cx + cy * cy).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord_circle_radius(chord: f64, half_angle_deg: f64) -> f64 {
        chord / (2.0 * (half_angle_deg * DEG_TO_RAD).sin())
    }

    #[test]
    fn test_missing_encoders() {
        let encoders = EncoderPair { left_angle_deg: Some(174.0), right_angle_deg: None };
        assert_eq!(
            calculate_bend_radius(&encoders, CurveSide::Inside),
            Err(GeometryError::EncodersMissing)
        );
        assert_eq!(
            calculate_bend_radius(&EncoderPair::default(), CurveSide::Outside),
            Err(GeometryError::EncodersMissing)
        );
    }

    #[test]
    fn test_straight_track() {
        let encoders = EncoderPair::new(180.0, 0.0);
        assert_eq!(calculate_bend_radius(&encoders, CurveSide::Inside), Ok(BendRadius::Straight));
        assert_eq!(calculate_bend_radius(&encoders, CurveSide::Outside), Ok(BendRadius::Straight));
    }

    #[test]
    fn test_inside_symmetric_chords() {
        // Symmetric chords 6° above the horizon: R = L / (2 sin 6°)
        let encoders = EncoderPair::new(174.0, 6.0);
        let radius = match calculate_bend_radius(&encoders, CurveSide::Inside).unwrap() {
            BendRadius::Inside { radius } => radius,
            other => panic!("expected inside radius, got {:?}", other),
        };
        let expected = chord_circle_radius(INSIDE_CHORD_IN, 6.0);
        assert!((radius - expected).abs() < 1e-6, "radius {} expected {}", radius, expected);
        assert!(radius > 1400.0 && radius < 1450.0);
    }

    #[test]
    fn test_inside_is_deterministic() {
        let encoders = EncoderPair::new(171.5, 4.25);
        let first = calculate_bend_radius(&encoders, CurveSide::Inside).unwrap();
        let second = calculate_bend_radius(&encoders, CurveSide::Inside).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inside_tighter_curve_smaller_radius() {
        let gentle = calculate_bend_radius(&EncoderPair::new(178.0, 2.0), CurveSide::Inside)
            .unwrap()
            .representative();
        let tight = calculate_bend_radius(&EncoderPair::new(170.0, 10.0), CurveSide::Inside)
            .unwrap()
            .representative();
        assert!(tight < gentle);
    }

    #[test]
    fn test_outside_independent_radii() {
        let encoders = EncoderPair::new(176.0, 5.0);
        match calculate_bend_radius(&encoders, CurveSide::Outside).unwrap() {
            BendRadius::Outside { left, right } => {
                // Center on the y axis: R = L / (2 sin θ) for each chord alone
                assert!((left - chord_circle_radius(OUTSIDE_CHORD_IN, 4.0)).abs() < 1e-6);
                assert!((right - chord_circle_radius(OUTSIDE_CHORD_IN, 5.0)).abs() < 1e-6);
                assert!(left > right);
            }
            other => panic!("expected outside radii, got {:?}", other),
        }
    }

    #[test]
    fn test_degenerate_horizontal_chord() {
        // Left chord lies on the x axis but the pair is not the straight-track marker
        let encoders = EncoderPair::new(180.0, 5.0);
        let err = calculate_bend_radius(&encoders, CurveSide::Inside).unwrap_err();
        assert!(matches!(err, GeometryError::NumericDegeneracy { reason: "chord is horizontal", .. }));
    }

    #[test]
    fn test_degenerate_vertical_chord() {
        let encoders = EncoderPair::new(90.0, 5.0);
        let err = calculate_bend_radius(&encoders, CurveSide::Outside).unwrap_err();
        assert!(matches!(err, GeometryError::NumericDegeneracy { reason: "chord is vertical", .. }));
    }

    #[test]
    fn test_degenerate_parallel_chords() {
        let encoders = EncoderPair::new(10.0, 10.0);
        let err = calculate_bend_radius(&encoders, CurveSide::Inside).unwrap_err();
        assert!(matches!(err, GeometryError::NumericDegeneracy { reason: "chords are parallel", .. }));
    }
}
