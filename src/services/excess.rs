//! Center and end excess from the bend radius
//!
//! `excess = numerator / radius`, with division-specific numerators. A
//! missing bend radius yields zero excess so the envelope transform always
//! has a number to work with. Callers that must tell "no curve data yet"
//! apart from straight track check the encoders instead.

use crate::domain::types::{BendRadius, CurveSide, DivisionId, Excess, ExcessPair};

/// Excess for one radius
#[inline]
fn excess_for_radius(radius: f64, division: DivisionId) -> ExcessPair {
    let (center_numerator, end_numerator) = division.excess_numerators();
    ExcessPair { center: center_numerator / radius, end: end_numerator / radius }
}

/// Compute the excess for the evaluated side
///
/// A straight-track radius divides to zero. If the radius shape does not
/// match `side` (stale radius during a side change), the radius is reread in
/// the shape of `side`: an inside radius is used for both outside chords and
/// the tighter outside radius stands in for an inside radius.
pub fn calculate_excess(
    bend_radius: Option<&BendRadius>,
    division: DivisionId,
    side: CurveSide,
) -> Excess {
    let Some(bend_radius) = bend_radius else {
        return Excess::zero(side);
    };

    match (*bend_radius, side) {
        (BendRadius::Straight, _) => Excess::zero(side),
        (BendRadius::Inside { radius }, CurveSide::Inside) => {
            Excess::Inside(excess_for_radius(radius, division))
        }
        (BendRadius::Inside { radius }, CurveSide::Outside) => {
            let pair = excess_for_radius(radius, division);
            Excess::Outside { left: pair, right: pair }
        }
        (BendRadius::Outside { left, right }, CurveSide::Outside) => Excess::Outside {
            left: excess_for_radius(left, division),
            right: excess_for_radius(right, division),
        },
        (radius @ BendRadius::Outside { .. }, CurveSide::Inside) => {
            Excess::Inside(excess_for_radius(radius.representative(), division))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_radius_is_zero() {
        assert_eq!(
            calculate_excess(None, DivisionId::B, CurveSide::Inside),
            Excess::Inside(ExcessPair::ZERO)
        );
        assert_eq!(
            calculate_excess(None, DivisionId::A, CurveSide::Outside),
            Excess::Outside { left: ExcessPair::ZERO, right: ExcessPair::ZERO }
        );
    }

    #[test]
    fn test_straight_track_is_zero() {
        let excess = calculate_excess(Some(&BendRadius::Straight), DivisionId::B, CurveSide::Inside);
        assert_eq!(excess, Excess::Inside(ExcessPair { center: 0.0, end: 0.0 }));
        assert_eq!(excess.applied_shift(), 0.0);
    }

    #[test]
    fn test_inside_division_b() {
        let radius = BendRadius::Inside { radius: 1435.0 };
        let excess = calculate_excess(Some(&radius), DivisionId::B, CurveSide::Inside);
        assert_eq!(excess, Excess::Inside(ExcessPair { center: 4374.0 / 1435.0, end: 2945.0 / 1435.0 }));
    }

    #[test]
    fn test_outside_division_a_per_chord() {
        let radius = BendRadius::Outside { left: 2000.0, right: 1000.0 };
        let excess = calculate_excess(Some(&radius), DivisionId::A, CurveSide::Outside);
        assert_eq!(
            excess,
            Excess::Outside {
                left: ExcessPair { center: 1944.0 / 2000.0, end: 1512.0 / 2000.0 },
                right: ExcessPair { center: 1944.0 / 1000.0, end: 1512.0 / 1000.0 },
            }
        );
        assert_eq!(excess.applied_shift(), 1.512);
    }

    #[test]
    fn test_outside_division_b_uses_end_numerator_on_both_chords() {
        let radius = BendRadius::Outside { left: 1000.0, right: 1000.0 };
        match calculate_excess(Some(&radius), DivisionId::B, CurveSide::Outside) {
            Excess::Outside { left, right } => {
                assert_eq!(left.end, 2.945);
                assert_eq!(right.end, 2.945);
            }
            other => panic!("expected outside excess, got {:?}", other),
        }
    }

    #[test]
    fn test_larger_radius_smaller_excess() {
        let small = calculate_excess(Some(&BendRadius::Inside { radius: 800.0 }), DivisionId::A, CurveSide::Inside);
        let large = calculate_excess(Some(&BendRadius::Inside { radius: 1600.0 }), DivisionId::A, CurveSide::Inside);
        assert!(large.report_center() < small.report_center());
        assert!(large.report_end() < small.report_end());
    }
}
