//! Per-point clearance against the active envelope
//!
//! A scan point strictly inside the envelope polygon is a violation with
//! zero clearance. Otherwise two rays are cast from the point: a horizontal
//! ray toward x = 0 and a vertical ray down to the rail-head datum. Each
//! clearance is the distance to the nearest boundary crossing on its ray, or
//! +∞ when the ray never meets the boundary.

use crate::domain::types::ScanPoint;
use crate::services::envelope::EnvelopeVertex;
use serde::Serialize;
use smallvec::SmallVec;

/// Vertical ray end (rail-head datum), inches
pub const DEFAULT_DATUM_Y_IN: f64 = -25.0;

/// Polygons with fewer vertices are treated as no envelope at all
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Distance under which a point counts as lying on an edge
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Clearance of one scan point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClearanceResult {
    pub horizontal_clearance: f64,
    pub vertical_clearance: f64,
    pub is_violation: bool,
}

impl ClearanceResult {
    pub const VIOLATION: ClearanceResult =
        ClearanceResult { horizontal_clearance: 0.0, vertical_clearance: 0.0, is_violation: true };
}

/// Iterate polygon edges, closing the ring
fn edges(polygon: &[EnvelopeVertex]) -> impl Iterator<Item = (EnvelopeVertex, EnvelopeVertex)> + '_ {
    polygon.iter().zip(polygon.iter().cycle().skip(1)).map(|(a, b)| (*a, *b))
}

fn distance_to_segment(p: ScanPoint, a: EnvelopeVertex, b: EnvelopeVertex) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0)
    };
    (p.x - (a.x + t * dx)).hypot(p.y - (a.y + t * dy))
}

fn on_boundary(polygon: &[EnvelopeVertex], p: ScanPoint) -> bool {
    edges(polygon).any(|(a, b)| distance_to_segment(p, a, b) <= BOUNDARY_EPSILON)
}

/// Even-odd containment; boundary points are not contained
pub fn contains(polygon: &[EnvelopeVertex], p: ScanPoint) -> bool {
    if polygon.len() < MIN_POLYGON_VERTICES || on_boundary(polygon, p) {
        return false;
    }

    let mut inside = false;
    for (a, b) in edges(polygon) {
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Ray direction for clearance measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// (along-ray, across-ray) coordinates of a vertex
    #[inline]
    fn split(&self, v: EnvelopeVertex) -> (f64, f64) {
        match self {
            Axis::Horizontal => (v.x, v.y),
            Axis::Vertical => (v.y, v.x),
        }
    }
}

/// Boundary crossings of an axis-aligned ray, as along-ray coordinates
///
/// The ray runs from `from` to `to` on the line `across = level`. An edge
/// lying on the ray contributes its overlap point closest to `from`.
fn ray_hits(
    polygon: &[EnvelopeVertex],
    axis: Axis,
    level: f64,
    from: f64,
    to: f64,
) -> SmallVec<[f64; 4]> {
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
    let mut hits = SmallVec::new();

    for (a, b) in edges(polygon) {
        let (a_along, a_across) = axis.split(a);
        let (b_along, b_across) = axis.split(b);

        if a_across == level && b_across == level {
            let overlap_lo = lo.max(a_along.min(b_along));
            let overlap_hi = hi.min(a_along.max(b_along));
            if overlap_lo <= overlap_hi {
                hits.push(from.clamp(overlap_lo, overlap_hi));
            }
            continue;
        }

        if (a_across - level) * (b_across - level) <= 0.0 {
            let t = (level - a_across) / (b_across - a_across);
            let along = a_along + t * (b_along - a_along);
            if (lo..=hi).contains(&along) {
                hits.push(along);
            }
        }
    }

    hits
}

fn nearest_hit(hits: &[f64], from: f64) -> f64 {
    hits.iter().map(|hit| (from - hit).abs()).fold(f64::INFINITY, f64::min)
}

/// Clearance of a single point against a polygon of at least three vertices
pub fn evaluate_point(polygon: &[EnvelopeVertex], p: ScanPoint, datum_y: f64) -> ClearanceResult {
    if contains(polygon, p) {
        return ClearanceResult::VIOLATION;
    }

    let horizontal = ray_hits(polygon, Axis::Horizontal, p.y, p.x, 0.0);
    let vertical = ray_hits(polygon, Axis::Vertical, p.x, p.y, datum_y);

    ClearanceResult {
        horizontal_clearance: nearest_hit(&horizontal, p.x),
        vertical_clearance: nearest_hit(&vertical, p.y),
        is_violation: false,
    }
}

/// Clearances for every scan point, in scan order
///
/// An envelope with fewer than three vertices (no matching division) yields
/// an empty result set rather than an error.
pub fn calculate_clearances(
    envelope: &[EnvelopeVertex],
    scan_points: &[ScanPoint],
    datum_y: f64,
) -> Vec<ClearanceResult> {
    if envelope.len() < MIN_POLYGON_VERTICES {
        return Vec::new();
    }
    scan_points.iter().map(|p| evaluate_point(envelope, *p, datum_y)).collect()
}

/// Signed distance from a point to the envelope boundary
///
/// Negative inside the envelope. This is the older single-scalar metric and
/// is kept for diagnostics only; it does not replace the two-axis result.
pub fn signed_boundary_distance(envelope: &[EnvelopeVertex], p: ScanPoint) -> Option<f64> {
    if envelope.len() < MIN_POLYGON_VERTICES {
        return None;
    }
    let distance =
        edges(envelope).map(|(a, b)| distance_to_segment(p, a, b)).fold(f64::INFINITY, f64::min);
    Some(if contains(envelope, p) { -distance } else { distance })
}

/// Incremental evaluator for a growing scan
///
/// Results are cached against the envelope revision that produced them.
/// While the revision is unchanged only newly appended points are evaluated;
/// a new revision discards the cache.
#[derive(Debug, Clone)]
pub struct ClearanceEvaluator {
    datum_y: f64,
    revision: Option<u64>,
    results: Vec<ClearanceResult>,
}

impl ClearanceEvaluator {
    pub fn new(datum_y: f64) -> Self {
        Self { datum_y, revision: None, results: Vec::new() }
    }

    pub fn datum_y(&self) -> f64 {
        self.datum_y
    }

    pub fn evaluate(
        &mut self,
        revision: u64,
        envelope: &[EnvelopeVertex],
        scan_points: &[ScanPoint],
    ) -> &[ClearanceResult] {
        if self.revision != Some(revision) || self.results.len() > scan_points.len() {
            self.results.clear();
            self.revision = Some(revision);
        }

        if envelope.len() < MIN_POLYGON_VERTICES {
            self.results.clear();
            return &self.results;
        }

        let start = self.results.len();
        self.results.extend(
            scan_points[start..].iter().map(|p| evaluate_point(envelope, *p, self.datum_y)),
        );
        &self.results
    }

    /// Number of cached results
    pub fn cached(&self) -> usize {
        self.results.len()
    }
}

impl Default for ClearanceEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_DATUM_Y_IN)
    }
}

/// Scalar summary consumed by reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClearanceSummary {
    /// Smallest horizontal clearance; `None` when nothing was evaluated
    pub min_horizontal: Option<f64>,
    /// Smallest vertical clearance; `None` when nothing was evaluated
    pub min_vertical: Option<f64>,
    /// Any point inside the envelope
    pub violation: bool,
    pub violations: usize,
    pub evaluated: usize,
    /// No usable envelope for the selected division
    pub envelope_missing: bool,
}

impl ClearanceSummary {
    pub fn from_results(results: &[ClearanceResult], envelope_missing: bool) -> Self {
        let min_of = |pick: fn(&ClearanceResult) -> f64| {
            results.iter().map(pick).fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |current| current.min(v)))
            })
        };

        let violations = results.iter().filter(|r| r.is_violation).count();
        Self {
            min_horizontal: min_of(|r| r.horizontal_clearance),
            min_vertical: min_of(|r| r.vertical_clearance),
            violation: violations > 0,
            violations,
            evaluated: results.len(),
            envelope_missing,
        }
    }
}
