//! Clearance envelope: reference store and active transform
//!
//! The store holds the raw, unrotated boundary for every division. The
//! active envelope is the selected division's boundary rotated opposite the
//! device tilt and shifted by the curve excess. Vertex order is preserved so
//! the polygon keeps its winding.

use crate::domain::error::DecodeError;
use crate::domain::types::{
    CurveSide, DivisionId, EnvelopePoint, Excess, SuperElevation, DEG_TO_RAD, RAD_TO_DEG,
};
use anyhow::Context;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Immutable reference table of envelope vertices, grouped by division
#[derive(Debug, Clone, Default)]
pub struct EnvelopeStore {
    by_division: FxHashMap<DivisionId, Vec<EnvelopePoint>>,
    len: usize,
}

impl EnvelopeStore {
    /// Build a store, keeping table order within each division
    pub fn from_points(points: impl IntoIterator<Item = EnvelopePoint>) -> Self {
        let mut by_division: FxHashMap<DivisionId, Vec<EnvelopePoint>> = FxHashMap::default();
        let mut len = 0;
        for point in points {
            by_division.entry(point.division).or_default().push(point);
            len += 1;
        }
        Self { by_division, len }
    }

    /// Parse the reference table: header row, then `id,x,y,division`
    pub fn from_csv_str(content: &str) -> Result<Self, DecodeError> {
        let mut points = Vec::new();

        for (index, raw_line) in content.lines().enumerate().skip(1) {
            let line = index + 1;
            if raw_line.trim().is_empty() {
                continue;
            }

            let columns: Vec<&str> = raw_line.split(',').map(str::trim).collect();
            if columns.len() != 4 {
                return Err(DecodeError::EnvelopeRow {
                    line,
                    reason: format!("expected 4 columns, found {}", columns.len()),
                });
            }

            let row_error = |reason: String| DecodeError::EnvelopeRow { line, reason };
            let id = columns[0]
                .parse::<i64>()
                .map_err(|_| row_error(format!("invalid id '{}'", columns[0])))?;
            let x = columns[1]
                .parse::<f64>()
                .map_err(|_| row_error(format!("invalid x '{}'", columns[1])))?;
            let y = columns[2]
                .parse::<f64>()
                .map_err(|_| row_error(format!("invalid y '{}'", columns[2])))?;
            let division = columns[3].parse::<DivisionId>().map_err(|e| row_error(e.to_string()))?;

            points.push(EnvelopePoint { id, x, y, division });
        }

        Ok(Self::from_points(points))
    }

    /// Load the reference table from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read envelope file {}", path.display()))?;
        let store = Self::from_csv_str(&content)
            .with_context(|| format!("Failed to parse envelope file {}", path.display()))?;

        info!(
            file = %path.display(),
            points = %store.len(),
            a_points = %store.points_for(DivisionId::A).len(),
            b_points = %store.points_for(DivisionId::B).len(),
            "envelope_loaded"
        );
        Ok(store)
    }

    /// Vertices for one division in table order
    pub fn points_for(&self, division: DivisionId) -> &[EnvelopePoint] {
        self.by_division.get(&division).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Envelope vertex after transformation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvelopeVertex {
    pub x: f64,
    pub y: f64,
}

/// Transformed envelope polygon, in input winding order
pub type ActiveEnvelope = Vec<EnvelopeVertex>;

/// Rotate and shift one division's envelope
///
/// Points of other divisions are ignored. A missing excess or super
/// elevation counts as zero. Each vertex is rotated about the origin by the
/// negated super-elevation angle, then shifted in x by the excess
/// (`-center` inside, `max(end)` outside).
pub fn adjust_envelope(
    base_points: &[EnvelopePoint],
    division: DivisionId,
    side: Option<CurveSide>,
    excess: Option<&Excess>,
    super_elevation: Option<&SuperElevation>,
) -> ActiveEnvelope {
    let shift = match (side, excess) {
        (Some(_), Some(excess)) => excess.applied_shift(),
        _ => 0.0,
    };
    let tilt_deg = super_elevation.map(|se| se.angle_deg).unwrap_or(0.0);

    base_points
        .iter()
        .filter(|point| point.division == division)
        .map(|point| {
            let (x, y) = if tilt_deg == 0.0 {
                (point.x, point.y)
            } else {
                let radius = point.x.hypot(point.y);
                let angle_deg = point.y.atan2(point.x) * RAD_TO_DEG - tilt_deg;
                let angle = angle_deg * DEG_TO_RAD;
                (radius * angle.cos(), radius * angle.sin())
            };
            EnvelopeVertex { x: x + shift, y }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ExcessPair;

    const TABLE: &str = "ID,X,Y,DIV\n\
        1,-10.0,0.0,A Division\n\
        2,-10.0,20.0,A Division\n\
        3,10.0,20.0,A Division\n\
        4,10.0,0.0,A Division\n\
        \n\
        5,-12.0,0.0,B Division\n\
        6,0.0,25.0,B Division\n\
        7,12.0,0.0,B Division\n";

    fn store() -> EnvelopeStore {
        EnvelopeStore::from_csv_str(TABLE).unwrap()
    }

    #[test]
    fn test_from_csv_groups_by_division() {
        let store = store();
        assert_eq!(store.len(), 7);
        let a = store.points_for(DivisionId::A);
        assert_eq!(a.len(), 4);
        assert_eq!(a.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(store.points_for(DivisionId::B).len(), 3);
    }

    #[test]
    fn test_from_csv_rejects_bad_row() {
        let err = EnvelopeStore::from_csv_str("ID,X,Y,DIV\n1,abc,0.0,A Division\n").unwrap_err();
        assert_eq!(err, DecodeError::EnvelopeRow { line: 2, reason: "invalid x 'abc'".to_string() });

        let err = EnvelopeStore::from_csv_str("ID,X,Y,DIV\n1,0.0,0.0\n").unwrap_err();
        assert!(matches!(err, DecodeError::EnvelopeRow { line: 2, .. }));

        let err = EnvelopeStore::from_csv_str("ID,X,Y,DIV\n1,0.0,0.0,Z Division\n").unwrap_err();
        assert!(matches!(err, DecodeError::EnvelopeRow { line: 2, .. }));
    }

    #[test]
    fn test_identity_transform() {
        let store = store();
        let base = store.points_for(DivisionId::A);
        let excess = Excess::Inside(ExcessPair::ZERO);
        let se = SuperElevation::new(0.0);
        let active =
            adjust_envelope(base, DivisionId::A, Some(CurveSide::Inside), Some(&excess), Some(&se));
        let expected: Vec<EnvelopeVertex> =
            base.iter().map(|p| EnvelopeVertex { x: p.x, y: p.y }).collect();
        assert_eq!(active, expected);
    }

    #[test]
    fn test_filters_other_divisions() {
        let all: Vec<EnvelopePoint> = store()
            .points_for(DivisionId::A)
            .iter()
            .chain(store().points_for(DivisionId::B))
            .copied()
            .collect();
        let active = adjust_envelope(&all, DivisionId::B, None, None, None);
        assert_eq!(active.len(), 3);
        assert_eq!(active[1], EnvelopeVertex { x: 0.0, y: 25.0 });
    }

    #[test]
    fn test_inside_excess_contracts() {
        let store = store();
        let excess = Excess::Inside(ExcessPair { center: 3.0, end: 2.0 });
        let active =
            adjust_envelope(store.points_for(DivisionId::A), DivisionId::A, Some(CurveSide::Inside), Some(&excess), None);
        assert_eq!(active[0], EnvelopeVertex { x: -13.0, y: 0.0 });
        assert_eq!(active[3], EnvelopeVertex { x: 7.0, y: 0.0 });
    }

    #[test]
    fn test_outside_excess_uses_worst_end() {
        let store = store();
        let excess = Excess::Outside {
            left: ExcessPair { center: 5.0, end: 1.0 },
            right: ExcessPair { center: 5.0, end: 2.0 },
        };
        let active =
            adjust_envelope(store.points_for(DivisionId::A), DivisionId::A, Some(CurveSide::Outside), Some(&excess), None);
        assert_eq!(active[0], EnvelopeVertex { x: -8.0, y: 0.0 });
    }

    #[test]
    fn test_super_elevation_rotates_opposite_tilt() {
        let point = EnvelopePoint { id: 1, x: 0.0, y: 100.0, division: DivisionId::A };
        let se = SuperElevation::new(90.0);
        let active = adjust_envelope(&[point], DivisionId::A, None, None, Some(&se));
        // 90° rotated clockwise lands on +x
        assert!((active[0].x - 100.0).abs() < 1e-9);
        assert!(active[0].y.abs() < 1e-9);
    }

    #[test]
    fn test_rotation_preserves_order_and_radius() {
        let store = store();
        let base = store.points_for(DivisionId::A);
        let se = SuperElevation::new(3.5);
        let active = adjust_envelope(base, DivisionId::A, None, None, Some(&se));
        assert_eq!(active.len(), base.len());
        for (raw, vertex) in base.iter().zip(&active) {
            assert!((raw.x.hypot(raw.y) - vertex.x.hypot(vertex.y)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_excess_ignored_without_side() {
        let store = store();
        let excess = Excess::Inside(ExcessPair { center: 3.0, end: 2.0 });
        let active = adjust_envelope(store.points_for(DivisionId::A), DivisionId::A, None, Some(&excess), None);
        assert_eq!(active[0], EnvelopeVertex { x: -10.0, y: 0.0 });
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("envelope.csv");
        std::fs::write(&path, TABLE).unwrap();
        assert_eq!(EnvelopeStore::from_file(&path).unwrap().len(), 7);

        let missing = dir.path().join("missing.csv");
        let err = EnvelopeStore::from_file(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.csv"));
    }
}
