//! Flat persistence record for a profile
//!
//! The record carries the raw inputs plus the derived bend radius and excess
//! for display. Loading a record recomputes the derived values from the raw
//! inputs, which must reproduce the stored ones.

use crate::domain::error::DecodeError;
use crate::domain::types::{
    BendRadius, CurveSide, DivisionId, Excess, Orientation, ProfileKind, ScanPoint,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identification fields of a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileIdentity {
    pub line: String,
    pub track: String,
    pub stationing: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub kind: ProfileKind,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
}

impl ProfileIdentity {
    /// Identity stamped with the current time
    pub fn new(line: &str, track: &str, stationing: &str, kind: ProfileKind) -> Self {
        Self {
            line: line.to_string(),
            track: track.to_string(),
            stationing: stationing.to_string(),
            captured_at: Utc::now(),
            kind,
            equipment: None,
            operator: None,
            orientation: None,
        }
    }

    pub fn with_equipment(mut self, equipment: &str) -> Self {
        self.equipment = Some(equipment.to_string());
        self
    }

    pub fn with_operator(mut self, operator: &str) -> Self {
        self.operator = Some(operator.to_string());
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// Everything needed to rebuild a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    #[serde(flatten)]
    pub identity: ProfileIdentity,
    #[serde(default)]
    pub curve_side: Option<CurveSide>,
    #[serde(default)]
    pub division: Option<DivisionId>,
    #[serde(default)]
    pub left_encoder_deg: Option<f64>,
    #[serde(default)]
    pub right_encoder_deg: Option<f64>,
    #[serde(default)]
    pub super_elevation_deg: Option<f64>,
    #[serde(default)]
    pub bend_radius: Option<BendRadius>,
    #[serde(default)]
    pub excess: Option<Excess>,
    /// `x|y,x|y,...`
    #[serde(default)]
    pub scan_points: String,
    /// Base64 image bytes
    #[serde(default)]
    pub image_inside: Option<String>,
    #[serde(default)]
    pub image_outside: Option<String>,
}

/// Encode scan points as `x|y,x|y,...`
///
/// Coordinates use the shortest representation that parses back to the same
/// value.
pub fn encode_scan_points(points: &[ScanPoint]) -> String {
    points.iter().map(|p| format!("{}|{}", p.x, p.y)).collect::<Vec<_>>().join(",")
}

/// Decode `x|y,x|y,...`; whitespace around pairs and coordinates is ignored
pub fn decode_scan_points(encoded: &str) -> Result<Vec<ScanPoint>, DecodeError> {
    if encoded.trim().is_empty() {
        return Ok(Vec::new());
    }

    encoded
        .split(',')
        .enumerate()
        .map(|(index, pair)| {
            let pair = pair.trim();
            let (x, y) = pair
                .split_once('|')
                .ok_or_else(|| DecodeError::ScanPair { index, pair: pair.to_string() })?;
            let coordinate = |value: &str| {
                value.trim().parse::<f64>().map_err(|_| DecodeError::ScanCoordinate {
                    index,
                    value: value.trim().to_string(),
                })
            };
            Ok(ScanPoint::new(coordinate(x)?, coordinate(y)?))
        })
        .collect()
}
