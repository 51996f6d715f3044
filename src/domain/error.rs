//! Engine error types
//!
//! All engine failures are values. None of them are fatal to the session.

use thiserror::Error;

/// Failure to derive curve geometry from the captured inputs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Bend radius requested before both encoder angles were captured
    #[error("both encoder angles must be captured before the bend radius can be computed")]
    EncodersMissing,

    /// Bend radius requested before the evaluated curve side was chosen
    #[error("curve side must be selected before the bend radius can be computed")]
    CurveSideMissing,

    /// A chord is horizontal, vertical or parallel to the other chord
    #[error("circle fit is degenerate for left={left_angle_deg}° right={right_angle_deg}°: {reason}")]
    NumericDegeneracy {
        left_angle_deg: f64,
        right_angle_deg: f64,
        reason: &'static str,
    },
}

/// Failure to decode persisted or received data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("scan point {index} '{pair}' is not an 'x|y' pair")]
    ScanPair { index: usize, pair: String },

    #[error("scan point {index} has a non-numeric coordinate '{value}'")]
    ScanCoordinate { index: usize, value: String },

    #[error("envelope line {line}: {reason}")]
    EnvelopeRow { line: usize, reason: String },

    #[error("payload on topic '{topic}' is not valid: {reason}")]
    Payload { topic: String, reason: String },

    #[error("image is not valid base64: {reason}")]
    Image { reason: String },
}
