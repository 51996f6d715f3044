//! Sensor readings published by the measuring device
//!
//! Each device topic maps to exactly one reading type. Text payloads are
//! decimal numbers; scan points arrive as `x|y` or `(x,y)`, and `SP:1` on
//! the scan topic marks the end of a sweep. Image payloads are raw bytes.

use crate::domain::command::Mutation;
use crate::domain::error::DecodeError;
use crate::domain::types::{EncoderSide, ImageSide, ScanPoint};
use serde::Deserialize;

/// Scan-complete flag on the scan-point topic
pub const SCAN_COMPLETE_FLAG: &str = "SP:1";

/// Device topic names
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceTopics {
    #[serde(default = "default_left_encoder_topic")]
    pub left_encoder: String,
    #[serde(default = "default_right_encoder_topic")]
    pub right_encoder: String,
    #[serde(default = "default_super_elevation_topic")]
    pub super_elevation: String,
    #[serde(default = "default_scan_point_topic")]
    pub scan_point: String,
    #[serde(default = "default_image_inside_topic")]
    pub image_inside: String,
    #[serde(default = "default_image_outside_topic")]
    pub image_outside: String,
    /// Published to, never subscribed
    #[serde(default = "default_command_topic")]
    pub command: String,
}

fn default_left_encoder_topic() -> String {
    "/data/LEA".to_string()
}

fn default_right_encoder_topic() -> String {
    "/data/REA".to_string()
}

fn default_super_elevation_topic() -> String {
    "/data/SEA".to_string()
}

fn default_scan_point_topic() -> String {
    "/data/SP".to_string()
}

fn default_image_inside_topic() -> String {
    "/data/LI".to_string()
}

fn default_image_outside_topic() -> String {
    "/data/RI".to_string()
}

fn default_command_topic() -> String {
    "/command".to_string()
}

impl Default for DeviceTopics {
    fn default() -> Self {
        Self {
            left_encoder: default_left_encoder_topic(),
            right_encoder: default_right_encoder_topic(),
            super_elevation: default_super_elevation_topic(),
            scan_point: default_scan_point_topic(),
            image_inside: default_image_inside_topic(),
            image_outside: default_image_outside_topic(),
            command: default_command_topic(),
        }
    }
}

impl DeviceTopics {
    /// Every topic to subscribe to
    pub fn all(&self) -> [&str; 6] {
        [
            self.left_encoder.as_str(),
            self.right_encoder.as_str(),
            self.super_elevation.as_str(),
            self.scan_point.as_str(),
            self.image_inside.as_str(),
            self.image_outside.as_str(),
        ]
    }
}

/// A single reading from the device
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    Encoder { side: EncoderSide, angle_deg: f64 },
    SuperElevation { angle_deg: f64 },
    ScanPoint(ScanPoint),
    ScanComplete,
    Image { side: ImageSide, data: Vec<u8> },
}

impl SensorReading {
    /// Decode a publish; `Ok(None)` for topics that are not device topics
    pub fn parse(
        topics: &DeviceTopics,
        topic: &str,
        payload: &[u8],
    ) -> Result<Option<Self>, DecodeError> {
        let invalid = |reason: String| DecodeError::Payload { topic: topic.to_string(), reason };

        if topic == topics.image_inside {
            return Ok(Some(SensorReading::Image { side: ImageSide::Inside, data: payload.to_vec() }));
        }
        if topic == topics.image_outside {
            return Ok(Some(SensorReading::Image { side: ImageSide::Outside, data: payload.to_vec() }));
        }

        let known = topic == topics.left_encoder
            || topic == topics.right_encoder
            || topic == topics.super_elevation
            || topic == topics.scan_point;
        if !known {
            return Ok(None);
        }

        let text = std::str::from_utf8(payload)
            .map_err(|e| invalid(format!("invalid UTF-8: {}", e)))?
            .trim();

        let number = |s: &str| {
            s.trim().parse::<f64>().map_err(|_| invalid(format!("'{}' is not a number", s.trim())))
        };

        let reading = if topic == topics.left_encoder {
            SensorReading::Encoder { side: EncoderSide::Left, angle_deg: number(text)? }
        } else if topic == topics.right_encoder {
            SensorReading::Encoder { side: EncoderSide::Right, angle_deg: number(text)? }
        } else if topic == topics.super_elevation {
            SensorReading::SuperElevation { angle_deg: number(text)? }
        } else if text == SCAN_COMPLETE_FLAG {
            SensorReading::ScanComplete
        } else {
            let (x, y) = split_scan_payload(text)
                .ok_or_else(|| invalid(format!("'{}' is not a scan point", text)))?;
            SensorReading::ScanPoint(ScanPoint::new(number(x)?, number(y)?))
        };

        Ok(Some(reading))
    }

    /// Profile change carried by this reading, if any
    pub fn into_mutation(self) -> Option<Mutation> {
        match self {
            SensorReading::Encoder { side, angle_deg } => Some(Mutation::Encoder { side, angle_deg }),
            SensorReading::SuperElevation { angle_deg } => Some(Mutation::SuperElevation { angle_deg }),
            SensorReading::ScanPoint(point) => Some(Mutation::ScanPoint(point)),
            SensorReading::Image { side, data } => Some(Mutation::Image { side, data }),
            SensorReading::ScanComplete => None,
        }
    }
}

/// Split `x|y` or `(x,y)` into its coordinates
fn split_scan_payload(text: &str) -> Option<(&str, &str)> {
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        return inner.split_once(',');
    }
    text.split_once('|')
}
