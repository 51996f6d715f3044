//! Profile mutations and the recomputation each one requires, plus the
//! instructions this tool sends back to the measuring device

use crate::domain::types::{
    CurveSide, DivisionId, EncoderSide, ImageSide, ScanPoint, UnknownLabel,
};

/// Everything that can change a profile's inputs
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Encoder { side: EncoderSide, angle_deg: f64 },
    SuperElevation { angle_deg: f64 },
    ScanPoint(ScanPoint),
    Division(DivisionId),
    CurveSide(CurveSide),
    Image { side: ImageSide, data: Vec<u8> },
}

/// Derived state that must be rebuilt after a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Recompute {
    /// Nothing derived depends on the input
    Nothing,
    /// Active envelope only
    Envelope,
    /// Bend radius, then excess, then active envelope
    Geometry,
}

impl Mutation {
    /// Minimal recomputation for this mutation
    pub fn cascade(&self) -> Recompute {
        match self {
            Mutation::Encoder { .. } | Mutation::Division(_) | Mutation::CurveSide(_) => {
                Recompute::Geometry
            }
            Mutation::SuperElevation { .. } => Recompute::Envelope,
            Mutation::ScanPoint(_) | Mutation::Image { .. } => Recompute::Nothing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mutation::Encoder { side: EncoderSide::Left, .. } => "left_encoder",
            Mutation::Encoder { side: EncoderSide::Right, .. } => "right_encoder",
            Mutation::SuperElevation { .. } => "super_elevation",
            Mutation::ScanPoint(_) => "scan_point",
            Mutation::Division(_) => "division",
            Mutation::CurveSide(_) => "curve_side",
            Mutation::Image { .. } => "image",
        }
    }
}

/// Instruction published on the device command topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Report the angle of one encoder chord
    CaptureEncoder(EncoderSide),
    /// Report the tilt sensor angle
    CaptureSuperElevation,
    /// Spin up the scanner motor; required before a scan
    MotorOn,
    StartScan,
    CaptureImages,
}

impl DeviceCommand {
    /// Full measurement of one location, in the order the device expects
    pub const MEASUREMENT: [DeviceCommand; 5] = [
        DeviceCommand::CaptureEncoder(EncoderSide::Left),
        DeviceCommand::CaptureEncoder(EncoderSide::Right),
        DeviceCommand::CaptureSuperElevation,
        DeviceCommand::MotorOn,
        DeviceCommand::StartScan,
    ];

    /// Wire payload understood by the device firmware
    pub fn payload(&self) -> &'static str {
        match self {
            DeviceCommand::CaptureEncoder(EncoderSide::Left) => "ERLE",
            DeviceCommand::CaptureEncoder(EncoderSide::Right) => "ERRE",
            DeviceCommand::CaptureSuperElevation => "ERSE",
            DeviceCommand::MotorOn => "ETTM:1",
            DeviceCommand::StartScan => "ETSP",
            DeviceCommand::CaptureImages => "ETCI",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCommand::CaptureEncoder(EncoderSide::Left) => "left-encoder",
            DeviceCommand::CaptureEncoder(EncoderSide::Right) => "right-encoder",
            DeviceCommand::CaptureSuperElevation => "super-elevation",
            DeviceCommand::MotorOn => "motor-on",
            DeviceCommand::StartScan => "start-scan",
            DeviceCommand::CaptureImages => "capture-images",
        }
    }
}

impl std::str::FromStr for DeviceCommand {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left-encoder" => Ok(DeviceCommand::CaptureEncoder(EncoderSide::Left)),
            "right-encoder" => Ok(DeviceCommand::CaptureEncoder(EncoderSide::Right)),
            "super-elevation" => Ok(DeviceCommand::CaptureSuperElevation),
            "motor-on" => Ok(DeviceCommand::MotorOn),
            "start-scan" => Ok(DeviceCommand::StartScan),
            "capture-images" => Ok(DeviceCommand::CaptureImages),
            _ => Err(UnknownLabel { kind: "device command", value: s.trim().to_string() }),
        }
    }
}
