//! Measurement record captured from motion peripherals.
//!
//! # Responsibility
//! - Define the canonical sample record and its vocabulary enums.
//! - Validate component and placement combinations before persistence.
//!
//! # Invariants
//! - `id` is stable for the lifetime of a measurement and never reused.
//! - Attitude samples carry the quaternion `w` component; vector samples
//!   never do.
//!
//! # See also
//! - docs/architecture/data-stack.md

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a captured measurement.
pub type MeasurementId = Uuid;

/// Sample kind reported by a motion peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    /// Orientation quaternion from device sensor fusion.
    Attitude,
    RotationRate,
    Gravity,
    UserAcceleration,
    MagneticField,
    /// Raw accelerometer sample, gravity included.
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

impl MeasurementKind {
    /// Canonical snake_case name, shared by the wire format and SQL text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attitude => "attitude",
            Self::RotationRate => "rotation_rate",
            Self::Gravity => "gravity",
            Self::UserAcceleration => "user_acceleration",
            Self::MagneticField => "magnetic_field",
            Self::Accelerometer => "accelerometer",
            Self::Gyroscope => "gyroscope",
            Self::Magnetometer => "magnetometer",
        }
    }

    /// Parses the canonical snake_case name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "attitude" => Some(Self::Attitude),
            "rotation_rate" => Some(Self::RotationRate),
            "gravity" => Some(Self::Gravity),
            "user_acceleration" => Some(Self::UserAcceleration),
            "magnetic_field" => Some(Self::MagneticField),
            "accelerometer" => Some(Self::Accelerometer),
            "gyroscope" => Some(Self::Gyroscope),
            "magnetometer" => Some(Self::Magnetometer),
            _ => None,
        }
    }
}

/// Body side the capturing device is worn on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySide {
    #[default]
    Unknown,
    Left,
    Right,
}

impl BodySide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unknown" => Some(Self::Unknown),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Body part the capturing device is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    #[default]
    Unknown,
    Head,
    Arm,
    Wrist,
    Hip,
    Ankle,
}

impl BodyPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Head => "head",
            Self::Arm => "arm",
            Self::Wrist => "wrist",
            Self::Hip => "hip",
            Self::Ankle => "ankle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unknown" => Some(Self::Unknown),
            "head" => Some(Self::Head),
            "arm" => Some(Self::Arm),
            "wrist" => Some(Self::Wrist),
            "hip" => Some(Self::Hip),
            "ankle" => Some(Self::Ankle),
            _ => None,
        }
    }
}

/// Canonical persisted record for one motion sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Stable global ID used for export and dedup across devices.
    pub id: MeasurementId,
    /// Serialized as `type` to match the capture wire naming.
    #[serde(rename = "type")]
    pub kind: MeasurementKind,
    /// Sample time in seconds relative to the capture session start.
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Quaternion w component, present exactly for attitude samples.
    pub w: Option<f64>,
    /// Sensor-reported accuracy, when the peripheral provides one.
    pub accuracy: Option<f64>,
    pub body_side: BodySide,
    pub body_part: BodyPart,
    /// Whether the sample came from this device rather than a peripheral.
    pub is_local: bool,
}

impl Measurement {
    /// Creates a vector sample with a generated stable ID.
    pub fn new(kind: MeasurementKind, timestamp: f64, x: f64, y: f64, z: f64) -> Self {
        Self::with_id(Uuid::new_v4(), kind, timestamp, x, y, z)
    }

    /// Creates a vector sample with a caller-provided stable ID.
    pub fn with_id(
        id: MeasurementId,
        kind: MeasurementKind,
        timestamp: f64,
        x: f64,
        y: f64,
        z: f64,
    ) -> Self {
        Self {
            id,
            kind,
            timestamp,
            x,
            y,
            z,
            w: None,
            accuracy: None,
            body_side: BodySide::default(),
            body_part: BodyPart::default(),
            is_local: true,
        }
    }

    /// Creates an attitude sample carrying the quaternion w component.
    pub fn attitude(timestamp: f64, x: f64, y: f64, z: f64, w: f64) -> Self {
        let mut measurement = Self::new(MeasurementKind::Attitude, timestamp, x, y, z);
        measurement.w = Some(w);
        measurement
    }

    /// Records where the capturing device was worn.
    pub fn place(&mut self, side: BodySide, part: BodyPart) {
        self.body_side = side;
        self.body_part = part;
    }

    /// Checks the record against the persistence rules.
    ///
    /// # Errors
    /// Returns the first violated rule; see [`MeasurementValidationError`].
    pub fn validate(&self) -> Result<(), MeasurementValidationError> {
        if !self.timestamp.is_finite() {
            return Err(MeasurementValidationError::NonFiniteTimestamp);
        }
        if self.timestamp < 0.0 {
            return Err(MeasurementValidationError::NegativeTimestamp);
        }
        for (label, value) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            if !value.is_finite() {
                return Err(MeasurementValidationError::NonFiniteComponent(label));
            }
        }
        if let Some(w) = self.w {
            if !w.is_finite() {
                return Err(MeasurementValidationError::NonFiniteComponent("w"));
            }
        }
        if let Some(accuracy) = self.accuracy {
            if !accuracy.is_finite() {
                return Err(MeasurementValidationError::NonFiniteComponent("accuracy"));
            }
        }
        match (self.kind, self.w) {
            (MeasurementKind::Attitude, None) => {
                Err(MeasurementValidationError::MissingQuaternionW)
            }
            (MeasurementKind::Attitude, Some(_)) => Ok(()),
            (kind, Some(_)) => Err(MeasurementValidationError::UnexpectedQuaternionW(kind)),
            (_, None) => Ok(()),
        }
    }
}

/// Violated persistence rule reported by [`Measurement::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementValidationError {
    NonFiniteTimestamp,
    NegativeTimestamp,
    NonFiniteComponent(&'static str),
    MissingQuaternionW,
    UnexpectedQuaternionW(MeasurementKind),
}

impl Display for MeasurementValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFiniteTimestamp => write!(f, "timestamp must be a finite number"),
            Self::NegativeTimestamp => write!(f, "timestamp must not be negative"),
            Self::NonFiniteComponent(label) => {
                write!(f, "component `{label}` must be a finite number")
            }
            Self::MissingQuaternionW => {
                write!(f, "attitude samples require the quaternion w component")
            }
            Self::UnexpectedQuaternionW(kind) => {
                write!(
                    f,
                    "`{}` samples must not carry a quaternion w component",
                    kind.as_str()
                )
            }
        }
    }
}

impl Error for MeasurementValidationError {}
