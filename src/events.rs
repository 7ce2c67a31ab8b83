// FallGuard - Sensor Samples, Alerts & Engine Outcomes

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Sensor Data
// ---------------------------------------------------------------------------

/// Which physical sensor produced a [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Linear acceleration including gravity, m/s².
    Accelerometer,
    /// Angular rate, rad/s.
    Gyroscope,
    /// Low-passed gravity vector, m/s².
    Gravity,
}

impl SensorKind {
    /// Short label used by the trace format.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accelerometer => "accel",
            Self::Gyroscope => "gyro",
            Self::Gravity => "gravity",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "accel" | "accelerometer" => Some(Self::Accelerometer),
            "gyro" | "gyroscope" => Some(Self::Gyroscope),
            "gravity" => Some(Self::Gravity),
            _ => None,
        }
    }
}

/// One timestamped 3-axis reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub axis_values: [f64; 3],
    pub timestamp_ms: u64,
    pub kind: SensorKind,
}

impl Sample {
    pub fn new(kind: SensorKind, axis_values: [f64; 3], timestamp_ms: u64) -> Self {
        Self {
            axis_values,
            timestamp_ms,
            kind,
        }
    }

    pub fn accel(axis_values: [f64; 3], timestamp_ms: u64) -> Self {
        Self::new(SensorKind::Accelerometer, axis_values, timestamp_ms)
    }

    pub fn gyro(axis_values: [f64; 3], timestamp_ms: u64) -> Self {
        Self::new(SensorKind::Gyroscope, axis_values, timestamp_ms)
    }

    pub fn gravity(axis_values: [f64; 3], timestamp_ms: u64) -> Self {
        Self::new(SensorKind::Gravity, axis_values, timestamp_ms)
    }

    pub fn is_finite(&self) -> bool {
        self.axis_values.iter().all(|v| v.is_finite())
    }

    pub fn magnitude(&self) -> f64 {
        magnitude(self.axis_values)
    }
}

/// Euclidean norm of a 3-axis vector.
pub fn magnitude(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Heuristic that raised a fall suspicion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    FreeFallImpact,
    OrientationImpact,
    HighImpact,
    Tumbling,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FreeFallImpact => "free_fall_impact",
            Self::OrientationImpact => "orientation_impact",
            Self::HighImpact => "high_impact",
            Self::Tumbling => "tumbling",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handed to the alert sink once per confirmed fall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertEvent {
    /// Filtered accelerometer magnitude when the suspicion was raised, m/s².
    pub acceleration_magnitude: f64,
    /// Latest gyroscope magnitude when the suspicion was raised, rad/s.
    pub gyro_magnitude: f64,
    pub trigger: Trigger,
    pub suspected_at_ms: u64,
    pub confirmed_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotRunning,
    NonFinite,
    OutOfOrder,
}

/// Why a suspicion ended without an alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dismissal {
    /// The wearer kept moving.
    Movement { variance: f64 },
    /// Too few samples arrived during the window to judge.
    InsufficientSamples { count: usize },
}

/// What a single `feed()` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedOutcome {
    Dropped(DropReason),
    /// Sample absorbed, nothing noteworthy happened.
    Observed,
    /// Cooldown gate is closed; classification skipped.
    CoolingDown,
    Suspected(Trigger),
    /// Inside the immobility window, verdict pending.
    Verifying,
    Confirmed(AlertEvent),
    Dismissed(Dismissal),
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Scripted fall signatures for demos and conformance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallType {
    HighImpact,
    FreeFall,
    OrientationChange,
    Tumbling,
}

impl FallType {
    pub const ALL: [FallType; 4] = [
        FallType::HighImpact,
        FallType::FreeFall,
        FallType::OrientationChange,
        FallType::Tumbling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighImpact => "high_impact",
            Self::FreeFall => "free_fall",
            Self::OrientationChange => "orientation",
            Self::Tumbling => "tumbling",
        }
    }

    /// The heuristic the script is built to trip.
    pub fn expected_trigger(&self) -> Trigger {
        match self {
            Self::HighImpact => Trigger::HighImpact,
            Self::FreeFall => Trigger::FreeFallImpact,
            Self::OrientationChange => Trigger::OrientationImpact,
            Self::Tumbling => Trigger::Tumbling,
        }
    }
}

impl fmt::Display for FallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown fall type `{0}` (expected high_impact, free_fall, orientation or tumbling)")]
pub struct UnknownFallType(pub String);

impl FromStr for FallType {
    type Err = UnknownFallType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_impact" => Ok(Self::HighImpact),
            "free_fall" => Ok(Self::FreeFall),
            "orientation" => Ok(Self::OrientationChange),
            "tumbling" => Ok(Self::Tumbling),
            other => Err(UnknownFallType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_serializes_as_json() {
        let event = AlertEvent {
            acceleration_magnitude: 23.5,
            gyro_magnitude: f64::INFINITY,
            trigger: Trigger::FreeFallImpact,
            suspected_at_ms: 220,
            confirmed_at_ms: 3_220,
        };
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["trigger"], "free_fall_impact");
        assert_eq!(json["acceleration_magnitude"], 23.5);
        // Non-finite readings stay valid JSON.
        assert!(json["gyro_magnitude"].is_null());
        assert_eq!(json["confirmed_at_ms"], 3_220);
    }

    #[test]
    fn trigger_json_matches_display() {
        for trigger in [
            Trigger::FreeFallImpact,
            Trigger::OrientationImpact,
            Trigger::HighImpact,
            Trigger::Tumbling,
        ] {
            assert_eq!(serde_json::to_string(&trigger).unwrap(), format!("\"{trigger}\""));
        }
    }

    #[test]
    fn magnitude_is_euclidean_norm() {
        assert_eq!(magnitude([3.0, 4.0, 0.0]), 5.0);
        assert!((Sample::accel([0.0, 0.0, -9.81], 0).magnitude() - 9.81).abs() < 1e-12);
    }

    #[test]
    fn non_finite_axes_are_detected() {
        assert!(!Sample::accel([f64::NAN, 0.0, 0.0], 0).is_finite());
        assert!(!Sample::gyro([0.0, f64::INFINITY, 0.0], 0).is_finite());
        assert!(Sample::gravity([0.0, 0.0, 9.81], 0).is_finite());
    }

    #[test]
    fn fall_types_parse_from_their_labels() {
        for fall_type in FallType::ALL {
            assert_eq!(fall_type.as_str().parse::<FallType>(), Ok(fall_type));
        }
        assert_eq!(
            "slip".parse::<FallType>(),
            Err(UnknownFallType("slip".to_string()))
        );
    }

    #[test]
    fn sensor_labels_round_trip() {
        for kind in [SensorKind::Accelerometer, SensorKind::Gyroscope, SensorKind::Gravity] {
            assert_eq!(SensorKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(SensorKind::from_label("magnetometer"), None);
    }
}
