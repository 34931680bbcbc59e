use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Beacon status code meaning the sensor has a full, trusted track on the
/// landing target.  Every other value means "not fully tracking".
pub const STATUS_LOCKED: u16 = 7;

/// How the landing target is expected to behave.
///
/// Selected through the integer `LTEST_MODE` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum TargetMode {
    /// The target may move (e.g. a ship deck or a rover).
    #[default]
    Moving,
    /// The target is fixed to the ground.
    Stationary,
}

impl TargetMode {
    /// Map the raw parameter value onto a mode.
    ///
    /// `1` selects [`TargetMode::Stationary`]; `0` and every unrecognised
    /// value fall back to [`TargetMode::Moving`], which never claims the
    /// target is static.
    pub fn from_param(value: i32) -> Self {
        match value {
            1 => TargetMode::Stationary,
            _ => TargetMode::Moving,
        }
    }

    /// The raw parameter value for this mode.
    pub fn as_param(self) -> i32 {
        match self {
            TargetMode::Moving => 0,
            TargetMode::Stationary => 1,
        }
    }
}

/// Decoded, unit-converted beacon sensor snapshot.
///
/// Only ever built from a frame whose checksum matched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BeaconReport {
    pub timestamp: DateTime<Utc>,
    /// Numeric beacon identifier.
    pub id: u16,
    /// Tracking status code, see [`STATUS_LOCKED`].
    pub status: u16,
    /// Target position relative to the sensor (metres).
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    /// Target velocity relative to the sensor (m/s).
    pub vel_x: f32,
    pub vel_y: f32,
    /// Signal-to-noise ratio.
    pub snr: u8,
    /// Confidence level.
    pub cl: u8,
    /// Signal level.
    pub sl: u8,
}

impl BeaconReport {
    /// `true` when the sensor reports a full track on the target.
    pub fn is_locked(&self) -> bool {
        self.status == STATUS_LOCKED
    }
}

/// Latest vehicle local position sample from the navigation estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleLocalPosition {
    pub timestamp: DateTime<Utc>,
    /// Vehicle position in the local frame (metres).
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Overall validity of the sample.
    pub valid: bool,
    /// Validity of the horizontal (x, y) component.
    pub xy_valid: bool,
}

/// Landing target pose derived from a [`BeaconReport`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TargetPose {
    pub timestamp: DateTime<Utc>,
    pub is_static: bool,

    pub rel_pos_valid: bool,
    pub rel_vel_valid: bool,

    /// Target position relative to the vehicle (metres).
    pub x_rel: f32,
    pub y_rel: f32,
    pub z_rel: f32,
    /// Target velocity relative to the vehicle (m/s).
    pub vx_rel: f32,
    pub vy_rel: f32,

    pub cov_x_rel: f32,
    pub cov_y_rel: f32,
    pub cov_vx_rel: f32,
    pub cov_vy_rel: f32,

    pub abs_pos_valid: bool,
    /// Target position in the vehicle's local frame (metres).
    pub x_abs: f32,
    pub y_abs: f32,
    pub z_abs: f32,
}

/// Unified event wrapper for the topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "beacon-runtime::uls-qr1"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh event stamped with the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    BeaconReport(BeaconReport),
    TargetPose(TargetPose),
    VehicleLocalPosition(VehicleLocalPosition),
    /// A parameter in the store changed; listeners should re-read.
    ParameterUpdate { name: String },
}

/// Error type shared by the bus driver, the topic bus and the runtime.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BeaconError {
    #[error("Bus transfer failed on {device}: {details}")]
    BusTransfer { device: String, details: String },

    #[error("Frame checksum mismatch: expected {expected:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("Device {device} failed to initialise: {details}")]
    Init { device: String, details: String },

    #[error("Parameter Error: {0}")]
    Parameter(String),

    #[error("Channel Error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report(status: u16) -> BeaconReport {
        BeaconReport {
            timestamp: Utc::now(),
            id: 3,
            status,
            pos_x: 1.0,
            pos_y: -2.0,
            pos_z: 8.5,
            vel_x: 0.1,
            vel_y: 0.0,
            snr: 40,
            cl: 90,
            sl: 12,
        }
    }

    #[test]
    fn target_mode_from_param() {
        assert_eq!(TargetMode::from_param(0), TargetMode::Moving);
        assert_eq!(TargetMode::from_param(1), TargetMode::Stationary);
        // Unknown selectors never claim a static target.
        assert_eq!(TargetMode::from_param(2), TargetMode::Moving);
        assert_eq!(TargetMode::from_param(-1), TargetMode::Moving);
    }

    #[test]
    fn target_mode_param_roundtrip() {
        for mode in [TargetMode::Moving, TargetMode::Stationary] {
            assert_eq!(TargetMode::from_param(mode.as_param()), mode);
        }
    }

    #[test]
    fn report_locked_only_on_status_seven() {
        assert!(sample_report(STATUS_LOCKED).is_locked());
        assert!(!sample_report(6).is_locked());
        assert!(!sample_report(0).is_locked());
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "beacon-runtime::test",
            EventPayload::BeaconReport(sample_report(STATUS_LOCKED)),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
        match back.payload {
            EventPayload::BeaconReport(r) => assert_eq!(r.id, 3),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn target_pose_default_is_invalid() {
        let pose = TargetPose::default();
        assert!(!pose.rel_pos_valid);
        assert!(!pose.rel_vel_valid);
        assert!(!pose.abs_pos_valid);
    }

    #[test]
    fn beacon_error_display() {
        let err = BeaconError::ChecksumMismatch {
            expected: 0x10,
            computed: 0x0f,
        };
        assert!(err.to_string().contains("0x10"));

        let err2 = BeaconError::BusTransfer {
            device: "uls-qr1".to_string(),
            details: "nack".to_string(),
        };
        assert!(err2.to_string().contains("uls-qr1"));
    }
}
