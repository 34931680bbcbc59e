//! Landing target pose fusion.
//!
//! Combines a decoded [`BeaconReport`] (target relative to the vehicle) with
//! the vehicle's own local position into a [`TargetPose`].
//!
//! The pose is only produced when all of the following hold:
//! - a vehicle position sample was obtained for this cycle;
//! - all three report position components are finite;
//! - the report status is [`STATUS_LOCKED`].
//!
//! Otherwise no pose is produced at all; the previous pose is simply not
//! refreshed.  There is no hysteresis.
//!
//! The absolute position is `relative + vehicle` per axis and is only marked
//! valid when the vehicle sample is valid and its horizontal component is
//! valid too.
//!
//! Covariance is a range-proportional approximation, not a modelled value:
//! ```text
//! cov = pos_z / 20
//! ```
//! applied identically to x, y, vx and vy.
//!
//! # Example
//!
//! ```rust
//! use beacon_perception::fusion::PoseFuser;
//! use beacon_types::{BeaconReport, TargetMode, VehicleLocalPosition};
//! use chrono::Utc;
//!
//! let fuser = PoseFuser::new(TargetMode::Stationary);
//! let report = BeaconReport {
//!     timestamp: Utc::now(),
//!     id: 1, status: 7,
//!     pos_x: 1.0, pos_y: 2.0, pos_z: 3.0,
//!     vel_x: 0.0, vel_y: 0.0,
//!     snr: 0, cl: 0, sl: 0,
//! };
//! let vehicle = VehicleLocalPosition {
//!     timestamp: Utc::now(),
//!     x: 10.0, y: 20.0, z: 30.0,
//!     valid: true, xy_valid: true,
//! };
//!
//! let pose = fuser.fuse(&report, Some(&vehicle)).unwrap();
//! assert!(pose.abs_pos_valid);
//! assert!((pose.x_abs - 11.0).abs() < 1e-5);
//! ```

use beacon_types::{BeaconReport, STATUS_LOCKED, TargetMode, TargetPose, VehicleLocalPosition};
use tracing::trace;

/// Divisor turning target range (pos_z, metres) into the covariance
/// approximation.
const COVARIANCE_RANGE_DIVISOR: f32 = 20.0;

/// Produces [`TargetPose`] estimates for a fixed [`TargetMode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseFuser {
    mode: TargetMode,
}

impl PoseFuser {
    /// Create a fuser for the given target mode.
    pub fn new(mode: TargetMode) -> Self {
        Self { mode }
    }

    /// Change the target mode (after a parameter refresh).
    pub fn set_mode(&mut self, mode: TargetMode) {
        self.mode = mode;
    }

    /// The current target mode.
    pub fn mode(&self) -> TargetMode {
        self.mode
    }

    /// Fuse one report, see [`fuse`].
    pub fn fuse(
        &self,
        report: &BeaconReport,
        vehicle: Option<&VehicleLocalPosition>,
    ) -> Option<TargetPose> {
        fuse(report, vehicle, self.mode)
    }
}

/// Fuse `report` with the vehicle sample obtained this cycle.
///
/// Returns `None` when the gate fails: no vehicle sample, a non-finite
/// position component, or a status other than [`STATUS_LOCKED`].  Gate
/// failure is an expected outcome, not an error.
pub fn fuse(
    report: &BeaconReport,
    vehicle: Option<&VehicleLocalPosition>,
    mode: TargetMode,
) -> Option<TargetPose> {
    let Some(vehicle) = vehicle else {
        trace!("no vehicle position this cycle; pose withheld");
        return None;
    };
    if !(report.pos_x.is_finite() && report.pos_y.is_finite() && report.pos_z.is_finite()) {
        trace!(id = report.id, "non-finite beacon position; pose withheld");
        return None;
    }
    if report.status != STATUS_LOCKED {
        trace!(id = report.id, status = report.status, "beacon not locked; pose withheld");
        return None;
    }

    let cov = report.pos_z / COVARIANCE_RANGE_DIVISOR;
    let mut pose = TargetPose {
        timestamp: report.timestamp,
        is_static: mode == TargetMode::Stationary,
        rel_pos_valid: true,
        rel_vel_valid: true,
        x_rel: report.pos_x,
        y_rel: report.pos_y,
        z_rel: report.pos_z,
        vx_rel: report.vel_x,
        vy_rel: report.vel_y,
        cov_x_rel: cov,
        cov_y_rel: cov,
        cov_vx_rel: cov,
        cov_vy_rel: cov,
        ..TargetPose::default()
    };

    if vehicle.valid && vehicle.xy_valid {
        pose.x_abs = report.pos_x + vehicle.x;
        pose.y_abs = report.pos_y + vehicle.y;
        pose.z_abs = report.pos_z + vehicle.z;
        pose.abs_pos_valid = true;
    }

    Some(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn report(status: u16, x: f32, y: f32, z: f32) -> BeaconReport {
        BeaconReport {
            timestamp: Utc::now(),
            id: 1,
            status,
            pos_x: x,
            pos_y: y,
            pos_z: z,
            vel_x: 0.4,
            vel_y: -0.2,
            snr: 50,
            cl: 90,
            sl: 70,
        }
    }

    fn vehicle(valid: bool, xy_valid: bool) -> VehicleLocalPosition {
        VehicleLocalPosition {
            timestamp: Utc::now(),
            x: 10.0,
            y: 20.0,
            z: 30.0,
            valid,
            xy_valid,
        }
    }

    #[test]
    fn absolute_position_is_relative_plus_vehicle() {
        let pose = fuse(
            &report(STATUS_LOCKED, 1.0, 2.0, 3.0),
            Some(&vehicle(true, true)),
            TargetMode::Moving,
        )
        .unwrap();
        assert!(pose.abs_pos_valid);
        assert!((pose.x_abs - 11.0).abs() < 1e-5);
        assert!((pose.y_abs - 22.0).abs() < 1e-5);
        assert!((pose.z_abs - 33.0).abs() < 1e-5);
    }

    #[test]
    fn relative_fields_copied_from_report() {
        let r = report(STATUS_LOCKED, 1.0, 2.0, 3.0);
        let pose = fuse(&r, Some(&vehicle(true, true)), TargetMode::Moving).unwrap();
        assert!(pose.rel_pos_valid && pose.rel_vel_valid);
        assert_eq!((pose.x_rel, pose.y_rel, pose.z_rel), (1.0, 2.0, 3.0));
        assert_eq!((pose.vx_rel, pose.vy_rel), (0.4, -0.2));
        assert_eq!(pose.timestamp, r.timestamp);
    }

    #[test]
    fn covariance_is_range_over_twenty_on_every_axis() {
        for z in [0.0_f32, 3.0, 12.5, -4.0] {
            let pose = fuse(
                &report(STATUS_LOCKED, 0.0, 0.0, z),
                Some(&vehicle(true, true)),
                TargetMode::Moving,
            )
            .unwrap();
            let expected = z / 20.0;
            assert_eq!(pose.cov_x_rel, expected);
            assert_eq!(pose.cov_y_rel, expected);
            assert_eq!(pose.cov_vx_rel, expected);
            assert_eq!(pose.cov_vy_rel, expected);
        }
    }

    #[test]
    fn unlocked_status_suppresses_pose() {
        for status in [0u16, 1, 6, 8, u16::MAX] {
            let pose = fuse(
                &report(status, 1.0, 2.0, 3.0),
                Some(&vehicle(true, true)),
                TargetMode::Moving,
            );
            assert!(pose.is_none(), "status {status} produced a pose");
        }
    }

    #[test]
    fn non_finite_position_suppresses_pose() {
        let cases = [
            report(STATUS_LOCKED, f32::NAN, 2.0, 3.0),
            report(STATUS_LOCKED, 1.0, f32::INFINITY, 3.0),
            report(STATUS_LOCKED, 1.0, 2.0, f32::NEG_INFINITY),
        ];
        for r in cases {
            assert!(fuse(&r, Some(&vehicle(true, true)), TargetMode::Moving).is_none());
        }
    }

    #[test]
    fn missing_vehicle_sample_suppresses_pose() {
        assert!(fuse(&report(STATUS_LOCKED, 1.0, 2.0, 3.0), None, TargetMode::Moving).is_none());
    }

    #[test]
    fn invalid_vehicle_keeps_relative_but_not_absolute() {
        for v in [vehicle(false, true), vehicle(false, false), vehicle(true, false)] {
            let pose = fuse(
                &report(STATUS_LOCKED, 1.0, 2.0, 3.0),
                Some(&v),
                TargetMode::Moving,
            )
            .unwrap();
            assert!(pose.rel_pos_valid);
            assert_eq!(pose.x_rel, 1.0);
            assert!(!pose.abs_pos_valid);
            assert_eq!((pose.x_abs, pose.y_abs, pose.z_abs), (0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn static_flag_follows_target_mode() {
        let r = report(STATUS_LOCKED, 1.0, 2.0, 3.0);
        let v = vehicle(true, true);

        let mut fuser = PoseFuser::default();
        assert_eq!(fuser.mode(), TargetMode::Moving);
        assert!(!fuser.fuse(&r, Some(&v)).unwrap().is_static);

        fuser.set_mode(TargetMode::Stationary);
        assert!(fuser.fuse(&r, Some(&v)).unwrap().is_static);
    }
}
