//! `beacon-perception` – turns beacon sensor reports into landing target
//! estimates.
//!
//! # Modules
//!
//! - [`fusion`] – [`PoseFuser`][fusion::PoseFuser]: gates a decoded
//!   [`BeaconReport`][beacon_types::BeaconReport] on tracking status and
//!   finiteness, then composes it with the vehicle local position into a
//!   [`TargetPose`][beacon_types::TargetPose].

pub mod fusion;

pub use fusion::{PoseFuser, fuse};
