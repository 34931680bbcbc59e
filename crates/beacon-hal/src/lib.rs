//! `beacon-hal` – Beacon sensor hardware layer.
//!
//! # Modules
//!
//! - [`bus`] – [`BusTransfer`][bus::BusTransfer]: the raw byte-exchange
//!   primitive every bus driver implements.
//! - [`frame`] – the 18-byte telemetry frame codec: checksum validation and
//!   conversion into a [`BeaconReport`][beacon_types::BeaconReport].
//! - [`device`] – [`BeaconDevice`][device::BeaconDevice]: one sensor instance
//!   with its health flag and read-failure counter.
//! - [`sim`] – scripted and synthetic buses for tests and bench runs.

pub mod bus;
pub mod device;
pub mod frame;
pub mod sim;

pub use bus::BusTransfer;
pub use device::BeaconDevice;
pub use frame::{FRAME_LEN, RawFields, RawFrame, decode_frame};
pub use sim::{SimBeacon, SimBus};
