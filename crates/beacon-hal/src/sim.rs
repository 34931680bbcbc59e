//! In-process simulated buses for tests and bench runs without hardware.
//!
//! * [`SimBus`] replays a scripted sequence of responses (frames, raw bytes or
//!   transfer failures).  Used by unit tests to drive exact scenarios.
//! * [`SimBeacon`] synthesises a live sensor: the target circles below the
//!   vehicle and every poll returns a fresh, correctly checksummed frame.
//!
//! # Example
//!
//! ```rust
//! use beacon_hal::device::BeaconDevice;
//! use beacon_hal::sim::SimBeacon;
//!
//! let mut device = BeaconDevice::new(SimBeacon::new("uls-sim", 2.0, 10.0));
//! device.init().expect("sim init must succeed");
//!
//! let report = device.read_report(1.0, 1.0, chrono::Utc::now()).unwrap();
//! assert!(report.is_locked());
//! ```

use std::collections::VecDeque;

use beacon_types::{BeaconError, STATUS_LOCKED};

use crate::bus::BusTransfer;
use crate::frame::{FRAME_LEN, RawFields, RawFrame};

// ────────────────────────────────────────────────────────────────────────────
// Scripted bus
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum SimResponse {
    Bytes([u8; FRAME_LEN]),
    Fail,
}

/// A bus that replays scripted responses in order.
///
/// Once the script is exhausted every transfer fails.
pub struct SimBus {
    id: String,
    script: VecDeque<SimResponse>,
    fail_init: bool,
    transfers: usize,
}

impl SimBus {
    /// Create an empty scripted bus.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: VecDeque::new(),
            fail_init: false,
            transfers: 0,
        }
    }

    /// Make [`BusTransfer::init`] fail.
    pub fn with_init_failure(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Queue a well-formed frame.
    pub fn push_frame(&mut self, frame: RawFrame) {
        self.script.push_back(SimResponse::Bytes(frame.0));
    }

    /// Queue raw bytes, checksum unchecked.
    pub fn push_bytes(&mut self, bytes: [u8; FRAME_LEN]) {
        self.script.push_back(SimResponse::Bytes(bytes));
    }

    /// Queue a failed transfer.
    pub fn push_transfer_failure(&mut self) {
        self.script.push_back(SimResponse::Fail);
    }

    /// Number of transfers attempted so far.
    pub fn transfers(&self) -> usize {
        self.transfers
    }
}

impl BusTransfer for SimBus {
    fn id(&self) -> &str {
        &self.id
    }

    fn init(&mut self) -> Result<(), BeaconError> {
        if self.fail_init {
            return Err(BeaconError::Init {
                device: self.id.clone(),
                details: "simulated init failure".to_string(),
            });
        }
        Ok(())
    }

    fn transfer(&mut self, _send: &[u8], recv: &mut [u8]) -> Result<(), BeaconError> {
        self.transfers += 1;
        match self.script.pop_front() {
            Some(SimResponse::Bytes(bytes)) => copy_frame(&self.id, &bytes, recv),
            Some(SimResponse::Fail) => Err(BeaconError::BusTransfer {
                device: self.id.clone(),
                details: "simulated NACK".to_string(),
            }),
            None => Err(BeaconError::BusTransfer {
                device: self.id.clone(),
                details: "no scripted response".to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Synthetic sensor
// ────────────────────────────────────────────────────────────────────────────

/// Angular step of the simulated target per poll (radians).
const SIM_STEP_RAD: f32 = 0.02;

/// A simulated beacon sensor tracking a target that circles below the vehicle.
///
/// Every poll advances the target by a fixed angle and returns a locked
/// frame.  Optionally every n-th frame is corrupted so the failure path can
/// be exercised on a bench.
pub struct SimBeacon {
    id: String,
    radius_m: f32,
    altitude_m: f32,
    phase: f32,
    polls: u64,
    corrupt_every: Option<u64>,
}

impl SimBeacon {
    /// Create a simulated sensor with the target circling at `radius_m`,
    /// `altitude_m` below the sensor.
    pub fn new(id: impl Into<String>, radius_m: f32, altitude_m: f32) -> Self {
        Self {
            id: id.into(),
            radius_m,
            altitude_m,
            phase: 0.0,
            polls: 0,
            corrupt_every: None,
        }
    }

    /// Corrupt the checksum of every `n`-th frame (`n = 0` disables).
    pub fn with_corruption_every(mut self, n: u64) -> Self {
        self.corrupt_every = (n > 0).then_some(n);
        self
    }

    /// Raw fields the sensor would report at the current phase.
    pub fn current_fields(&self) -> RawFields {
        let (sin, cos) = self.phase.sin_cos();
        let speed = self.radius_m * SIM_STEP_RAD;
        RawFields {
            id: 1,
            status: STATUS_LOCKED,
            pos_x: to_raw(self.radius_m * cos),
            pos_y: to_raw(self.radius_m * sin),
            pos_z: to_raw(self.altitude_m),
            vel_x: to_raw(-speed * sin),
            vel_y: to_raw(speed * cos),
            snr: 60,
            cl: 95,
            sl: 80,
        }
    }
}

impl BusTransfer for SimBeacon {
    fn id(&self) -> &str {
        &self.id
    }

    fn transfer(&mut self, _send: &[u8], recv: &mut [u8]) -> Result<(), BeaconError> {
        self.polls += 1;
        let mut bytes = RawFrame::from_fields(&self.current_fields()).0;
        self.phase = (self.phase + SIM_STEP_RAD) % std::f32::consts::TAU;

        if let Some(n) = self.corrupt_every
            && self.polls % n == 0
        {
            bytes[FRAME_LEN - 1] = bytes[FRAME_LEN - 1].wrapping_add(1);
        }
        copy_frame(&self.id, &bytes, recv)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn copy_frame(id: &str, bytes: &[u8; FRAME_LEN], recv: &mut [u8]) -> Result<(), BeaconError> {
    if recv.len() < FRAME_LEN {
        return Err(BeaconError::BusTransfer {
            device: id.to_string(),
            details: format!("receive buffer too short: {} < {FRAME_LEN}", recv.len()),
        });
    }
    recv[..FRAME_LEN].copy_from_slice(bytes);
    Ok(())
}

/// Metres → sensor centimetres, saturating at the `i16` range.
fn to_raw(metres: f32) -> i16 {
    (metres * 100.0).round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}
