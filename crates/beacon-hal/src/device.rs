//! [`BeaconDevice`] – one beacon sensor behind a [`BusTransfer`].
//!
//! Owns the bus handle, the device health flag and the read-failure counter.
//! Both failure kinds (bus transfer and checksum) bump the same monotonic
//! counter; nothing is retried.

use beacon_types::{BeaconError, BeaconReport};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::bus::BusTransfer;
use crate::frame::{FRAME_LEN, RawFrame, decode_frame};

/// A beacon sensor reachable over a polled bus.
pub struct BeaconDevice<B: BusTransfer> {
    bus: B,
    read_failures: u32,
    healthy: bool,
}

impl<B: BusTransfer> BeaconDevice<B> {
    /// Wrap `bus`.  The device starts unhealthy until [`init`](Self::init)
    /// succeeds.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            read_failures: 0,
            healthy: false,
        }
    }

    /// Stable identifier of the underlying bus device.
    pub fn id(&self) -> &str {
        self.bus.id()
    }

    /// Initialise the bus.  A failure is logged here, once, and leaves the
    /// device marked unhealthy.
    ///
    /// # Errors
    ///
    /// Propagates the bus initialisation error.
    pub fn init(&mut self) -> Result<(), BeaconError> {
        match self.bus.init() {
            Ok(()) => {
                self.healthy = true;
                info!(device = %self.bus.id(), "beacon sensor initialised");
                Ok(())
            }
            Err(e) => {
                self.healthy = false;
                warn!(device = %self.bus.id(), error = %e, "beacon sensor init failed");
                Err(e)
            }
        }
    }

    /// `true` once [`init`](Self::init) has succeeded.
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Number of failed reads (transfer or checksum) since construction.
    pub fn read_failures(&self) -> u32 {
        self.read_failures
    }

    /// Raw transfer only.  Checksum failures are counted by
    /// [`read_report`](Self::read_report), so this stays private.
    fn read_frame(&mut self) -> Result<RawFrame, BeaconError> {
        let mut bytes = [0u8; FRAME_LEN];
        if let Err(e) = self.bus.transfer(&[], &mut bytes) {
            self.read_failures = self.read_failures.saturating_add(1);
            debug!(device = %self.bus.id(), failures = self.read_failures, error = %e, "bus transfer failed");
            return Err(e);
        }
        Ok(RawFrame(bytes))
    }

    /// Read and decode one frame.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::BusTransfer`] or
    /// [`BeaconError::ChecksumMismatch`]; either one counts exactly one
    /// failure.
    pub fn read_report(
        &mut self,
        scale_x: f32,
        scale_y: f32,
        timestamp: DateTime<Utc>,
    ) -> Result<BeaconReport, BeaconError> {
        let frame = self.read_frame()?;
        decode_frame(&frame, scale_x, scale_y, timestamp).inspect_err(|e| {
            self.read_failures = self.read_failures.saturating_add(1);
            debug!(device = %self.bus.id(), failures = self.read_failures, error = %e, "frame rejected");
        })
    }

    /// Borrow the underlying bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the underlying bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
