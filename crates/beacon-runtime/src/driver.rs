//! [`BeaconDriver`] – one poll cycle of the landing beacon.
//!
//! Each call to [`BeaconDriver::update`] runs, in order:
//!
//! 1. **Parameters** – re-read the [`BeaconParams`] cache if a parameter
//!    update notification arrived (forced once at construction).
//! 2. **Vehicle position** – take the newest vehicle local position sample
//!    published since the previous cycle, if any.
//! 3. **Read** – read and decode one frame through the [`BeaconDevice`].
//!    Transfer and checksum failures are counted by the device and end the
//!    cycle.
//! 4. **Publish report** – every decoded report goes out on
//!    [`Topic::BeaconReport`].
//! 5. **Fuse** – the report and the vehicle sample from step 2 go through
//!    the [`PoseFuser`]; a pose is published on [`Topic::LandingTargetPose`]
//!    only when the gate passes.
//!
//! The vehicle sample and the report are always from the same cycle.

use beacon_hal::{BeaconDevice, BusTransfer};
use beacon_middleware::{EventBus, Topic, TopicReceiver};
use beacon_perception::PoseFuser;
use beacon_types::{
    BeaconError, BeaconReport, Event, EventPayload, TargetPose, VehicleLocalPosition,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::params::{BeaconParams, ParamStore};

/// What happened during one [`BeaconDriver::update`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The read failed; nothing was published.
    ReadFailed(BeaconError),
    /// A report was published but the pose gate did not pass.
    ReportOnly(BeaconReport),
    /// Both a report and a pose were published.
    Pose(BeaconReport, TargetPose),
}

impl CycleOutcome {
    /// The pose published this cycle, if any.
    pub fn pose(&self) -> Option<&TargetPose> {
        match self {
            CycleOutcome::Pose(_, pose) => Some(pose),
            _ => None,
        }
    }
}

/// Driver health and counters, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct DriverInfo {
    pub device: String,
    pub healthy: bool,
    pub read_failures: u32,
    pub cycles: u64,
    pub reports_published: u64,
    pub poses_published: u64,
    pub params: BeaconParams,
}

/// Orchestrates decode, fusion and publishing for one beacon sensor.
pub struct BeaconDriver<B: BusTransfer, P: ParamStore> {
    device: BeaconDevice<B>,
    store: P,
    params: BeaconParams,
    fuser: PoseFuser,
    bus: EventBus,
    source: String,
    vehicle_rx: TopicReceiver,
    param_rx: TopicReceiver,
    last_report: Option<BeaconReport>,
    cycles: u64,
    reports_published: u64,
    poses_published: u64,
}

impl<B: BusTransfer, P: ParamStore> BeaconDriver<B, P> {
    /// Build a driver around `device`, subscribe to the vehicle position and
    /// parameter update topics on `bus`, and force a parameter read.
    pub fn new(device: BeaconDevice<B>, store: P, bus: EventBus) -> Self {
        let source = format!("beacon-runtime::{}", device.id());
        let vehicle_rx = bus.subscribe_to(Topic::VehicleLocalPosition);
        let param_rx = bus.subscribe_to(Topic::ParameterUpdate);
        let mut driver = Self {
            device,
            store,
            params: BeaconParams::default(),
            fuser: PoseFuser::default(),
            bus,
            source,
            vehicle_rx,
            param_rx,
            last_report: None,
            cycles: 0,
            reports_published: 0,
            poses_published: 0,
        };
        driver.check_params(true);
        driver
    }

    /// Initialise the sensor.  Failure is reported once here and reflected
    /// in [`info`](Self::info); cycles still run and count failed reads.
    ///
    /// # Errors
    ///
    /// Propagates the device initialisation error.
    pub fn init(&mut self) -> Result<(), BeaconError> {
        self.device.init()
    }

    /// Run one poll cycle.
    #[instrument(skip(self), fields(device = %self.device.id(), cycle = self.cycles))]
    pub fn update(&mut self) -> CycleOutcome {
        self.cycles += 1;
        self.check_params(false);
        let vehicle = self.poll_vehicle_position();
        self.read_device(vehicle.as_ref())
    }

    /// Currently cached parameters.
    pub fn params(&self) -> BeaconParams {
        self.params
    }

    /// Most recent successfully decoded report.
    pub fn last_report(&self) -> Option<&BeaconReport> {
        self.last_report.as_ref()
    }

    /// Borrow the underlying device.
    pub fn device(&self) -> &BeaconDevice<B> {
        &self.device
    }

    /// Mutably borrow the underlying device.
    pub fn device_mut(&mut self) -> &mut BeaconDevice<B> {
        &mut self.device
    }

    /// Health and counters.
    pub fn info(&self) -> DriverInfo {
        DriverInfo {
            device: self.device.id().to_string(),
            healthy: self.device.is_healthy(),
            read_failures: self.device.read_failures(),
            cycles: self.cycles,
            reports_published: self.reports_published,
            poses_published: self.poses_published,
            params: self.params,
        }
    }

    /// One-line dump of the last report, positions and velocities in
    /// centimetres, followed by the read-failure count.
    pub fn status_line(&self) -> String {
        let r = self.last_report.as_ref();
        let cm = |v: Option<f32>| v.map_or(0.0, |v| f64::from(v) * 100.0);
        format!(
            "id:{} status:{} x:{:.2} y:{:.2} z:{:.2} vx:{:.2} vy:{:.2} snr:{} cl:{} sl:{} RE:{}",
            r.map_or(0, |r| r.id),
            r.map_or(0, |r| r.status),
            cm(r.map(|r| r.pos_x)),
            cm(r.map(|r| r.pos_y)),
            cm(r.map(|r| r.pos_z)),
            cm(r.map(|r| r.vel_x)),
            cm(r.map(|r| r.vel_y)),
            r.map_or(0, |r| r.snr),
            r.map_or(0, |r| r.cl),
            r.map_or(0, |r| r.sl),
            self.device.read_failures(),
        )
    }

    // ------------------------------------------------------------------
    // Cycle steps
    // ------------------------------------------------------------------

    fn check_params(&mut self, force: bool) {
        let updated = self.param_rx.try_latest().is_some();
        if !(updated || force) {
            return;
        }
        let mut params = self.params;
        if let Err(e) = params.refresh_from(&self.store) {
            warn!(error = %e, "parameter refresh failed; keeping partially updated values");
        }
        if params != self.params {
            debug!(?params, "beacon parameters updated");
        }
        self.params = params;
        self.fuser.set_mode(params.mode);
    }

    fn poll_vehicle_position(&mut self) -> Option<VehicleLocalPosition> {
        match self.vehicle_rx.try_latest()?.payload {
            EventPayload::VehicleLocalPosition(position) => Some(position),
            _ => None,
        }
    }

    fn read_device(&mut self, vehicle: Option<&VehicleLocalPosition>) -> CycleOutcome {
        let timestamp = Utc::now();
        let report = match self
            .device
            .read_report(self.params.scale_x, self.params.scale_y, timestamp)
        {
            Ok(report) => report,
            Err(e) => return CycleOutcome::ReadFailed(e),
        };
        self.last_report = Some(report);

        self.publish(Topic::BeaconReport, EventPayload::BeaconReport(report));
        self.reports_published += 1;

        match self.fuser.fuse(&report, vehicle) {
            Some(pose) => {
                self.publish(Topic::LandingTargetPose, EventPayload::TargetPose(pose));
                self.poses_published += 1;
                CycleOutcome::Pose(report, pose)
            }
            None => {
                trace!(status = report.status, "pose gate not passed");
                CycleOutcome::ReportOnly(report)
            }
        }
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        if let Err(e) = self
            .bus
            .publish_to(topic, Event::new(self.source.clone(), payload))
        {
            warn!(?topic, error = %e, "publish failed");
        }
    }
}
