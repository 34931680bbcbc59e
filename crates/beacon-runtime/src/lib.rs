//! `beacon-runtime` – runs the landing beacon driver.
//!
//! # Modules
//!
//! - [`driver`] – [`BeaconDriver`][driver::BeaconDriver]: one poll cycle of
//!   parameter refresh, vehicle position snapshot, frame read/decode, report
//!   publishing and pose fusion.
//! - [`params`] – [`ParamStore`][params::ParamStore] and the cached
//!   [`BeaconParams`][params::BeaconParams] (target mode and axis scales).
//! - [`scheduler`] – [`run_periodic`][scheduler::run_periodic]: fixed-rate
//!   cycle runner with shutdown and cycle-limit stop conditions.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod driver;
pub mod params;
pub mod scheduler;
pub mod telemetry;

pub use driver::{BeaconDriver, CycleOutcome, DriverInfo};
pub use params::{BeaconParams, MemoryParamStore, ParamStore, ParamValue};
pub use scheduler::{StopCondition, period_for_rate, run_periodic};
pub use telemetry::{TracerProviderGuard, init_tracing};
