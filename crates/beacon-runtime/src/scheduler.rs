//! Fixed-cadence cycle runner.
//!
//! The driver never decides when to read; something outside calls
//! [`BeaconDriver::update`][crate::driver::BeaconDriver::update] at a fixed
//! rate.  [`run_periodic`] is that something for the daemon and tests.
//! Missed ticks are skipped rather than bursted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use beacon_types::BeaconError;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

/// Longest tick period accepted by [`run_periodic`].
const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// When to stop a [`run_periodic`] loop.
#[derive(Debug, Clone, Default)]
pub struct StopCondition {
    /// Stop once this flag is set.
    pub shutdown: Arc<AtomicBool>,
    /// Stop after this many cycles.
    pub max_cycles: Option<u64>,
}

/// Call `cycle` at `rate_hz` until `stop` says otherwise.
///
/// `cycle` receives the 1-based cycle number.  Returns the number of cycles
/// run.
///
/// # Errors
///
/// Returns [`BeaconError::Parameter`] if `rate_hz` has no usable tick
/// period, see [`period_for_rate`].
pub async fn run_periodic<F>(rate_hz: f32, stop: StopCondition, mut cycle: F) -> Result<u64, BeaconError>
where
    F: FnMut(u64),
{
    let period = period_for_rate(rate_hz)?;
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(rate_hz, period_ms = period.as_millis() as u64, "periodic runner started");

    let mut count = 0u64;
    loop {
        if stop.shutdown.load(Ordering::SeqCst) {
            break;
        }
        if stop.max_cycles.is_some_and(|max| count >= max) {
            break;
        }
        ticker.tick().await;
        count += 1;
        cycle(count);
    }

    info!(cycles = count, "periodic runner stopped");
    Ok(count)
}

/// Tick period for `rate_hz`.
///
/// # Errors
///
/// Returns [`BeaconError::Parameter`] when the rate is not positive and
/// finite, or when its period is zero or longer than a day.
pub fn period_for_rate(rate_hz: f32) -> Result<Duration, BeaconError> {
    if !(rate_hz.is_finite() && rate_hz > 0.0) {
        return Err(BeaconError::Parameter(format!(
            "poll rate must be positive, got {rate_hz}"
        )));
    }
    match Duration::try_from_secs_f32(1.0 / rate_hz) {
        Ok(period) if !period.is_zero() && period <= MAX_PERIOD => Ok(period),
        _ => Err(BeaconError::Parameter(format!(
            "poll rate {rate_hz} Hz has no usable tick period"
        ))),
    }
}
