//! `beacond` – landing beacon daemon.
//!
//! Runs the beacon driver at a fixed cadence against the simulated sensor
//! and a simulated vehicle position feed, so the whole decode → publish →
//! fuse path can be exercised on a bench.
//!
//! ```text
//! beacond [run] [--cycles N]   poll until Ctrl-C (or N cycles)
//! beacond info [--json]        show configuration and sensor health
//! beacond schema               print JSON Schemas of the published messages
//! ```

mod config;

use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use beacon_hal::{BeaconDevice, SimBeacon};
use beacon_middleware::{EventBus, Topic};
use beacon_runtime::params::{PARAM_MODE, PARAM_SCALE_X, PARAM_SCALE_Y};
use beacon_runtime::{
    BeaconDriver, CycleOutcome, DriverInfo, MemoryParamStore, ParamValue, StopCondition,
    run_periodic,
};
use beacon_types::{
    BeaconError, BeaconReport, Event, EventPayload, TargetPose, VehicleLocalPosition,
};

/// Landing beacon decoder and target pose publisher
#[derive(Parser, Debug)]
#[command(name = "beacond")]
#[command(version)]
struct Cli {
    // `None` runs with no cycle limit.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Poll the simulated beacon until Ctrl-C
    Run {
        /// Stop after this many cycles
        #[arg(short = 'n', long)]
        cycles: Option<u64>,
    },

    /// Show configuration and sensor health
    Info {
        /// Print the driver snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print JSON Schemas of the published messages
    Schema,
}

fn main() {
    let _guard = beacon_runtime::init_tracing("beacond");

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run { cycles: None }) {
        Command::Schema => print_schemas(),
        Command::Info { json } => {
            let cfg = resolve_config();
            print_info(&cfg, json);
        }
        Command::Run { cycles } => {
            let cfg = resolve_config();
            if let Err(e) = run(&cfg, cycles) {
                eprintln!("{}: {}", "error".red().bold(), e);
                std::process::exit(1);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Load the config, writing the defaults on first run.  Errors fall back to
/// defaults.
fn resolve_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => info!(path = %config::config_path().display(), "default config written"),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            warn!(error = %e, "config error; using defaults");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

/// Seed the parameter store from the config file values.
fn seed_params(store: &MemoryParamStore, cfg: &config::Config) -> Result<(), BeaconError> {
    store.set(PARAM_MODE, ParamValue::Int(cfg.target_mode))?;
    store.set(PARAM_SCALE_X, ParamValue::Float(cfg.scale_x))?;
    store.set(PARAM_SCALE_Y, ParamValue::Float(cfg.scale_y))?;
    Ok(())
}

fn sim_device(cfg: &config::Config) -> BeaconDevice<SimBeacon> {
    BeaconDevice::new(
        SimBeacon::new(
            cfg.device_id.clone(),
            cfg.sim_target_radius_m,
            cfg.sim_altitude_m,
        )
        .with_corruption_every(cfg.sim_corrupt_every),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn run(cfg: &config::Config, cycles: Option<u64>) -> Result<(), BeaconError> {
    let bus = EventBus::default();
    let store = MemoryParamStore::with_notifications(bus.clone());
    seed_params(&store, cfg)?;

    let mut driver = BeaconDriver::new(sim_device(cfg), store, bus.clone());
    if driver.init().is_err() {
        println!("  {}", "sensor is not healthy".yellow());
    }

    let stop = StopCondition {
        max_cycles: cycles,
        ..StopCondition::default()
    };
    let shutdown = stop.shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    println!(
        "  {} polling {} at {} Hz (Ctrl-C to stop)",
        "▶".green().bold(),
        cfg.device_id.bold(),
        cfg.poll_rate_hz
    );

    let status_every = (cfg.poll_rate_hz.round() as u64).max(1);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| BeaconError::Channel(format!("failed to start runtime: {e}")))?;

    runtime.block_on(run_periodic(cfg.poll_rate_hz, stop, |cycle| {
        publish_vehicle_position(&bus, cycle, cfg.poll_rate_hz);
        match driver.update() {
            CycleOutcome::Pose(_, pose) if cycle % status_every == 0 => info!(
                x_abs = pose.x_abs,
                y_abs = pose.y_abs,
                z_abs = pose.z_abs,
                is_static = pose.is_static,
                "landing target"
            ),
            CycleOutcome::ReadFailed(e) => {
                warn!(error = %e, failures = driver.device().read_failures(), "beacon read failed")
            }
            _ => {}
        }
        if cycle % status_every == 0 {
            info!("{}", driver.status_line());
        }
    }))?;

    let stats = driver.info();
    println!();
    println!("  {}", driver.status_line().dimmed());
    println!(
        "  {} cycles, {} reports, {} poses, {} read failures",
        stats.cycles, stats.reports_published, stats.poses_published, stats.read_failures
    );
    Ok(())
}

/// Simulated vehicle hovering over the origin with a slow drift in x.
fn publish_vehicle_position(bus: &EventBus, cycle: u64, rate_hz: f32) {
    let t = cycle as f32 / rate_hz;
    let sample = VehicleLocalPosition {
        timestamp: chrono::Utc::now(),
        x: 0.05 * t,
        y: 0.0,
        z: -10.0,
        valid: true,
        xy_valid: true,
    };
    let event = Event::new("beacond::sim-vehicle", EventPayload::VehicleLocalPosition(sample));
    if let Err(e) = bus.publish_to(Topic::VehicleLocalPosition, event) {
        warn!(error = %e, "vehicle position publish failed");
    }
}

/// Build a driver from the config, initialise its sensor once and return
/// its health and counters.
fn info_snapshot(cfg: &config::Config) -> Result<DriverInfo, BeaconError> {
    let bus = EventBus::default();
    let store = MemoryParamStore::new();
    seed_params(&store, cfg)?;
    let mut driver = BeaconDriver::new(sim_device(cfg), store, bus);
    // Init failure shows up as `healthy: false`.
    let _ = driver.init();
    Ok(driver.info())
}

fn print_info(cfg: &config::Config, json: bool) {
    let snapshot = match info_snapshot(cfg) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            return;
        }
    };

    if json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("{}: {}", "error".red().bold(), e),
        }
        return;
    }

    println!("  {}", "Configuration".bold());
    println!("    path          : {}", config::config_path().display());
    println!("    device        : {}", snapshot.device);
    println!("    poll rate     : {} Hz", cfg.poll_rate_hz);
    println!("    {PARAM_MODE}    : {:?}", snapshot.params.mode);
    println!("    {PARAM_SCALE_X} : {}", snapshot.params.scale_x);
    println!("    {PARAM_SCALE_Y} : {}", snapshot.params.scale_y);

    println!();
    println!("  {}", "Sensor".bold());
    if snapshot.healthy {
        println!("    {} sensor is ok", "✓".green().bold());
    } else {
        println!("    {} sensor is not healthy", "✗".red().bold());
    }
}

fn print_schemas() {
    let report = schemars::schema_for!(BeaconReport);
    let pose = schemars::schema_for!(TargetPose);
    for schema in [report, pose] {
        match serde_json::to_string_pretty(&schema) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{}: {}", "error".red().bold(), e),
        }
    }
}
