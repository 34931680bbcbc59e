//! Daemon configuration – reads/writes `~/.beacon/config.toml`.
//!
//! The beacon parameters in here only seed the parameter store at startup;
//! changes at runtime go through the store.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Poll cadence of the beacon driver (Hz).
    #[serde(default = "default_poll_rate_hz")]
    pub poll_rate_hz: f32,

    /// Identifier of the beacon device.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Seed for `LTEST_MODE` (1 = stationary target, 0 = moving).
    #[serde(default)]
    pub target_mode: i32,

    /// Seed for `LTEST_SCALE_X`.
    #[serde(default = "default_scale")]
    pub scale_x: f32,

    /// Seed for `LTEST_SCALE_Y`.
    #[serde(default = "default_scale")]
    pub scale_y: f32,

    /// Radius of the simulated target's circle (metres).
    #[serde(default = "default_sim_target_radius_m")]
    pub sim_target_radius_m: f32,

    /// Height of the simulated sensor above the target (metres).
    #[serde(default = "default_sim_altitude_m")]
    pub sim_altitude_m: f32,

    /// Corrupt every n-th simulated frame (0 = never).
    #[serde(default)]
    pub sim_corrupt_every: u64,
}

fn default_poll_rate_hz() -> f32 {
    50.0
}
fn default_device_id() -> String {
    "uls-qr1".to_string()
}
fn default_scale() -> f32 {
    1.0
}
fn default_sim_target_radius_m() -> f32 {
    2.0
}
fn default_sim_altitude_m() -> f32 {
    10.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_rate_hz: default_poll_rate_hz(),
            device_id: default_device_id(),
            target_mode: 0,
            scale_x: default_scale(),
            scale_y: default_scale(),
            sim_target_radius_m: default_sim_target_radius_m(),
            sim_altitude_m: default_sim_altitude_m(),
            sim_corrupt_every: 0,
        }
    }
}

/// Return the path to `~/.beacon/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".beacon").join("config.toml")
}

/// Load the config from disk and apply `BEACON_*` overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, without env overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `BEACON_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `BEACON_POLL_RATE_HZ` | `poll_rate_hz` |
/// | `BEACON_TARGET_MODE` | `target_mode` |
/// | `BEACON_SCALE_X` | `scale_x` |
/// | `BEACON_SCALE_Y` | `scale_y` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(v) = env_parse::<f32>("BEACON_POLL_RATE_HZ") {
        cfg.poll_rate_hz = v;
    }
    if let Some(v) = env_parse::<i32>("BEACON_TARGET_MODE") {
        cfg.target_mode = v;
    }
    if let Some(v) = env_parse::<f32>("BEACON_SCALE_X") {
        cfg.scale_x = v;
    }
    if let Some(v) = env_parse::<f32>("BEACON_SCALE_Y") {
        cfg.scale_y = v;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Save the config to disk, creating `~/.beacon/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
