//! Parameter store and the cached beacon configuration.
//!
//! The store is a shared key/value map.  Writers go through
//! [`MemoryParamStore::set`], which broadcasts a
//! [`ParameterUpdate`][beacon_types::EventPayload::ParameterUpdate] event so
//! consumers know to re-read.  Consumers keep a [`BeaconParams`] cache and
//! only touch the store when forced or notified.
//!
//! # Parameters
//!
//! | Name | Type | Meaning |
//! |---|---|---|
//! | `LTEST_MODE` | `i32` | `1` = stationary target, anything else = moving |
//! | `LTEST_SCALE_X` | `f32` | scale applied to x position and velocity |
//! | `LTEST_SCALE_Y` | `f32` | scale applied to y position and velocity |

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use beacon_middleware::{EventBus, Topic};
use beacon_types::{BeaconError, Event, EventPayload, TargetMode};
use serde::Serialize;
use tracing::debug;

pub const PARAM_MODE: &str = "LTEST_MODE";
pub const PARAM_SCALE_X: &str = "LTEST_SCALE_X";
pub const PARAM_SCALE_Y: &str = "LTEST_SCALE_Y";

/// A typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
}

/// Key/value parameter lookup.
pub trait ParamStore {
    /// Look up an integer parameter.  `Ok(None)` when it is not set.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::Parameter`] when the stored value is not an
    /// integer.
    fn get_i32(&self, name: &str) -> Result<Option<i32>, BeaconError>;

    /// Look up a float parameter.  `Ok(None)` when it is not set.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::Parameter`] when the stored value is not a
    /// float.
    fn get_f32(&self, name: &str) -> Result<Option<f32>, BeaconError>;
}

/// In-memory parameter store.  Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryParamStore {
    values: Arc<RwLock<HashMap<String, ParamValue>>>,
    notify: Option<EventBus>,
}

impl MemoryParamStore {
    /// Create an empty store that does not broadcast changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that announces every change on `bus`.
    pub fn with_notifications(bus: EventBus) -> Self {
        Self {
            values: Arc::default(),
            notify: Some(bus),
        }
    }

    /// Set `name` to `value` and announce the change.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::Parameter`] when the store lock is poisoned.
    pub fn set(&self, name: &str, value: ParamValue) -> Result<(), BeaconError> {
        self.values
            .write()
            .map_err(|_| BeaconError::Parameter("parameter store lock poisoned".to_string()))?
            .insert(name.to_string(), value);
        debug!(name, ?value, "parameter set");

        if let Some(bus) = &self.notify {
            bus.publish_to(
                Topic::ParameterUpdate,
                Event::new(
                    "beacon-runtime::params",
                    EventPayload::ParameterUpdate {
                        name: name.to_string(),
                    },
                ),
            )?;
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<ParamValue>, BeaconError> {
        let values = self
            .values
            .read()
            .map_err(|_| BeaconError::Parameter("parameter store lock poisoned".to_string()))?;
        Ok(values.get(name).copied())
    }
}

impl ParamStore for MemoryParamStore {
    fn get_i32(&self, name: &str) -> Result<Option<i32>, BeaconError> {
        match self.get(name)? {
            None => Ok(None),
            Some(ParamValue::Int(v)) => Ok(Some(v)),
            Some(other) => Err(BeaconError::Parameter(format!(
                "{name} holds {other:?}, expected an integer"
            ))),
        }
    }

    fn get_f32(&self, name: &str) -> Result<Option<f32>, BeaconError> {
        match self.get(name)? {
            None => Ok(None),
            Some(ParamValue::Float(v)) => Ok(Some(v)),
            Some(other) => Err(BeaconError::Parameter(format!(
                "{name} holds {other:?}, expected a float"
            ))),
        }
    }
}

/// Cached beacon configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeaconParams {
    pub mode: TargetMode,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Default for BeaconParams {
    fn default() -> Self {
        Self {
            mode: TargetMode::Moving,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl BeaconParams {
    /// Re-read every parameter from `store`.  Unset parameters keep their
    /// cached value.
    ///
    /// # Errors
    ///
    /// Stops at the first lookup error; parameters read before it are
    /// already applied.
    pub fn refresh_from(&mut self, store: &impl ParamStore) -> Result<(), BeaconError> {
        if let Some(mode) = store.get_i32(PARAM_MODE)? {
            self.mode = TargetMode::from_param(mode);
        }
        if let Some(scale_x) = store.get_f32(PARAM_SCALE_X)? {
            self.scale_x = scale_x;
        }
        if let Some(scale_y) = store.get_f32(PARAM_SCALE_Y)? {
            self.scale_y = scale_y;
        }
        Ok(())
    }
}
