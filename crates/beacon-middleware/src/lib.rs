//! `beacon-middleware` – message routing between the beacon driver, the
//! navigation estimator and the parameter store.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe bus built on
//!   Tokio broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
