//! # enphase-venus - Enphase Envoy bridge for Victron Venus OS
//!
//! Polls the local production API of an Enphase Envoy gateway and publishes
//! the readings as a `com.victronenergy.pvinverter` service on D-Bus, so the
//! Venus OS GUI and VRM see the microinverter array as a regular PV inverter.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration and validation
//! - `logging`: Structured logging and tracing
//! - `telemetry`: Envoy HTTPS client and production.json parsing
//! - `transform`: Pure conversion from raw readings to published metrics
//! - `store`: Property store contract
//! - `acceptor`: Policy for writes coming from other bus clients
//! - `dbus`: VeDbus-compatible D-Bus service
//! - `engine`: One fetch/transform/publish cycle
//! - `scheduler`: Fixed-interval loop driving the engine

pub mod acceptor;
pub mod config;
pub mod dbus;
pub mod engine;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod transform;

// Re-export commonly used types
pub use config::Config;
pub use engine::{CycleOutcome, EngineState, EngineStats, PollingEngine};
pub use error::{BridgeError, Result};
pub use scheduler::Scheduler;
pub use store::{PathSpec, PropertyStore};
