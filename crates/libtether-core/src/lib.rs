//! Core library for tether
//!
//! This crate provides:
//! - The shared exponential backoff primitive (Backoff, BackoffPolicy)
//! - The health state machine and its polling monitor (HealthMachine, HealthMonitor)
//! - The one-shot activation sequencer (ActivationSequencer)
//! - Typed pub/sub channels used by every client (Channel)
//! - Wire types for heartbeats, domain events and health snapshots
//! - TOML configuration (TetherConfig)

pub mod activation;
pub mod backoff;
pub mod bus;
pub mod config;
pub mod error;
pub mod health;
pub mod probe;
pub mod types;

pub use activation::{ActivationOutcome, ActivationSequencer, Launcher, StartupPrompt};
pub use backoff::{Backoff, BackoffPolicy};
pub use bus::Channel;
pub use config::{load_config, save_config, StartupMode, TetherConfig, TransportMode};
pub use error::TetherError;
pub use health::{HealthChange, HealthEvents, HealthMachine, HealthMonitor};
pub use probe::{Probe, ProbeReport};
pub use types::{
    DomainEvent, EventCategory, HealthSnapshot, HealthState, HealthTransition, Heartbeat,
};
