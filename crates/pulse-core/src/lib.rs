//! pulse-core: target registry and configuration for the Pulse monitor.
//!
//! A run probes a fixed, ordered list of targets. The list and all tuning
//! knobs come from a `pulse.toml` file loaded once at process start.

pub mod config;
pub mod error;
pub mod target;

pub use config::{NotifyConfig, ProbeConfig, PulseConfig, ScheduleConfig, TargetConfig};
pub use error::{ConfigError, ConfigResult};
pub use target::{Target, TargetRegistry};
