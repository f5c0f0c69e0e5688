//! pulse-health: health probing and the edge-triggered status machine.
//!
//! # Architecture
//!
//! ```text
//! RunOrchestrator::run()
//!   └── for each Target, in registry order
//!       ├── Prober::probe(url) → ProbeResult
//!       ├── StatusGateway::get_status(key) → PersistedStatus
//!       ├── transition::decide(previous, is_healthy) → Transition
//!       └── on Up/Down: StatusGateway::set_status, then Notifier::notify
//! ```
//!
//! # Edge triggering
//!
//! Only a change between `Running` and not-`Running` writes the store and
//! sends an alert. A target that stays up, or stays down, costs one probe
//! and one read per run and nothing else. There is no hysteresis: a single
//! sample decides.

pub mod monitor;
pub mod probe;
pub mod transition;

pub use monitor::{RunOrchestrator, RunReport, RunTrigger, TargetOutcome, TargetReport};
pub use probe::{HttpProber, ProbeResult, Prober};
pub use transition::{Transition, decide};
