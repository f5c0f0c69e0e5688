//! The edge-triggered transition rule.

use pulse_state::PersistedStatus;

/// What a single sample does to a target's persisted status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No write, no alert.
    Steady,
    /// Persist `Running` and announce recovery.
    Up,
    /// Persist `Stopping` and announce the failure.
    Down,
}

/// Decide the transition from the last persisted status and the current verdict.
///
/// | previous  | healthy | unhealthy |
/// |-----------|---------|-----------|
/// | Running   | Steady  | Down      |
/// | Stopping  | Up      | Steady    |
/// | Unknown   | Up      | Down      |
///
/// `Unknown` has no verdict yet, so the first sample always establishes one.
pub fn decide(previous: PersistedStatus, is_healthy: bool) -> Transition {
    match (previous, is_healthy) {
        (PersistedStatus::Running, true) => Transition::Steady,
        (PersistedStatus::Running, false) => Transition::Down,
        (PersistedStatus::Stopping, true) => Transition::Up,
        (PersistedStatus::Stopping, false) => Transition::Steady,
        (PersistedStatus::Unknown, true) => Transition::Up,
        (PersistedStatus::Unknown, false) => Transition::Down,
    }
}

impl Transition {
    /// Status to persist, if any.
    pub fn target_status(self) -> Option<PersistedStatus> {
        match self {
            Transition::Steady => None,
            Transition::Up => Some(PersistedStatus::Running),
            Transition::Down => Some(PersistedStatus::Stopping),
        }
    }

    /// Alert text for `url`, if any.
    pub fn message(self, url: &str) -> Option<String> {
        match self {
            Transition::Steady => None,
            Transition::Up => Some(format!("- {url} is running normally.")),
            Transition::Down => Some(format!("- An error has been detected on {url}.")),
        }
    }
}
