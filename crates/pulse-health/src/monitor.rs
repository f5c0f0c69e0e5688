//! Run orchestrator: one pass over every target.
//!
//! Each run probes the targets in registry order, compares each verdict
//! with the persisted status and, on a transition, writes the new status
//! before sending the alert. Targets are independent: a store failure
//! aborts only the target it happened on.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::{error, info, warn};

use pulse_core::{Target, TargetRegistry};
use pulse_notify::{Delivery, Notifier};
use pulse_state::{PersistedStatus, StateError, StateResult, StatusGateway};

use crate::probe::{ProbeResult, Prober};
use crate::transition::{Transition, decide};

/// The "run now" signal from the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTrigger {
    /// The timer fired later than scheduled. Logged only.
    pub past_due: bool,
}

/// What happened to one target during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub probe: ProbeResult,
    pub previous: PersistedStatus,
    pub transition: Transition,
    /// Status the store holds after the run.
    pub current: PersistedStatus,
    /// Set only when a transition produced an alert.
    pub delivery: Option<Delivery>,
}

/// Per-target entry in a [`RunReport`].
#[derive(Debug)]
pub struct TargetReport {
    pub store_key: String,
    pub url: String,
    pub result: StateResult<TargetOutcome>,
}

/// Summary of one invocation.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<FixedOffset>,
    pub past_due: bool,
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    /// Targets whose status changed.
    pub fn transitions(&self) -> usize {
        self.outcomes()
            .filter(|o| o.transition != Transition::Steady)
            .count()
    }

    /// Alerts that reached the channel.
    pub fn delivered(&self) -> usize {
        self.outcomes()
            .filter(|o| o.delivery.is_some_and(|d| d.is_delivered()))
            .count()
    }

    /// Targets aborted by a store error.
    pub fn failures(&self) -> usize {
        self.targets.iter().filter(|t| t.result.is_err()).count()
    }

    fn outcomes(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.targets.iter().filter_map(|t| t.result.as_ref().ok())
    }
}

/// Drives the status machine for every registered target.
pub struct RunOrchestrator {
    registry: TargetRegistry,
    prober: Arc<dyn Prober>,
    gateway: StatusGateway,
    notifier: Arc<dyn Notifier>,
    utc_offset: FixedOffset,
}

impl RunOrchestrator {
    pub fn new(
        registry: TargetRegistry,
        prober: Arc<dyn Prober>,
        gateway: StatusGateway,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            prober,
            gateway,
            notifier,
            utc_offset: Utc.fix(),
        }
    }

    /// Report run timestamps at a fixed UTC offset (hours).
    pub fn with_utc_offset(mut self, hours: i32) -> Self {
        if let Some(offset) = hours.checked_mul(3600).and_then(FixedOffset::east_opt) {
            self.utc_offset = offset;
        } else {
            warn!(hours, "ignoring out-of-range utc offset");
        }
        self
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Process every target once, sequentially.
    pub async fn run(&self, trigger: RunTrigger) -> RunReport {
        let started_at = Utc::now().with_timezone(&self.utc_offset);

        if trigger.past_due {
            info!("the timer is past due");
        }
        info!(timestamp = %started_at.to_rfc3339(), targets = self.registry.len(), "run started");

        let mut targets = Vec::with_capacity(self.registry.len());
        for target in &self.registry {
            let result = self.check_target(target).await;
            if let Err(e) = &result {
                error!(
                    key = %target.store_key,
                    url = target.url_str(),
                    error = %e,
                    "status store failed, target skipped"
                );
            }
            targets.push(TargetReport {
                store_key: target.store_key.clone(),
                url: target.url_str().to_string(),
                result,
            });
        }

        let report = RunReport {
            started_at,
            past_due: trigger.past_due,
            targets,
        };
        info!(
            transitions = report.transitions(),
            delivered = report.delivered(),
            failures = report.failures(),
            "run finished"
        );
        report
    }

    /// Probe one target and apply the transition rule.
    ///
    /// Only store errors are returned; probe failures are a normal input.
    pub async fn check_target(&self, target: &Target) -> Result<TargetOutcome, StateError> {
        let url = target.url_str();
        let probe = self.prober.probe(target.url.as_str()).await;

        match probe.error_label() {
            None => info!("[ OK]: {url}"),
            Some(label) => info!("[ERR]: {url} ({label})"),
        }

        let previous = self.gateway.get_status(&target.store_key).await?;
        let transition = decide(previous, probe.is_healthy());

        let (Some(next), Some(message)) = (transition.target_status(), transition.message(url))
        else {
            return Ok(TargetOutcome {
                probe,
                previous,
                transition,
                current: previous,
                delivery: None,
            });
        };

        // Write before alerting; a failed write sends nothing.
        let current = self.gateway.set_status(&target.store_key, next).await?;
        info!(key = %target.store_key, %previous, %current, "status transition");

        let delivery = self.notifier.notify(&message).await;
        if !delivery.is_delivered() {
            warn!(key = %target.store_key, "transition recorded but alert was not delivered");
        }

        Ok(TargetOutcome {
            probe,
            previous,
            transition,
            current,
            delivery: Some(delivery),
        })
    }
}
