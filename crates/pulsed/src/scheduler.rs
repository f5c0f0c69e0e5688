//! Fixed-interval timer that fires orchestrator runs.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use pulse_health::{RunOrchestrator, RunTrigger};

/// Fires a run on every tick until shutdown.
///
/// Runs never overlap: a slow run delays the next tick, and that tick is
/// then flagged as past due.
pub struct Scheduler {
    orchestrator: RunOrchestrator,
    interval: Duration,
    late_tolerance: Duration,
}

impl Scheduler {
    pub fn new(
        orchestrator: RunOrchestrator,
        interval: Duration,
        late_tolerance: Duration,
    ) -> Self {
        Self {
            orchestrator,
            interval,
            late_tolerance,
        }
    }

    /// Run the timer loop until the shutdown signal.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                scheduled = ticker.tick() => {
                    let past_due = is_past_due(scheduled, Instant::now(), self.late_tolerance);
                    debug!(past_due, "timer fired");
                    self.orchestrator.run(RunTrigger { past_due }).await;
                }
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }
}

/// A tick is late when it fires more than `tolerance` after its deadline.
fn is_past_due(scheduled: Instant, now: Instant, tolerance: Duration) -> bool {
    now.saturating_duration_since(scheduled) > tolerance
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pulse_core::{Target, TargetRegistry};
    use pulse_health::{ProbeResult, Prober};
    use pulse_notify::{Delivery, Notifier};
    use pulse_state::{RedbStore, StatusGateway};

    use super::*;

    struct CountingProber(Arc<AtomicUsize>);

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, _url: &str) -> ProbeResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            ProbeResult::Healthy
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn notify(&self, _message: &str) -> Delivery {
            Delivery::Delivered { attempts: 1 }
        }
    }

    fn orchestrator(probes: Arc<AtomicUsize>) -> RunOrchestrator {
        let registry = TargetRegistry::new(vec![
            Target::new("A", "https://a.example/", None).unwrap(),
        ])
        .unwrap();
        RunOrchestrator::new(
            registry,
            Arc::new(CountingProber(probes)),
            StatusGateway::new(Arc::new(RedbStore::open_in_memory().unwrap())),
            Arc::new(SilentNotifier),
        )
    }

    #[test]
    fn on_time_and_late_ticks() {
        let scheduled = Instant::now();
        let tolerance = Duration::from_secs(10);

        assert!(!is_past_due(scheduled, scheduled, tolerance));
        assert!(!is_past_due(scheduled, scheduled + Duration::from_secs(10), tolerance));
        assert!(is_past_due(scheduled, scheduled + Duration::from_secs(11), tolerance));
        // A tick observed before its deadline is never late.
        assert!(!is_past_due(scheduled + Duration::from_secs(5), scheduled, tolerance));
    }

    #[tokio::test(start_paused = true)]
    async fn fires_every_interval_until_shutdown() {
        let probes = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(
            orchestrator(probes.clone()),
            Duration::from_millis(100),
            Duration::from_millis(50),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(rx).await });

        // Ticks at 0, 100, 200 and 300ms.
        tokio::time::sleep(Duration::from_millis(350)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(probes.load(Ordering::SeqCst), 4);
    }
}
