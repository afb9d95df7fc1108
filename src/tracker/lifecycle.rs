//! Retention sweeper and shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::TaskTracker;
use super::registry::TaskHandle;

/// Upper bound on how long shutdown waits for running pipelines
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl TaskTracker {
    /// Gracefully shut down the tracker
    ///
    /// 1. Stops accepting new tasks
    /// 2. Fails tasks that were created but never run, and tasks still
    ///    waiting for a concurrency slot, then stops the sweeper
    /// 3. Waits for running pipelines, at most 30 seconds
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Running pipelines are never interrupted; any still running after the
    /// timeout keep going until the runtime exits.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.run_state.accepting_new.store(false, Ordering::SeqCst);
        self.run_state.shutdown.cancel();
        self.fail_unstarted();
        self.run_state.pipelines.close();
        tracing::info!(
            running = self.run_state.pipelines.len(),
            "Stopped accepting new tasks"
        );

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.run_state.pipelines.wait()).await {
            Ok(()) => tracing::info!("All pipelines finished"),
            Err(_) => tracing::warn!(
                still_running = self.run_state.pipelines.len(),
                "Timeout waiting for pipelines, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    fn fail_unstarted(&self) {
        let mut failed = 0;
        for (id, slot) in self.registry.unclaimed() {
            if slot.claim() {
                TaskHandle::new(id, slot, self.event_tx.clone())
                    .fail("shutdown before the task started".to_string());
                failed += 1;
            }
        }
        if failed > 0 {
            tracing::info!(failed, "Failed tasks that were never run");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        !self.run_state.accepting_new.load(Ordering::SeqCst)
    }

    /// Evict finished and never-run tasks older than the configured TTL
    ///
    /// Returns the number of evicted tasks. Runs periodically in the background;
    /// exposed for embedders that want to sweep on their own schedule.
    pub fn sweep_expired(&self) -> usize {
        let evicted = self.registry.evict_expired();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.registry.len(), "Swept expired tasks");
            self.emit_event(Event::Evicted { count: evicted });
        }
        evicted
    }

    pub(super) fn start_retention_sweeper(&self) {
        let tracker = self.clone();
        let period = self.config.retention.sweep_interval.max(Duration::from_millis(10));
        let shutdown = self.run_state.shutdown.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        tracker.sweep_expired();
                    }
                }
            }
            tracing::debug!("Retention sweeper stopped");
        });
    }
}
