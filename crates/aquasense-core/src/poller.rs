//! Periodic telemetry polling.
//!
//! [`TelemetryPoller`] runs poll cycles: one concurrent `latest` request per
//! tracked metric plus one `analysis` request, all awaited to settlement,
//! then merged into a new [`Snapshot`] that replaces the live one in a single
//! step. Readers get snapshots through a `watch` channel and never see a mix
//! of two cycles.
//!
//! Every cycle takes a generation when it starts. A snapshot is only
//! published if its generation is newer than the live one, so a slow cycle
//! that resolves after a later cycle is dropped. Results of cycles that
//! resolve after [`PollerHandle::stop`] are dropped too.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use aquasense_core::{MockBackend, PollerConfig, TelemetryPoller};
//! use aquasense_types::MetricKind;
//!
//! #[tokio::main]
//! async fn main() {
//!     let poller = Arc::new(TelemetryPoller::new(Arc::new(MockBackend::new()), PollerConfig::default()));
//!     poller.poll_now().await;
//!     assert!(poller.snapshot().connected);
//!     assert!(poller.snapshot().value(MetricKind::Ph) > 0.0);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aquasense_types::{MetricKind, Snapshot};

use crate::api::AquaApi;
use crate::error::{Error, Result};
use crate::events::{ConsoleEvent, EventDispatcher};
use crate::generation::Generation;
use crate::history::HistoryBuffer;

/// Shortest allowed poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Longest allowed poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Largest history window.
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Poller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between cycle starts. Default: 5 seconds.
    pub interval: Duration,
    /// History window length. Default: 20 points.
    pub history_limit: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            history_limit: 20,
        }
    }
}

impl PollerConfig {
    /// Set the poll interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the history window length.
    #[must_use]
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Validate the settings.
    ///
    /// Checks that:
    /// - `interval` is between 3 and 60 seconds
    /// - `history_limit` is between 1 and 200
    pub fn validate(&self) -> Result<()> {
        if self.interval < MIN_POLL_INTERVAL || self.interval > MAX_POLL_INTERVAL {
            return Err(Error::invalid_config(format!(
                "poll interval must be between {}s and {}s, got {:?}",
                MIN_POLL_INTERVAL.as_secs(),
                MAX_POLL_INTERVAL.as_secs(),
                self.interval
            )));
        }
        if self.history_limit == 0 || self.history_limit > MAX_HISTORY_LIMIT {
            return Err(Error::invalid_config(format!(
                "history limit must be between 1 and {MAX_HISTORY_LIMIT}, got {}",
                self.history_limit
            )));
        }
        Ok(())
    }
}

/// What became of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle's snapshot became the live one.
    Published { generation: u64, connected: bool },
    /// A newer cycle had already published; this result was dropped.
    Stale { generation: u64 },
    /// The poller was stopped while the cycle was in flight.
    Cancelled { generation: u64 },
}

/// Polls every tracked metric and publishes merged snapshots.
pub struct TelemetryPoller {
    api: Arc<dyn AquaApi>,
    config: PollerConfig,
    metrics: Vec<MetricKind>,
    generation: Generation,
    snapshot: watch::Sender<Snapshot>,
    events: EventDispatcher,
    history: Option<Arc<HistoryBuffer>>,
}

impl std::fmt::Debug for TelemetryPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPoller")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("generation", &self.generation.latest())
            .finish()
    }
}

impl TelemetryPoller {
    /// Create a poller tracking every metric.
    pub fn new(api: Arc<dyn AquaApi>, config: PollerConfig) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::initial());
        Self {
            api,
            config,
            metrics: MetricKind::ALL.to_vec(),
            generation: Generation::new(),
            snapshot,
            events: EventDispatcher::default(),
            history: None,
        }
    }

    /// Report to `events` instead of a private dispatcher.
    #[must_use]
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Track only `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = MetricKind>) -> Self {
        self.metrics = metrics.into_iter().collect();
        self
    }

    /// Refresh `history` for its selected metric on every tick.
    #[must_use]
    pub fn with_history(mut self, history: Arc<HistoryBuffer>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// The live snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch the live snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Run one cycle immediately, outside the timer.
    pub async fn poll_now(&self) -> CycleOutcome {
        self.run_cycle(&CancellationToken::new()).await
    }

    /// Start polling: one cycle immediately, then one per interval.
    ///
    /// Slow cycles delay the next tick rather than stacking up, so at most
    /// one timer-driven cycle is in flight at a time.
    pub fn start(self: &Arc<Self>) -> Result<PollerHandle> {
        self.config.validate()?;
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let poller = Arc::clone(self);

        info!(
            interval = ?poller.config.interval,
            metrics = poller.metrics.len(),
            "Starting telemetry poller"
        );

        let task = tokio::spawn(async move {
            let mut ticker = interval(poller.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("Poller cancelled, stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        poller.run_cycle(&task_cancel).await;
                        if let Some(history) = &poller.history
                            && !task_cancel.is_cancelled()
                            && let Err(e) = history.refresh().await
                        {
                            debug!(error = %e, "History refresh skipped");
                        }
                    }
                }
            }
        });

        Ok(PollerHandle {
            cancel,
            task: Some(task),
        })
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> CycleOutcome {
        let generation = self.generation.next();
        debug!(generation, "Poll cycle started");

        let latest = join_all(self.metrics.iter().map(|metric| {
            let api = Arc::clone(&self.api);
            let metric = *metric;
            async move { (metric, api.latest(metric).await) }
        }));
        let (results, analysis) = tokio::join!(latest, self.api.analysis());

        if cancel.is_cancelled() {
            debug!(generation, "Discarding poll cycle from a stopped poller");
            return CycleOutcome::Cancelled { generation };
        }

        let mut connected = true;
        for (metric, result) in &results {
            if let Err(e) = result {
                connected &= !e.is_cycle_fatal();
                warn!(%metric, generation, error = %e, "Metric fetch failed; holding previous value");
            }
        }
        if let Err(e) = &analysis {
            connected &= !e.is_cycle_fatal();
            warn!(generation, error = %e, "Analysis fetch failed");
        }

        let mut was_connected = false;
        let published = self.snapshot.send_if_modified(|live| {
            if live.generation >= generation || cancel.is_cancelled() {
                return false;
            }
            was_connected = live.connected;
            for (metric, result) in results {
                if let Ok(reading) = result {
                    live.readings.insert(metric, reading);
                }
            }
            if let Ok(analysis) = analysis {
                live.analysis = Some(analysis);
            }
            live.connected = connected;
            live.generation = generation;
            live.refreshed_at = Some(OffsetDateTime::now_utc());
            true
        });

        if !published {
            debug!(generation, "Discarding stale poll cycle");
            return if cancel.is_cancelled() {
                CycleOutcome::Cancelled { generation }
            } else {
                CycleOutcome::Stale { generation }
            };
        }

        self.events
            .send(ConsoleEvent::SnapshotPublished { generation, connected });
        if was_connected != connected {
            info!(connected, "Backend connectivity changed");
            self.events.send(ConsoleEvent::ConnectivityChanged { connected });
        }
        CycleOutcome::Published {
            generation,
            connected,
        }
    }
}

/// Handle to a running poller task.
#[derive(Debug)]
pub struct PollerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling. The timer is cancelled immediately; a cycle in flight
    /// runs to completion but its result is discarded.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Poller task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Token that stops this poller when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockFailure};

    fn poller(backend: &Arc<MockBackend>) -> Arc<TelemetryPoller> {
        Arc::new(TelemetryPoller::new(
            Arc::clone(backend) as Arc<dyn AquaApi>,
            PollerConfig::default(),
        ))
    }

    #[test]
    fn test_config_validation() {
        assert!(PollerConfig::default().validate().is_ok());
        assert!(
            PollerConfig::default()
                .interval(Duration::from_secs(2))
                .validate()
                .is_err()
        );
        assert!(
            PollerConfig::default()
                .interval(Duration::from_secs(61))
                .validate()
                .is_err()
        );
        assert!(PollerConfig::default().history_limit(0).validate().is_err());
        assert!(PollerConfig::default().history_limit(201).validate().is_err());
    }

    #[tokio::test]
    async fn test_successful_cycle() {
        let backend = Arc::new(MockBackend::builder().reading(MetricKind::Ph, 7.2).build());
        let poller = poller(&backend);

        let outcome = poller.poll_now().await;
        assert_eq!(
            outcome,
            CycleOutcome::Published {
                generation: 1,
                connected: true
            }
        );
        let snapshot = poller.snapshot();
        assert!(snapshot.connected);
        assert_eq!(snapshot.value(MetricKind::Ph), 7.2);
        assert!(snapshot.analysis.unwrap().is_healthy());
    }

    #[tokio::test]
    async fn test_single_failure_holds_value_and_disconnects() {
        let backend = Arc::new(MockBackend::new());
        let poller = poller(&backend);
        poller.poll_now().await;
        let before = poller.snapshot();

        backend.set_reading(MetricKind::Ph, 8.0).await;
        backend.set_reading(MetricKind::Temperature, 30.0).await;
        backend.fail_metric(MetricKind::Temperature, MockFailure::Network).await;
        poller.poll_now().await;

        let after = poller.snapshot();
        assert!(!after.connected);
        assert_eq!(
            after.value(MetricKind::Temperature),
            before.value(MetricKind::Temperature)
        );
        assert_eq!(after.value(MetricKind::Ph), 8.0);
    }

    #[tokio::test]
    async fn test_first_failure_uses_placeholder() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_metric(MetricKind::Turbidity, MockFailure::Server).await;
        let poller = poller(&backend);
        poller.poll_now().await;
        assert!(poller.snapshot().reading(MetricKind::Turbidity).is_placeholder());
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_connectivity() {
        let backend = Arc::new(MockBackend::new());
        backend.remove_reading(MetricKind::Ph).await;
        let poller = poller(&backend);

        let outcome = poller.poll_now().await;
        assert!(matches!(
            outcome,
            CycleOutcome::Published {
                connected: true,
                ..
            }
        ));
        assert!(poller.snapshot().reading(MetricKind::Ph).is_placeholder());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cycle_does_not_overwrite_newer() {
        let backend = Arc::new(MockBackend::new());
        let poller = poller(&backend);

        backend.set_reading(MetricKind::Ph, 6.0).await;
        backend.set_latency(MetricKind::Ph, Duration::from_secs(10)).await;
        let slow = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.poll_now().await })
        };
        tokio::task::yield_now().await;

        backend.set_latency(MetricKind::Ph, Duration::ZERO).await;
        backend.set_reading(MetricKind::Ph, 9.0).await;
        let fast = poller.poll_now().await;
        assert!(matches!(fast, CycleOutcome::Published { generation: 2, .. }));

        let slow = slow.await.unwrap();
        assert_eq!(slow, CycleOutcome::Stale { generation: 1 });
        assert_eq!(poller.snapshot().value(MetricKind::Ph), 9.0);
        assert_eq!(poller.snapshot().generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_immediately_then_on_interval() {
        let backend = Arc::new(MockBackend::new());
        let poller = poller(&backend);
        let mut rx = poller.subscribe();

        let handle = poller.start().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().generation, 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().generation, 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_cycle() {
        let backend = Arc::new(MockBackend::new());
        backend.set_latency(MetricKind::Ph, Duration::from_secs(2)).await;
        let poller = poller(&backend);

        let handle = poller.start().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(poller.snapshot().generation, 0);
        assert!(!handle.is_running());
        assert_eq!(backend.latest_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_does_not_stack() {
        let backend = Arc::new(MockBackend::new());
        backend.set_latency(MetricKind::Ph, Duration::from_secs(12)).await;
        let poller = poller(&backend);

        let handle = poller.start().unwrap();

        // Two ticks fall due while the first cycle is still waiting on pH.
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(backend.latest_calls(), 5);
        assert_eq!(poller.snapshot().generation, 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.latest_calls(), 10);
        assert_eq!(poller.snapshot().generation, 1);

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(backend.latest_calls(), 15);
        assert_eq!(poller.snapshot().generation, 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_connectivity_event_on_change() {
        let backend = Arc::new(MockBackend::new());
        let events = EventDispatcher::new(16);
        let mut rx = events.subscribe();
        let poller = Arc::new(
            TelemetryPoller::new(
                Arc::clone(&backend) as Arc<dyn AquaApi>,
                PollerConfig::default(),
            )
            .with_events(events),
        );

        poller.poll_now().await;
        assert!(matches!(
            rx.try_recv(),
            Ok(ConsoleEvent::SnapshotPublished { generation: 1, connected: true })
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            ConsoleEvent::ConnectivityChanged { connected: true }
        );

        poller.poll_now().await;
        assert!(matches!(rx.try_recv(), Ok(ConsoleEvent::SnapshotPublished { .. })));
        assert!(rx.try_recv().is_err());
    }
}
