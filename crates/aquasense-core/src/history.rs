//! Chart-ready history for the selected metric.
//!
//! [`SeriesFormatter`] turns raw backend records (newest first, metric-specific
//! value key) into an oldest-first, time-ordered, bounded series of
//! [`HistoryPoint`]s. [`HistoryBuffer`] owns the series for the currently
//! selected metric and replaces it wholesale on every fetch.
//!
//! Each selection change and each fetch takes a new generation; a fetch
//! whose generation is no longer current when it resolves is discarded, so a
//! slow response for metric A can never overwrite the series of metric B.

use std::sync::Arc;

use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::watch;
use tracing::{debug, warn};

use aquasense_types::{BackendTime, HistoryPoint, MetricKind};

use crate::api::AquaApi;
use crate::error::{Error, Result};
use crate::events::{ConsoleEvent, EventDispatcher};
use crate::generation::Generation;

/// Converts backend history records into chart points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesFormatter {
    offset: UtcOffset,
}

impl SeriesFormatter {
    /// Formatter labelling times at `offset`.
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Formatter using the local UTC offset, or UTC if it cannot be determined.
    pub fn local() -> Self {
        Self::new(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Build an oldest-first series of at most `limit` points from
    /// newest-first `records`.
    ///
    /// Records without a parseable `timestamp` are dropped. A record missing
    /// the metric's value field yields a point with `value == None`. If the
    /// backend ever returns more than `limit` records, the most recent ones
    /// are kept.
    pub fn format(&self, metric: MetricKind, records: &[Value], limit: usize) -> Vec<HistoryPoint> {
        let mut points: Vec<HistoryPoint> = records
            .iter()
            .rev()
            .filter_map(|record| {
                let raw = record.get("timestamp").and_then(Value::as_str)?;
                let recorded_at = match BackendTime::parse(raw) {
                    Ok(t) => t.at_offset(self.offset),
                    Err(e) => {
                        debug!(%metric, error = %e, "Dropping history record");
                        return None;
                    }
                };
                Some(HistoryPoint {
                    display_time: time_label(recorded_at),
                    value: metric.extract(record),
                    recorded_at,
                })
            })
            .collect();

        // Stable: equal timestamps keep backend order.
        points.sort_by_key(|p| p.recorded_at);
        if points.len() > limit {
            points.drain(..points.len() - limit);
        }
        points
    }
}

impl Default for SeriesFormatter {
    fn default() -> Self {
        Self::local()
    }
}

fn time_label(t: OffsetDateTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// Observable state of a [`HistoryBuffer`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryView {
    /// Currently selected metric.
    pub metric: Option<MetricKind>,
    /// Series for `metric`, oldest first.
    pub points: Vec<HistoryPoint>,
}

/// Bounded history window for the selected metric.
pub struct HistoryBuffer {
    api: Arc<dyn AquaApi>,
    formatter: SeriesFormatter,
    limit: usize,
    generation: Generation,
    view: watch::Sender<HistoryView>,
    events: EventDispatcher,
}

impl std::fmt::Debug for HistoryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryBuffer")
            .field("limit", &self.limit)
            .field("generation", &self.generation.latest())
            .field("metric", &self.view.borrow().metric)
            .finish()
    }
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `limit` points.
    pub fn new(
        api: Arc<dyn AquaApi>,
        formatter: SeriesFormatter,
        limit: usize,
        events: EventDispatcher,
    ) -> Self {
        let (view, _) = watch::channel(HistoryView::default());
        Self {
            api,
            formatter,
            limit: limit.max(1),
            generation: Generation::new(),
            view,
            events,
        }
    }

    /// Window length.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Select `metric` and clear the series. Any fetch still in flight
    /// becomes stale.
    pub fn select(&self, metric: MetricKind) -> u64 {
        let generation = self.generation.next();
        self.view.send_modify(|view| {
            view.metric = Some(metric);
            view.points.clear();
        });
        debug!(%metric, generation, "History metric selected");
        generation
    }

    /// Currently selected metric.
    pub fn selected(&self) -> Option<MetricKind> {
        self.view.borrow().metric
    }

    /// Current series, oldest first.
    pub fn points(&self) -> Vec<HistoryPoint> {
        self.view.borrow().points.clone()
    }

    /// Watch the buffer.
    pub fn subscribe(&self) -> watch::Receiver<HistoryView> {
        self.view.subscribe()
    }

    /// Fetch the most recent `limit` records of `metric` and replace the
    /// series with them, selecting `metric` first if needed.
    ///
    /// Returns the new series. If the selection changed or a newer fetch
    /// started while this one was in flight, nothing is written and
    /// [`Error::Cancelled`] is returned. On a failed fetch the previous
    /// series is kept.
    pub async fn load_history(&self, metric: MetricKind, limit: usize) -> Result<Vec<HistoryPoint>> {
        let limit = limit.clamp(1, self.limit);
        let generation = if self.selected() == Some(metric) {
            self.generation.next()
        } else {
            self.select(metric)
        };

        let records = match self.api.history(metric, limit).await {
            Ok(records) => records,
            Err(e) => {
                if self.generation.is_current(generation) {
                    warn!(%metric, error = %e, "History fetch failed; keeping previous series");
                }
                return Err(e);
            }
        };

        let points = self.formatter.format(metric, &records, limit);
        let applied = self.view.send_if_modified(|view| {
            if !self.generation.is_current(generation) || view.metric != Some(metric) {
                return false;
            }
            view.points = points.clone();
            true
        });

        if !applied {
            debug!(%metric, generation, "Discarding stale history response");
            return Err(Error::Cancelled);
        }

        self.events.send(ConsoleEvent::HistoryReplaced {
            metric,
            points: points.len(),
        });
        Ok(points)
    }

    /// Reload the selected metric with the buffer's window length.
    /// Does nothing when no metric is selected.
    pub async fn refresh(&self) -> Result<()> {
        match self.selected() {
            Some(metric) => self.load_history(metric, self.limit).await.map(|_| ()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use serde_json::json;
    use std::time::Duration;
    use time::macros::offset;

    fn records() -> Vec<Value> {
        vec![
            json!({"NH3": 0.03, "timestamp": "2024-05-01T10:02:00"}),
            json!({"NH3": 0.02, "timestamp": "2024-05-01T10:01:00"}),
            json!({"timestamp": "2024-05-01T10:00:00"}),
        ]
    }

    #[test]
    fn test_format_reverses_to_oldest_first() {
        let formatter = SeriesFormatter::new(offset!(+7));
        let points = formatter.format(MetricKind::Ammonia, &records(), 20);
        let labels: Vec<_> = points.iter().map(|p| p.display_time.as_str()).collect();
        assert_eq!(labels, vec!["10:00", "10:01", "10:02"]);
        assert_eq!(points[0].value, None);
        assert_eq!(points[2].value, Some(0.03));
    }

    #[test]
    fn test_format_converts_zoned_timestamps() {
        let formatter = SeriesFormatter::new(offset!(+7));
        let points = formatter.format(
            MetricKind::Ph,
            &[json!({"ph": 7.0, "timestamp": "2024-05-01T03:15:00Z"})],
            20,
        );
        assert_eq!(points[0].display_time, "10:15");
    }

    #[test]
    fn test_format_drops_bad_timestamps() {
        let formatter = SeriesFormatter::new(UtcOffset::UTC);
        let points = formatter.format(
            MetricKind::Ph,
            &[
                json!({"ph": 7.0, "timestamp": "nope"}),
                json!({"ph": 7.1}),
                json!({"ph": 7.2, "timestamp": "2024-05-01T10:00:00"}),
            ],
            20,
        );
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, Some(7.2));
    }

    #[test]
    fn test_format_orders_out_of_order_records() {
        let formatter = SeriesFormatter::new(UtcOffset::UTC);
        let points = formatter.format(
            MetricKind::Ph,
            &[
                json!({"ph": 1.0, "timestamp": "2024-05-01T10:00:00"}),
                json!({"ph": 2.0, "timestamp": "2024-05-01T10:05:00"}),
            ],
            20,
        );
        assert!(points.windows(2).all(|w| w[0].recorded_at <= w[1].recorded_at));
    }

    #[test]
    fn test_format_bounds_to_most_recent() {
        let formatter = SeriesFormatter::new(UtcOffset::UTC);
        let records: Vec<Value> = (0..30)
            .rev()
            .map(|i| json!({"ph": i, "timestamp": format!("2024-05-01T10:{i:02}:00")}))
            .collect();
        let points = formatter.format(MetricKind::Ph, &records, 20);
        assert_eq!(points.len(), 20);
        assert_eq!(points[0].display_time, "10:10");
        assert_eq!(points[19].display_time, "10:29");
    }

    fn buffer(backend: Arc<MockBackend>) -> HistoryBuffer {
        HistoryBuffer::new(
            backend,
            SeriesFormatter::new(UtcOffset::UTC),
            20,
            EventDispatcher::default(),
        )
    }

    #[tokio::test]
    async fn test_load_history_is_idempotent() {
        let backend = Arc::new(MockBackend::new());
        backend.set_history(MetricKind::Ammonia, records()).await;
        let buffer = buffer(backend);

        let first = buffer.load_history(MetricKind::Ammonia, 20).await.unwrap();
        let second = buffer.load_history(MetricKind::Ammonia, 20).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(buffer.points(), second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_discarded_after_selection_change() {
        let backend = Arc::new(MockBackend::new());
        backend.set_history(MetricKind::Ph, vec![json!({"ph": 7.0, "timestamp": "2024-05-01T10:00:00"})]).await;
        backend.set_history(MetricKind::Turbidity, vec![json!({"NTU": 3.0, "timestamp": "2024-05-01T10:00:00"})]).await;
        backend.set_latency(MetricKind::Ph, Duration::from_secs(2)).await;
        let buffer = Arc::new(buffer(backend));

        let slow = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move { buffer.load_history(MetricKind::Ph, 20).await })
        };
        tokio::task::yield_now().await;

        let turbidity = buffer.load_history(MetricKind::Turbidity, 20).await.unwrap();
        assert_eq!(turbidity[0].value, Some(3.0));

        let result = slow.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(buffer.selected(), Some(MetricKind::Turbidity));
        assert_eq!(buffer.points(), turbidity);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_series() {
        let backend = Arc::new(MockBackend::new());
        backend.set_history(MetricKind::Ammonia, records()).await;
        let buffer = buffer(Arc::clone(&backend));
        let loaded = buffer.load_history(MetricKind::Ammonia, 20).await.unwrap();

        backend
            .fail_metric(MetricKind::Ammonia, crate::mock::MockFailure::Network)
            .await;
        assert!(buffer.refresh().await.is_err());
        assert_eq!(buffer.points(), loaded);
    }

    #[tokio::test]
    async fn test_select_clears_series() {
        let backend = Arc::new(MockBackend::new());
        backend.set_history(MetricKind::Ammonia, records()).await;
        let buffer = buffer(backend);
        buffer.load_history(MetricKind::Ammonia, 20).await.unwrap();

        buffer.select(MetricKind::Ph);
        assert!(buffer.points().is_empty());
        assert_eq!(buffer.selected(), Some(MetricKind::Ph));
    }
}
