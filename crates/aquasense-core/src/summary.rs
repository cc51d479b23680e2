//! Daily/monthly rollups and the per-record report tables.

use std::sync::Arc;

use time::Date;
use tokio::sync::watch;
use tracing::{debug, warn};

use aquasense_types::{DailyTableRow, MonthlyTableRow, SummaryPeriod, SummaryRecord};

use crate::api::{AquaApi, SummaryQuery};
use crate::error::{Error, Result};
use crate::events::{ConsoleEvent, EventDispatcher};
use crate::generation::Generation;

/// What the summary panel currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SummaryState {
    /// Nothing loaded, or the last load failed.
    #[default]
    Empty,
    /// The record from the most recent successful load.
    Loaded(SummaryRecord),
}

impl SummaryState {
    pub fn record(&self) -> Option<&SummaryRecord> {
        match self {
            SummaryState::Empty => None,
            SummaryState::Loaded(record) => Some(record),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SummaryState::Empty)
    }
}

/// Loads summary records and holds the latest one.
///
/// The record is opaque here; callers decode it according to its
/// [`SummaryPeriod`] with [`SummaryRecord::daily`] or
/// [`SummaryRecord::monthly`].
pub struct SummaryAggregator {
    api: Arc<dyn AquaApi>,
    generation: Generation,
    state: watch::Sender<SummaryState>,
    events: EventDispatcher,
}

impl std::fmt::Debug for SummaryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryAggregator")
            .field("generation", &self.generation.latest())
            .field("loaded", &!self.state.borrow().is_empty())
            .finish()
    }
}

impl SummaryAggregator {
    pub fn new(api: Arc<dyn AquaApi>, events: EventDispatcher) -> Self {
        let (state, _) = watch::channel(SummaryState::Empty);
        Self {
            api,
            generation: Generation::new(),
            state,
            events,
        }
    }

    /// Fetch the summary described by `query`.
    ///
    /// A successful fetch replaces the state with the new record. A failed
    /// fetch resets it to [`SummaryState::Empty`] rather than keeping the
    /// previous record. When a newer load started in the meantime the result
    /// is dropped and [`Error::Cancelled`] is returned.
    pub async fn load_summary(&self, query: SummaryQuery) -> Result<SummaryRecord> {
        query.validate()?;
        let period = query.period();
        let generation = self.generation.next();

        let result = self.api.summary(query).await;
        if !self.generation.is_current(generation) {
            debug!(%period, generation, "Discarding stale summary response");
            return Err(Error::Cancelled);
        }

        match result {
            Ok(record) => {
                self.state.send_replace(SummaryState::Loaded(record.clone()));
                self.events.send(ConsoleEvent::SummaryChanged {
                    period,
                    loaded: true,
                });
                Ok(record)
            }
            Err(e) => {
                warn!(%period, error = %e, "Summary fetch failed");
                self.state.send_replace(SummaryState::Empty);
                self.events.send(ConsoleEvent::SummaryChanged {
                    period,
                    loaded: false,
                });
                Err(e)
            }
        }
    }

    /// Current summary state.
    pub fn state(&self) -> SummaryState {
        self.state.borrow().clone()
    }

    /// Period of the loaded record, if any.
    pub fn period(&self) -> Option<SummaryPeriod> {
        self.state.borrow().record().map(|r| r.period)
    }

    /// Watch the summary state.
    pub fn subscribe(&self) -> watch::Receiver<SummaryState> {
        self.state.subscribe()
    }
}

/// Rows of a report table, or the reason there are none.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable<R> {
    pub rows: Vec<R>,
    /// Set when the fetch failed; `rows` is then empty.
    pub error: Option<String>,
}

impl<R> ReportTable<R> {
    fn loaded(rows: Vec<R>) -> Self {
        Self { rows, error: None }
    }

    fn failed(error: &Error) -> Self {
        Self {
            rows: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Fetches the daily and monthly report tables.
#[derive(Clone)]
pub struct ReportFetcher {
    api: Arc<dyn AquaApi>,
}

impl ReportFetcher {
    pub fn new(api: Arc<dyn AquaApi>) -> Self {
        Self { api }
    }

    /// Per-record table for `date` (today when `None`).
    pub async fn daily_table(&self, date: Option<Date>) -> ReportTable<DailyTableRow> {
        match self.api.daily_table(date).await {
            Ok(rows) => ReportTable::loaded(rows),
            Err(e) => {
                warn!(error = %e, "Daily report table fetch failed");
                ReportTable::failed(&e)
            }
        }
    }

    /// Per-day table for `month` of `year`.
    pub async fn monthly_table(&self, month: u8, year: i32) -> ReportTable<MonthlyTableRow> {
        let result = match (SummaryQuery::Monthly { month, year }).validate() {
            Ok(()) => self.api.monthly_table(month, year).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(rows) => ReportTable::loaded(rows),
            Err(e) => {
                warn!(month, year, error = %e, "Monthly report table fetch failed");
                ReportTable::failed(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockFailure};
    use serde_json::json;

    fn setup() -> (Arc<MockBackend>, SummaryAggregator) {
        let backend = Arc::new(MockBackend::new());
        let aggregator =
            SummaryAggregator::new(Arc::clone(&backend) as Arc<dyn AquaApi>, EventDispatcher::default());
        (backend, aggregator)
    }

    #[tokio::test]
    async fn test_load_daily_summary() {
        let (backend, aggregator) = setup();
        backend
            .set_summary(
                SummaryPeriod::Daily,
                json!({
                    "date": "2024-05-01",
                    "summary_text": "Stable",
                    "statistics": {"critical": 0, "warning": 2, "avg_ph": 7.1}
                }),
            )
            .await;

        let record = aggregator
            .load_summary(SummaryQuery::Daily { date: None })
            .await
            .unwrap();
        assert_eq!(record.period, SummaryPeriod::Daily);
        let daily = record.daily().unwrap();
        assert_eq!(daily.statistics.warning, 2);
        assert_eq!(daily.statistics.avg_ph, Some(7.1));
        assert_eq!(aggregator.period(), Some(SummaryPeriod::Daily));
    }

    #[tokio::test]
    async fn test_failure_yields_empty_not_stale() {
        let (backend, aggregator) = setup();
        let mut events = aggregator.events.subscribe();

        aggregator
            .load_summary(SummaryQuery::Monthly { month: 5, year: 2024 })
            .await
            .unwrap();
        assert!(!aggregator.state().is_empty());

        backend.fail_summary(Some(MockFailure::Server)).await;
        assert!(
            aggregator
                .load_summary(SummaryQuery::Monthly { month: 6, year: 2024 })
                .await
                .is_err()
        );
        assert_eq!(aggregator.state(), SummaryState::Empty);

        assert!(matches!(
            events.try_recv(),
            Ok(ConsoleEvent::SummaryChanged { loaded: true, .. })
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(ConsoleEvent::SummaryChanged { loaded: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_month_rejected_locally() {
        let (_backend, aggregator) = setup();
        let err = aggregator
            .load_summary(SummaryQuery::Monthly { month: 0, year: 2024 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_report_tables() {
        let backend = Arc::new(MockBackend::new());
        backend
            .set_daily_rows(vec![DailyTableRow {
                time: "10:00".into(),
                status: "normal".into(),
                ph: "7.0".into(),
                ..Default::default()
            }])
            .await;
        let fetcher = ReportFetcher::new(Arc::clone(&backend) as Arc<dyn AquaApi>);

        let daily = fetcher.daily_table(None).await;
        assert_eq!(daily.rows.len(), 1);
        assert!(!daily.is_failed());

        let invalid = fetcher.monthly_table(13, 2024).await;
        assert!(invalid.is_failed());

        backend.fail_summary(Some(MockFailure::Network)).await;
        let failed = fetcher.daily_table(None).await;
        assert!(failed.is_empty());
        assert!(failed.is_failed());
    }
}
