//! Telemetry synchronization core for the AquaSense water-quality console.
//!
//! This crate talks to the AquaSense REST backend and keeps a consistent,
//! continuously refreshed view of a sensor/actuator installation.
//!
//! # Features
//!
//! - **Authenticated requests**: One injectable [`AuthSession`] holds the
//!   bearer token; a rejected token tears the session down exactly once
//! - **Telemetry polling**: Concurrent per-metric fetches merged into
//!   whole [`Snapshot`](aquasense_types::Snapshot)s, with stale cycles dropped
//! - **History windows**: Chart-ready series for the selected metric
//! - **Actuator control**: Device state flips only on a confirmed command
//! - **Reports**: Daily/monthly summaries and report tables
//! - **Gauge rendering**: Needle geometry and spring-animated values
//! - **Testing**: [`MockBackend`] implements [`AquaApi`] in memory
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use aquasense_core::{ApiClient, AuthSession, ClientConfig, PollerConfig, TelemetryPoller, account};
//! use aquasense_types::MetricKind;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(AuthSession::in_memory());
//!     let client = Arc::new(ApiClient::new(
//!         ClientConfig::new("http://localhost:8000").account_prefix("/v1"),
//!         Arc::clone(&session),
//!     )?);
//!
//!     account::login(client.as_ref(), &session, "admin", "password123").await?;
//!
//!     let poller = Arc::new(TelemetryPoller::new(client, PollerConfig::default()));
//!     let handle = poller.start()?;
//!     let mut snapshots = poller.subscribe();
//!     snapshots.changed().await?;
//!     println!("pH: {:.2}", snapshots.borrow().value(MetricKind::Ph));
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod animator;
pub mod api;
pub mod client;
pub mod control;
pub mod error;
pub mod events;
pub mod gauge;
pub mod generation;
pub mod history;
pub mod mock;
pub mod poller;
pub mod session;
pub mod spring;
pub mod summary;
pub mod users;

// Core exports
pub use api::{AquaApi, LoginGrant, SummaryQuery};
pub use client::{ApiClient, ClientConfig};
pub use error::{Error, Result};
pub use session::{AuthSession, FileSessionStore, MemorySessionStore, PersistedSession, SessionStore};

pub use animator::{AnimatorConfig, AnimatorHandle, GaugeAnimator, GaugeFrame};
pub use control::ControlDispatcher;
pub use events::{ConsoleEvent, EventDispatcher, EventReceiver, EventSender};
pub use gauge::{GaugeArc, GaugeGeometry, GaugeZone, Needle, arc, compute_needle, zone_for};
pub use generation::Generation;
pub use history::{HistoryBuffer, HistoryView, SeriesFormatter};
pub use mock::{MockBackend, MockBackendBuilder, MockFailure};
pub use poller::{CycleOutcome, PollerConfig, PollerHandle, TelemetryPoller};
pub use spring::{SpringConfig, SpringInterpolator, SpringState, step_spring};
pub use summary::{ReportFetcher, ReportTable, SummaryAggregator, SummaryState};
pub use users::UserAdmin;

// Re-export from aquasense-types
pub use aquasense_types::{
    CommandAck, DeviceAction, DeviceId, DeviceState, HistoryPoint, MetricKind, Reading, Snapshot,
    SystemAnalysis,
};
