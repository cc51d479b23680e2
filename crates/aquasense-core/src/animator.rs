//! Frame-tick driver for gauge needles.
//!
//! [`GaugeAnimator`] follows the poller's snapshot channel, retargets one
//! spring per metric whenever a snapshot arrives and steps the springs on
//! its own frame clock. Each tick publishes a full set of [`GaugeFrame`]s on
//! a `watch` channel. Stopping the animator stops the frame clock; nothing is
//! published afterwards.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use aquasense_types::{MetricKind, Snapshot};

use crate::error::{Error, Result};
use crate::gauge::{self, GaugeArc, GaugeGeometry, Needle, compute_needle};
use crate::spring::{SpringConfig, SpringInterpolator};

/// One rendered gauge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeFrame {
    pub metric: MetricKind,
    /// Spring-interpolated value shown under the needle.
    pub display_value: f64,
    pub needle: Needle,
    /// Arc segments for the latest polled value.
    pub arc: GaugeArc,
}

impl GaugeFrame {
    fn render(metric: MetricKind, display_value: f64, target: f64, geometry: &GaugeGeometry) -> Self {
        Self {
            metric,
            display_value,
            needle: compute_needle(display_value, metric.gauge_max(), geometry),
            arc: gauge::arc(metric, target),
        }
    }
}

/// Animator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimatorConfig {
    /// Time between frames. Default: 1/60 s.
    pub frame_interval: Duration,
    pub spring: SpringConfig,
    pub geometry: GaugeGeometry,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_micros(16_667),
            spring: SpringConfig::default(),
            geometry: GaugeGeometry::default(),
        }
    }
}

impl AnimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval.is_zero() {
            return Err(Error::invalid_config("frame interval must be positive"));
        }
        self.spring.validate()
    }
}

/// Drives gauge springs from snapshots.
#[derive(Debug)]
pub struct GaugeAnimator {
    config: AnimatorConfig,
    metrics: Vec<MetricKind>,
    frames: watch::Sender<Vec<GaugeFrame>>,
}

impl GaugeAnimator {
    /// Animator for every metric.
    pub fn new(config: AnimatorConfig) -> Self {
        Self::with_metrics(config, MetricKind::ALL)
    }

    pub fn with_metrics(config: AnimatorConfig, metrics: impl IntoIterator<Item = MetricKind>) -> Self {
        let metrics: Vec<_> = metrics.into_iter().collect();
        let initial = metrics
            .iter()
            .map(|m| GaugeFrame::render(*m, 0.0, 0.0, &config.geometry))
            .collect();
        let (frames, _) = watch::channel(initial);
        Self {
            config,
            metrics,
            frames,
        }
    }

    /// Watch rendered frames.
    pub fn frames(&self) -> watch::Receiver<Vec<GaugeFrame>> {
        self.frames.subscribe()
    }

    /// Most recently published frames.
    pub fn current(&self) -> Vec<GaugeFrame> {
        self.frames.borrow().clone()
    }

    /// Start the frame clock, following `snapshots`.
    ///
    /// Springs start at the values of the snapshot current at call time.
    /// The loop also ends when the snapshot sender is dropped.
    pub fn start(&self, mut snapshots: watch::Receiver<Snapshot>) -> Result<AnimatorHandle> {
        self.config.validate()?;
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let config = self.config;
        let frames = self.frames.clone();

        let mut springs: BTreeMap<MetricKind, SpringInterpolator> = {
            let snapshot = snapshots.borrow_and_update();
            self.metrics
                .iter()
                .map(|m| (*m, SpringInterpolator::new(snapshot.value(*m), config.spring)))
                .collect()
        };

        let task = tokio::spawn(async move {
            let mut ticker = interval(config.frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last = Instant::now();

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("Gauge animator stopped");
                        break;
                    }
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            debug!("Snapshot source closed; stopping gauge animator");
                            break;
                        }
                        let snapshot = snapshots.borrow_and_update();
                        for (metric, spring) in springs.iter_mut() {
                            spring.set_target(snapshot.value(*metric));
                        }
                    }
                    now = ticker.tick() => {
                        let dt = now.saturating_duration_since(last);
                        last = now;
                        let rendered: Vec<GaugeFrame> = springs
                            .iter_mut()
                            .map(|(metric, spring)| {
                                let value = spring.step(dt);
                                GaugeFrame::render(*metric, value, spring.target(), &config.geometry)
                            })
                            .collect();
                        if task_cancel.is_cancelled() {
                            break;
                        }
                        frames.send_if_modified(|current| {
                            if *current == rendered {
                                return false;
                            }
                            *current = rendered;
                            true
                        });
                    }
                }
            }
        });

        Ok(AnimatorHandle {
            cancel,
            task: Some(task),
        })
    }
}

/// Handle to a running animator.
#[derive(Debug)]
pub struct AnimatorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AnimatorHandle {
    /// Stop the frame clock.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Gauge animator task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AnimatorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
