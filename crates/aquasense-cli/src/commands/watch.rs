//! Watch command implementation.
//!
//! Runs the telemetry poller until Ctrl+C, the requested number of
//! snapshots, or a "log in again" signal. With `--gauges` the spring
//! animator redraws the gauge panel on every frame.

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use aquasense_core::{
    AnimatorConfig, ConsoleEvent, EventReceiver, GaugeAnimator, PollerHandle, TelemetryPoller,
};
use aquasense_types::Snapshot;

use crate::cli::OutputFormat;
use crate::format::{
    format_gauges, format_snapshot_csv_header, format_snapshot_csv_line, format_snapshot_line,
};
use crate::style;
use crate::util::{App, append_output, explain};

/// Clear screen and move the cursor home.
const CLEAR: &str = "\x1b[2J\x1b[H";

/// Arguments for the watch command.
pub struct WatchArgs {
    pub interval: Option<u64>,
    pub count: u32,
    pub format: OutputFormat,
    pub gauges: bool,
}

/// What the event stream asks the loop to do.
enum EventAction {
    Continue,
    Stop,
}

fn on_event(app: &App, event: Result<ConsoleEvent, RecvError>) -> Result<EventAction> {
    match event {
        Ok(ConsoleEvent::LoginRequired { reason }) => {
            bail!("{}. Run `aquasense login` to sign in again.", reason)
        }
        Ok(ConsoleEvent::ConnectivityChanged { connected }) => {
            if !app.quiet && !connected {
                eprintln!(
                    "{}",
                    style::format_warning("Some sensors are not responding", app.opts.no_color)
                );
            }
            Ok(EventAction::Continue)
        }
        Ok(_) | Err(RecvError::Lagged(_)) => Ok(EventAction::Continue),
        Err(RecvError::Closed) => Ok(EventAction::Stop),
    }
}

pub async fn cmd_watch(app: &App, args: WatchArgs) -> Result<()> {
    app.require_login().await?;

    let config = app.config.poller_config(args.interval);
    let poller = Arc::new(
        TelemetryPoller::new(app.api(), config.clone()).with_events(app.events.clone()),
    );
    let events = app.events.subscribe();
    let (snapshots, handle) = start_polling(&poller)?;

    app.note(&format!(
        "Watching {} | Interval: {}s | Press Ctrl+C to stop",
        app.client.base_url(),
        config.interval.as_secs()
    ));

    let result = if args.gauges {
        watch_gauges(app, snapshots, events, args.count).await
    } else {
        watch_lines(app, snapshots, events, &args).await
    };

    handle.shutdown().await;
    result
}

/// Start the poller with a snapshot receiver taken before its first cycle
/// can publish.
fn start_polling(
    poller: &Arc<TelemetryPoller>,
) -> Result<(watch::Receiver<Snapshot>, PollerHandle)> {
    let snapshots = poller.subscribe();
    let handle = poller.start().map_err(explain)?;
    Ok((snapshots, handle))
}

async fn watch_lines(
    app: &App,
    mut snapshots: watch::Receiver<Snapshot>,
    mut events: EventReceiver,
    args: &WatchArgs,
) -> Result<()> {
    let opts = if args.format == OutputFormat::Json {
        app.opts.with_compact(true)
    } else {
        app.opts
    };
    let mut printed: u32 = 0;

    if args.format == OutputFormat::Csv {
        append_output(app.output.as_ref(), &format_snapshot_csv_header(&opts))?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                app.note("\nShutting down...");
                return Ok(());
            }
            event = events.recv() => {
                if let EventAction::Stop = on_event(app, event)? {
                    return Ok(());
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot: Snapshot = snapshots.borrow_and_update().clone();
                let line = match args.format {
                    OutputFormat::Text => format_snapshot_line(&snapshot, &opts),
                    OutputFormat::Csv => format_snapshot_csv_line(&snapshot),
                    OutputFormat::Json => opts.as_json(&snapshot)?,
                };
                append_output(app.output.as_ref(), &line)?;

                printed += 1;
                if args.count > 0 && printed >= args.count {
                    app.note(&format!("Completed {} snapshots.", printed));
                    return Ok(());
                }
            }
        }
    }
}

async fn watch_gauges(
    app: &App,
    mut snapshots: watch::Receiver<Snapshot>,
    mut events: EventReceiver,
    count: u32,
) -> Result<()> {
    let animator = GaugeAnimator::new(AnimatorConfig::default());
    let animation = animator.start(snapshots.clone()).map_err(explain)?;
    let mut frames = animator.frames();
    let mut received: u32 = 0;

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = events.recv() => match on_event(app, event) {
                Ok(EventAction::Continue) => {}
                Ok(EventAction::Stop) => break Ok(()),
                Err(e) => break Err(e),
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                received += 1;
                if count > 0 && received >= count {
                    break Ok(());
                }
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let panel = format_gauges(&frames.borrow_and_update(), &app.opts);
                let snapshot = snapshots.borrow().clone();
                let header = format!(
                    "{} cycle {}\n\n",
                    style::format_connected(snapshot.connected, app.opts.no_color),
                    snapshot.generation
                );
                append_output(None, &format!("{CLEAR}{header}{panel}"))?;
            }
        }
    };

    animation.shutdown().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use aquasense_core::{AquaApi, MockBackend, PollerConfig};

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_reaches_receiver() {
        let backend = Arc::new(MockBackend::new());
        let poller = Arc::new(TelemetryPoller::new(
            backend as Arc<dyn AquaApi>,
            PollerConfig::default(),
        ));

        let (mut snapshots, handle) = start_polling(&poller).unwrap();
        // Let the immediate cycle finish before looking at the receiver.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(poller.snapshot().generation, 1);

        assert!(snapshots.has_changed().unwrap());
        assert_eq!(snapshots.borrow_and_update().generation, 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cloned_receiver_sees_first_cycle() {
        let backend = Arc::new(MockBackend::new());
        let poller = Arc::new(TelemetryPoller::new(
            backend as Arc<dyn AquaApi>,
            PollerConfig::default(),
        ));

        let (snapshots, handle) = start_polling(&poller).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut feed = snapshots.clone();
        assert!(feed.has_changed().unwrap());
        assert_eq!(feed.borrow_and_update().generation, 1);
        handle.shutdown().await;
    }
}
