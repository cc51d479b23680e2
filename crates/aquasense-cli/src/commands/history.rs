//! History command implementation.

use anyhow::{Result, bail};

use aquasense_core::poller::MAX_HISTORY_LIMIT;
use aquasense_core::{HistoryBuffer, SeriesFormatter};
use aquasense_types::MetricKind;

use crate::cli::OutputFormat;
use crate::format::{format_history_csv, format_history_json, format_history_text};
use crate::util::{App, explain};

pub async fn cmd_history(
    app: &App,
    metric: MetricKind,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let limit = limit.unwrap_or(app.config.history_limit);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        bail!("Limit must be between 1 and {}", MAX_HISTORY_LIMIT);
    }
    app.require_login().await?;

    let buffer = HistoryBuffer::new(app.api(), SeriesFormatter::local(), limit, app.events.clone());
    let points = buffer.load_history(metric, limit).await.map_err(explain)?;

    let content = match format {
        OutputFormat::Json => format_history_json(metric, &points, &app.opts)?,
        OutputFormat::Csv => format_history_csv(metric, &points, &app.opts),
        OutputFormat::Text => format_history_text(metric, &points, &app.opts),
    };
    app.write(&content)
}
