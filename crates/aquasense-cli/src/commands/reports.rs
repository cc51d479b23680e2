//! Summary and report table commands.

use anyhow::{Result, bail};
use time::OffsetDateTime;

use aquasense_core::{ReportFetcher, SummaryAggregator, SummaryQuery};

use crate::cli::{OutputFormat, PeriodArgs};
use crate::format::{
    format_daily_table_csv, format_daily_table_text, format_monthly_table_csv,
    format_monthly_table_text, format_summary_text,
};
use crate::util::{App, explain, parse_date};

/// Resolve period arguments, defaulting to today / the current month.
fn query_for(period: &PeriodArgs) -> Result<SummaryQuery> {
    match period {
        PeriodArgs::Daily { date } => Ok(SummaryQuery::Daily {
            date: date.as_deref().map(parse_date).transpose()?,
        }),
        PeriodArgs::Monthly { month, year } => {
            let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
            Ok(SummaryQuery::Monthly {
                month: month.unwrap_or(u8::from(now.month())),
                year: year.unwrap_or(now.year()),
            })
        }
    }
}

pub async fn cmd_summary(app: &App, period: &PeriodArgs, json: bool) -> Result<()> {
    let query = query_for(period)?;
    app.require_login().await?;

    let aggregator = SummaryAggregator::new(app.api(), app.events.clone());
    let record = aggregator.load_summary(query).await.map_err(explain)?;

    if json {
        app.write(&app.opts.as_json(&record.body)?)
    } else {
        app.write(&format_summary_text(&record, &app.opts))
    }
}

pub async fn cmd_report(app: &App, period: &PeriodArgs, format: OutputFormat) -> Result<()> {
    let query = query_for(period)?;
    app.require_login().await?;
    let fetcher = ReportFetcher::new(app.api());

    let content = match query {
        SummaryQuery::Daily { date } => {
            let table = fetcher.daily_table(date).await;
            if let Some(error) = table.error {
                bail!("Failed to load the daily report: {}", error);
            }
            match format {
                OutputFormat::Json => app.opts.as_json(&table.rows)?,
                OutputFormat::Csv => format_daily_table_csv(&table.rows, &app.opts),
                OutputFormat::Text => format_daily_table_text(&table.rows, &app.opts),
            }
        }
        SummaryQuery::Monthly { month, year } => {
            let table = fetcher.monthly_table(month, year).await;
            if let Some(error) = table.error {
                bail!("Failed to load the monthly report: {}", error);
            }
            match format {
                OutputFormat::Json => app.opts.as_json(&table.rows)?,
                OutputFormat::Csv => format_monthly_table_csv(&table.rows, &app.opts),
                OutputFormat::Text => format_monthly_table_text(&table.rows, &app.opts),
            }
        }
    };
    app.write(&content)
}
