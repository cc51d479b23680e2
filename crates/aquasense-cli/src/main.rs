//! Command-line console for the AquaSense water-quality backend.

mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, OutputArgs, OutputFormat};
use commands::{
    WatchArgs, cmd_config, cmd_control, cmd_history, cmd_login, cmd_logout, cmd_report,
    cmd_summary, cmd_users, cmd_watch, cmd_whoami,
};
use config::Config;
use format::FormatOptions;
use util::App;

/// `--json` wins over a command's own `--format`.
fn effective_format(json: bool, output: &OutputArgs) -> OutputFormat {
    if json { OutputFormat::Json } else { output.format }
}

fn output_args(command: &Commands) -> Option<&OutputArgs> {
    match command {
        Commands::Watch { output, .. }
        | Commands::History { output, .. }
        | Commands::Report { output, .. } => Some(output),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::path);
    if let Commands::Config { action } = cli.command {
        return cmd_config(action, &config_path);
    }

    let config = Config::load_from(&config_path);
    let no_header = output_args(&cli.command).is_some_and(|o| o.no_header);
    let opts = FormatOptions::new(cli.no_color || config.no_color, cli.style)
        .with_compact(cli.compact)
        .with_no_header(no_header);
    let app = App::connect(config, cli.url.as_deref(), opts, cli.output.clone(), cli.quiet).await?;
    let json = cli.json;

    match cli.command {
        Commands::Login { username, password } => cmd_login(&app, username, password, json).await,
        Commands::Logout => cmd_logout(&app).await,
        Commands::Whoami { refresh } => cmd_whoami(&app, refresh, json).await,
        Commands::Watch {
            output,
            interval,
            count,
            gauges,
        } => {
            let args = WatchArgs {
                interval,
                count,
                format: effective_format(json, &output),
                gauges,
            };
            cmd_watch(&app, args).await
        }
        Commands::History {
            metric,
            output,
            limit,
        } => cmd_history(&app, metric, limit, effective_format(json, &output)).await,
        Commands::Control { device, action } => cmd_control(&app, &device, &action, json).await,
        Commands::Summary { period } => cmd_summary(&app, &period, json).await,
        Commands::Report { period, output } => {
            cmd_report(&app, &period, effective_format(json, &output)).await
        }
        Commands::Users { action } => cmd_users(&app, action, json).await,
        Commands::Config { .. } => Ok(()),
    }
}
