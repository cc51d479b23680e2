//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use aquasense_types::{MetricKind, Role};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Visual styling mode for output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StyleMode {
    /// Tables with rounded borders and colours (default)
    #[default]
    Rich,
    /// Plain text with no decorations (for scripting)
    Plain,
}

/// Reusable output format arguments
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Omit header row in CSV output (useful for appending)
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Parser)]
#[command(name = "aquasense")]
#[command(author, version, about = "Console for the AquaSense water-quality backend", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Visual styling mode (rich, plain)
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "rich",
        env = "AQUASENSE_STYLE"
    )]
    pub style: StyleMode,

    /// Backend URL (overrides the config file)
    #[arg(long, global = true, env = "AQUASENSE_URL")]
    pub url: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "AQUASENSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session token
    Login {
        /// Account name
        #[arg(short, long, env = "AQUASENSE_USER")]
        username: Option<String>,

        /// Password (prompted for when omitted)
        #[arg(long, env = "AQUASENSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in account
    Whoami {
        /// Fetch the profile from the backend instead of the local cache
        #[arg(long)]
        refresh: bool,
    },

    /// Continuously poll all sensors
    Watch {
        #[command(flatten)]
        output: OutputArgs,

        /// Polling interval in seconds (3-60, overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Number of snapshots to print before exiting (0 for unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Render animated gauges instead of one line per snapshot
        #[arg(long, conflicts_with = "format")]
        gauges: bool,
    },

    /// Show the recent history of one metric
    History {
        /// Metric (temperature, ph, turbidity, nh3, tds)
        metric: MetricKind,

        #[command(flatten)]
        output: OutputArgs,

        /// Number of records (overrides config)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Switch an actuator on or off
    Control {
        /// Device id (pump1, pump2, servo1, servo2, servo3)
        device: String,

        /// Action (on, off)
        action: String,
    },

    /// Daily or monthly summary
    Summary {
        #[command(subcommand)]
        period: PeriodArgs,
    },

    /// Daily or monthly report table
    Report {
        #[command(subcommand)]
        period: PeriodArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Manage user accounts (admin)
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Report period selection
#[derive(Debug, Clone, Subcommand)]
pub enum PeriodArgs {
    /// One day (today unless --date is given)
    Daily {
        /// Day to report on (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// One calendar month
    Monthly {
        /// Month (1-12), defaults to the current month
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
        month: Option<u8>,

        /// Year, defaults to the current year
        #[arg(long)]
        year: Option<i32>,
    },
}

/// User administration subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum UsersAction {
    /// List accounts
    #[command(alias = "ls")]
    List {
        /// Filter by username
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of accounts
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,
    },

    /// Register a new account (password is prompted for)
    Add {
        username: String,

        /// Display name
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, value_parser = parse_role, default_value = "user")]
        role: Role,
    },

    /// Change account details
    Update {
        /// Account id
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,

        /// Enable or disable the account
        #[arg(long, value_parser = parse_bool_arg)]
        active: Option<bool>,
    },

    /// Delete an account
    #[command(alias = "rm")]
    Delete {
        /// Account id
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Set a new password for an account (prompted for)
    ResetPassword {
        /// Account id
        id: String,
    },
}

/// Configuration keys
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigKey {
    /// Backend root URL
    BaseUrl,
    /// Prefix of the /auth and /users routes
    AccountPrefix,
    /// Request timeout in seconds
    Timeout,
    /// Polling interval in seconds
    PollInterval,
    /// History window length
    HistoryLimit,
    /// Disable colored output
    NoColor,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init,
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse().map_err(|_| format!("Invalid role '{}'. Use: admin, user", s))
}

/// Parse boolean argument with flexible input
fn parse_bool_arg(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(format!(
            "Invalid boolean value '{}'. Use: true/false, yes/no, on/off, 1/0",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_history_metric() {
        let cli = Cli::try_parse_from(["aquasense", "history", "nh3", "-n", "10"]).unwrap();
        match cli.command {
            Commands::History { metric, limit, .. } => {
                assert_eq!(metric, MetricKind::Ammonia);
                assert_eq!(limit, Some(10));
            }
            _ => panic!("expected history"),
        }
    }

    #[test]
    fn test_monthly_month_range() {
        assert!(Cli::try_parse_from(["aquasense", "summary", "monthly", "--month", "13"]).is_err());
        assert!(Cli::try_parse_from(["aquasense", "summary", "monthly", "--month", "12"]).is_ok());
    }

    #[test]
    fn test_parse_bool_arg() {
        assert_eq!(parse_bool_arg("on"), Ok(true));
        assert_eq!(parse_bool_arg("Disabled"), Ok(false));
        assert!(parse_bool_arg("maybe").is_err());
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("ADMIN"), Ok(Role::Admin));
        assert!(parse_role("root").is_err());
    }
}
