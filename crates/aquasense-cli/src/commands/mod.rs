//! Command implementations for the CLI.

mod account;
mod config;
mod control;
mod history;
mod reports;
mod users;
mod watch;

pub use account::{cmd_login, cmd_logout, cmd_whoami};
pub use config::cmd_config;
pub use control::cmd_control;
pub use history::cmd_history;
pub use reports::{cmd_report, cmd_summary};
pub use users::cmd_users;
pub use watch::{WatchArgs, cmd_watch};
