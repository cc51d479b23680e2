//! Utility functions for CLI operations.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};
use time::{Date, macros::format_description};

use aquasense_core::{
    ApiClient, AquaApi, AuthSession, EventDispatcher, FileSessionStore, SessionStore,
};

use crate::config::Config;
use crate::format::FormatOptions;

/// Everything a command needs: settings, the shared session and the client.
pub struct App {
    pub config: Config,
    pub session: Arc<AuthSession>,
    pub client: Arc<ApiClient>,
    pub events: EventDispatcher,
    pub opts: FormatOptions,
    pub output: Option<PathBuf>,
    pub quiet: bool,
}

impl App {
    /// Build the client and restore the stored session.
    pub async fn connect(
        config: Config,
        url: Option<&str>,
        opts: FormatOptions,
        output: Option<PathBuf>,
        quiet: bool,
    ) -> Result<Self> {
        let store: Arc<dyn SessionStore> = Arc::new(
            FileSessionStore::default_location().context("Cannot locate the session file")?,
        );
        let events = EventDispatcher::default();
        let session = Arc::new(AuthSession::new(store, events.clone()));
        if session.restore().await.context("Failed to read the stored session")? {
            tracing::debug!("Restored stored session");
        }

        let client_config = config.client_config(url);
        let client = Arc::new(
            ApiClient::new(client_config, Arc::clone(&session)).context("Invalid connection settings")?,
        );

        Ok(Self {
            config,
            session,
            client,
            events,
            opts,
            output,
            quiet,
        })
    }

    /// The client as a trait object, for the core components.
    pub fn api(&self) -> Arc<dyn AquaApi> {
        self.client.clone()
    }

    /// Fail early when there is no stored token.
    pub async fn require_login(&self) -> Result<()> {
        if self.session.is_authenticated().await {
            Ok(())
        } else {
            bail!("Not signed in. Run `aquasense login` first.")
        }
    }

    pub fn write(&self, content: &str) -> Result<()> {
        write_output(self.output.as_ref(), content)
    }

    /// Print a status message to stderr unless `--quiet` is set.
    pub fn note(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }
}

/// Convert a core error into a user-facing one.
pub fn explain(error: aquasense_core::Error) -> anyhow::Error {
    if error.is_unauthorized() {
        anyhow!("Session expired or missing. Run `aquasense login` to sign in again.")
    } else {
        anyhow::Error::new(error)
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<Date> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", input))
}

fn require_terminal(what: &str) -> Result<()> {
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
        bail!("{} must be entered interactively (no terminal attached)", what);
    }
    Ok(())
}

/// Prompt for a line of text.
pub fn prompt_text(prompt: &str) -> Result<String> {
    require_terminal(prompt)?;
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact_text()
        .context("Failed to read input")
}

/// Prompt for a hidden password.
pub fn prompt_password(prompt: &str) -> Result<String> {
    require_terminal("Password")?;
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()
        .context("Failed to read password")
}

/// Ask a yes/no question, defaulting to no.
pub fn confirm(prompt: &str) -> Result<bool> {
    require_terminal("Confirmation")?;
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// Write output to file or stdout
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Append output to a file, or print it to stdout.
pub fn append_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date(" 2024-05-01 ").unwrap();
        assert_eq!(date.to_string(), "2024-05-01");
    }

    #[test]
    fn test_parse_date_invalid() {
        let err = parse_date("01/05/2024").unwrap_err().to_string();
        assert!(err.contains("YYYY-MM-DD"));
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn test_explain_unauthorized() {
        let err = explain(aquasense_core::Error::Unauthorized).to_string();
        assert!(err.contains("aquasense login"));
    }

    #[test]
    fn test_explain_passes_other_errors() {
        let err = explain(aquasense_core::Error::validation("month must be between 1 and 12"));
        assert!(err.to_string().contains("month must be between 1 and 12"));
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_output(Some(&path), "a,b\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a,b\n");
    }

    #[test]
    fn test_append_output_keeps_previous_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.csv");
        append_output(Some(&path), "header\n").unwrap();
        append_output(Some(&path), "row\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "header\nrow\n");
    }
}
