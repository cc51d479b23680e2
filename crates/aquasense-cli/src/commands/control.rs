//! Control command implementation.

use std::io::{self, IsTerminal};

use anyhow::Result;

use aquasense_core::ControlDispatcher;

use crate::style;
use crate::util::{App, explain};

pub async fn cmd_control(app: &App, device: &str, action: &str, json: bool) -> Result<()> {
    app.require_login().await?;
    let dispatcher = ControlDispatcher::new(app.api(), app.events.clone());

    let spinner = (!app.quiet && io::stderr().is_terminal())
        .then(|| style::request_spinner(&format!("Sending {} to {}...", action, device)));
    let result = dispatcher.send_raw(device, action).await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let ack = result.map_err(explain)?;

    if json {
        app.write(&app.opts.as_json(&ack)?)
    } else {
        app.write(&format!("{}\n", style::format_ack(&ack, app.opts.no_color)))
    }
}
