//! Login, logout and whoami.

use std::io::{self, IsTerminal};

use anyhow::Result;

use aquasense_core::{AquaApi, account};

use crate::format::format_profile_text;
use crate::style;
use crate::util::{App, explain, prompt_password, prompt_text};

pub async fn cmd_login(
    app: &App,
    username: Option<String>,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let username = match username {
        Some(name) => name,
        None => prompt_text("Username")?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt_password("Password")?,
    };

    let spinner = (!app.quiet && io::stderr().is_terminal())
        .then(|| style::request_spinner(&format!("Signing in to {}...", app.client.base_url())));
    let result = account::login(app.client.as_ref(), &app.session, &username, &password).await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let user = result.map_err(explain)?;

    if json {
        app.write(&app.opts.as_json(&user)?)
    } else {
        app.write(&format_profile_text(&user, &app.opts))
    }
}

pub async fn cmd_logout(app: &App) -> Result<()> {
    if !app.session.is_authenticated().await {
        app.note("Not signed in.");
        account::logout(app.client.as_ref(), &app.session).await;
        return Ok(());
    }

    if account::logout(app.client.as_ref(), &app.session).await {
        app.note("Signed out.");
    } else {
        let warning = style::format_warning(
            "The backend did not confirm the logout; the local session was removed.",
            app.opts.no_color,
        );
        app.note(&warning);
    }
    Ok(())
}

pub async fn cmd_whoami(app: &App, refresh: bool, json: bool) -> Result<()> {
    app.require_login().await?;

    let user = if refresh {
        let user = app.client.me().await.map_err(explain)?;
        app.session.set_user(user.clone()).await?;
        Some(user)
    } else {
        app.session.user().await
    };

    match user {
        Some(user) if json => app.write(&app.opts.as_json(&user)?),
        Some(user) => app.write(&format_profile_text(&user, &app.opts)),
        None => {
            app.note("Signed in, but no profile is cached. Use --refresh to fetch it.");
            Ok(())
        }
    }
}
