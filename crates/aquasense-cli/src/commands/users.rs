//! User administration commands.

use anyhow::Result;

use aquasense_core::UserAdmin;
use aquasense_types::{NewUser, UserPatch};

use crate::cli::UsersAction;
use crate::format::format_users_text;
use crate::util::{App, confirm, explain, prompt_password};

pub async fn cmd_users(app: &App, action: UsersAction, json: bool) -> Result<()> {
    app.require_login().await?;
    let admin = UserAdmin::new(app.api());

    match action {
        UsersAction::List { search, limit } => {
            let users = admin.list(search.as_deref(), limit).await.map_err(explain)?;
            if json {
                app.write(&app.opts.as_json(&users)?)
            } else {
                app.write(&format_users_text(&users, &app.opts))
            }
        }
        UsersAction::Add {
            username,
            name,
            email,
            role,
        } => {
            let password = prompt_password("Password")?;
            let confirm_password = prompt_password("Confirm password")?;
            let user = NewUser {
                username,
                name,
                email,
                password,
                confirm_password,
                role,
            };
            let created = admin.register(&user).await.map_err(explain)?;
            if json {
                app.write(&app.opts.as_json(&created)?)
            } else {
                app.note(&format!("Created user {} ({})", user.username, role.as_str()));
                Ok(())
            }
        }
        UsersAction::Update {
            id,
            name,
            email,
            role,
            active,
        } => {
            let patch = UserPatch {
                name,
                email,
                role,
                is_active: active,
            };
            let updated = admin.update(&id, &patch).await.map_err(explain)?;
            if json {
                app.write(&app.opts.as_json(&updated)?)
            } else {
                app.note(&format!("Updated user {}", id));
                Ok(())
            }
        }
        UsersAction::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete user {}?", id))? {
                app.note("Cancelled.");
                return Ok(());
            }
            admin.delete(&id).await.map_err(explain)?;
            app.note(&format!("Deleted user {}", id));
            Ok(())
        }
        UsersAction::ResetPassword { id } => {
            let password = prompt_password("New password")?;
            let confirm_password = prompt_password("Confirm new password")?;
            admin
                .reset_password(&id, &password, &confirm_password)
                .await
                .map_err(explain)?;
            app.note(&format!("Password reset for user {}", id));
            Ok(())
        }
    }
}
