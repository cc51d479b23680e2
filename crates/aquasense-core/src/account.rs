//! Sign-in and sign-out flows tying [`AquaApi`] to [`AuthSession`].

use tracing::{debug, info, warn};

use aquasense_types::UserProfile;

use crate::api::AquaApi;
use crate::error::{Error, Result};
use crate::events::ConsoleEvent;
use crate::session::AuthSession;

/// Exchange credentials for a token, store it and cache the user profile.
///
/// The profile comes from the login response when the backend includes it,
/// otherwise from `GET /users/me` with the new token. If the profile cannot
/// be fetched the session is left signed out.
pub async fn login<A: AquaApi + ?Sized>(
    api: &A,
    session: &AuthSession,
    username: &str,
    password: &str,
) -> Result<UserProfile> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(Error::validation("username and password are required"));
    }

    let grant = api.login(username.trim(), password).await?;
    session.set_token(grant.access_token).await?;

    let user = match grant.user {
        Some(user) => user,
        None => match api.me().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Signed in but could not load the user profile");
                session.clear().await;
                return Err(e);
            }
        },
    };
    session.set_user(user.clone()).await?;

    info!(username = %user.username, "Signed in");
    Ok(user)
}

/// Sign out: best-effort server-side invalidation, then local teardown.
///
/// The local session is cleared and `LoginRequired` is emitted whatever the
/// outcome of the network call. Returns `true` if the backend acknowledged
/// the logout. With no token, no request is sent but the local teardown
/// and the event still happen.
pub async fn logout<A: AquaApi + ?Sized>(api: &A, session: &AuthSession) -> bool {
    let Some(token) = session.token().await else {
        debug!("Logout without a token; clearing local state only");
        session.clear().await;
        session.events().send(ConsoleEvent::LoginRequired {
            reason: "Logged out".to_string(),
        });
        return false;
    };

    let acknowledged = match api.logout().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Logout request failed; clearing local session anyway");
            false
        }
    };

    // A 401 on the logout call may already have invalidated this token.
    if !session.invalidate_if_current(&token, "Logged out").await {
        debug!("Session was already invalidated");
    }
    acknowledged
}
