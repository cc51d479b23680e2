//! Account administration.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use aquasense_types::{NewUser, UserPatch, UserProfile};

use crate::api::AquaApi;
use crate::error::{Error, Result};

/// Default page size of [`UserAdmin::list`].
pub const DEFAULT_USER_LIMIT: usize = 100;

/// Minimum password length accepted by the registration form.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Admin operations on user accounts. Form checks happen locally before any
/// request; backend refusals come back as [`Error::ServerRejection`].
#[derive(Clone)]
pub struct UserAdmin {
    api: Arc<dyn AquaApi>,
}

impl UserAdmin {
    pub fn new(api: Arc<dyn AquaApi>) -> Self {
        Self { api }
    }

    /// Accounts whose name matches `search`, at most `limit` of them.
    pub async fn list(&self, search: Option<&str>, limit: usize) -> Result<Vec<UserProfile>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.api.list_users(search, limit.max(1)).await
    }

    pub async fn register(&self, user: &NewUser) -> Result<Value> {
        if user.username.trim().is_empty() {
            return Err(Error::validation("Username is required"));
        }
        if user.email.trim().is_empty() || !user.email.contains('@') {
            return Err(Error::validation("A valid email is required"));
        }
        check_password(&user.password, &user.confirm_password)?;

        let created = self.api.register_user(user).await?;
        info!(username = %user.username, role = user.role.as_str(), "User registered");
        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: &UserPatch) -> Result<Value> {
        if patch.is_empty() {
            return Err(Error::validation("Nothing to update"));
        }
        let updated = self.api.update_user(id, patch).await?;
        info!(id, "User updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.api.delete_user(id).await?;
        info!(id, "User deleted");
        Ok(())
    }

    /// Set a new password; `confirm` must match and is never sent.
    pub async fn reset_password(&self, id: &str, new_password: &str, confirm: &str) -> Result<()> {
        check_password(new_password, confirm)?;
        self.api.reset_password(id, new_password).await?;
        info!(id, "Password reset");
        Ok(())
    }
}

fn check_password(password: &str, confirm: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirm {
        return Err(Error::validation("Passwords do not match"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use aquasense_types::Role;

    fn form(username: &str, password: &str, confirm: &str) -> NewUser {
        NewUser {
            username: username.into(),
            name: "Operator".into(),
            email: "op@example.com".into(),
            password: password.into(),
            confirm_password: confirm.into(),
            role: Role::User,
        }
    }

    fn setup() -> (Arc<MockBackend>, UserAdmin) {
        let backend = Arc::new(MockBackend::new());
        let admin = UserAdmin::new(Arc::clone(&backend) as Arc<dyn AquaApi>);
        (backend, admin)
    }

    #[tokio::test]
    async fn test_mismatched_confirmation_never_sent() {
        let (backend, admin) = setup();
        let err = admin
            .register(&form("op", "password123", "password124"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(backend.users().await.len(), 1);
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let (_backend, admin) = setup();
        let err = admin.register(&form("op", "short", "short")).await.unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 8 characters");
    }

    #[tokio::test]
    async fn test_duplicate_username_surfaces_backend_message() {
        let (_backend, admin) = setup();
        let err = admin
            .register(&form("admin", "password123", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServerRejection { status: 400, .. }));
        assert_eq!(err.to_string(), "Username already registered");
    }

    #[tokio::test]
    async fn test_register_update_delete() {
        let (backend, admin) = setup();
        admin
            .register(&form("op", "password123", "password123"))
            .await
            .unwrap();
        let listed = admin.list(Some("op"), DEFAULT_USER_LIMIT).await.unwrap();
        assert_eq!(listed.len(), 1);
        let id = listed[0].id.clone().unwrap();

        let patch = UserPatch {
            role: Some(Role::Admin),
            ..Default::default()
        };
        admin.update(&id, &patch).await.unwrap();
        assert_eq!(
            backend.users().await[1].role.as_deref(),
            Some("admin")
        );

        admin.reset_password(&id, "newpassword", "newpassword").await.unwrap();
        admin.delete(&id).await.unwrap();
        assert_eq!(backend.users().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_patch_rejected() {
        let (_backend, admin) = setup();
        let err = admin.update("1", &UserPatch::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
