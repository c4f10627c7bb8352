//! Admin sign-in and the guard in front of every admin view.
//!
//! The guard only checks that a known session marker is presented. Roles are
//! checked once, at login, against the `user_roles` table.

pub mod store;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::error::{AuthError, GatewayError};
use crate::gateway::{table, Gateway};
use crate::model::{Role, UserRole};

pub use store::{AdminProfile, SessionRecord, SessionStore};

pub const LOGIN_PATH: &str = "/admin/login";

/// Why a protected view was refused, and where to send the visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardRejection {
    pub error: String,
    pub redirect: &'static str,
}

impl GuardRejection {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            redirect: LOGIN_PATH,
        }
    }
}

#[derive(Clone)]
pub struct SessionGuard {
    sessions: Arc<SessionStore>,
}

impl SessionGuard {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }

    pub async fn check(&self, marker: Option<&str>) -> Result<AdminProfile, GuardRejection> {
        let Some(marker) = marker.map(str::trim).filter(|m| !m.is_empty()) else {
            tracing::debug!("Admin view requested without a session");
            return Err(GuardRejection::new("Please log in to access the admin dashboard"));
        };
        match self.sessions.lookup(marker).await {
            Some(record) => Ok(record.profile),
            None => {
                tracing::warn!("Admin view requested with an unknown session");
                Err(GuardRejection::new("Your session has ended. Please log in again"))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub marker: String,
    pub profile: AdminProfile,
}

pub struct AdminLogin<G> {
    gateway: Arc<G>,
    sessions: Arc<SessionStore>,
}

impl<G: Gateway> AdminLogin<G> {
    pub fn new(gateway: Arc<G>, sessions: Arc<SessionStore>) -> Self {
        Self { gateway, sessions }
    }

    /// Signs in with the identity provider, then requires an `admin` role
    /// record for the account. Any other role revokes the identity session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidEmail);
        }

        let identity = self
            .gateway
            .sign_in(email, password)
            .await
            .map_err(|e| match e {
                GatewayError::Rejected { status, .. } if (400..=403).contains(&status) => {
                    AuthError::InvalidCredentials
                }
                other => AuthError::Gateway(other),
            })?;

        let roles = match table::find_by::<UserRole, G>(
            self.gateway.as_ref(),
            "email",
            &identity.email.to_lowercase(),
        )
        .await
        {
            Ok(roles) => roles,
            Err(e) => {
                self.revoke_identity(&identity.access_token).await;
                return Err(e.into());
            }
        };

        let role = roles.first().map(|r| r.role);
        if role != Some(Role::Admin) {
            tracing::warn!(email = %identity.email, role = ?role, "Login refused: not an admin");
            self.revoke_identity(&identity.access_token).await;
            return Err(AuthError::AuthorizationMismatch {
                email: identity.email,
            });
        }

        let profile = AdminProfile {
            user_id: identity.user_id,
            email: identity.email,
            role: Role::Admin,
            signed_in_at: Utc::now(),
        };
        let marker = match self
            .sessions
            .issue(SessionRecord {
                profile: profile.clone(),
                access_token: identity.access_token.clone(),
            })
            .await
        {
            Ok(marker) => marker,
            Err(e) => {
                tracing::error!(email = %profile.email, "Failed to store admin session: {}", e);
                self.revoke_identity(&identity.access_token).await;
                return Err(e.into());
            }
        };

        tracing::info!(email = %profile.email, "Admin signed in");
        Ok(LoginOutcome { marker, profile })
    }

    /// Ends a session. Returns whether the marker was known.
    pub async fn logout(&self, marker: &str) -> Result<bool, AuthError> {
        match self.sessions.revoke(marker).await? {
            Some(record) => {
                self.revoke_identity(&record.access_token).await;
                tracing::info!(email = %record.profile.email, "Admin signed out");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_identity(&self, access_token: &str) {
        if let Err(e) = self.gateway.sign_out(access_token).await {
            tracing::warn!("Failed to revoke identity session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use serde_json::json;

    fn setup(role: &str) -> (Arc<MemoryGateway>, Arc<SessionStore>, AdminLogin<MemoryGateway>) {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.add_user("admin@site.dev", "hunter22");
        gateway.seed(
            "user_roles",
            vec![json!({ "id": "r1", "email": "admin@site.dev", "role": role })],
        );
        let sessions = Arc::new(SessionStore::in_memory());
        let login = AdminLogin::new(Arc::clone(&gateway), Arc::clone(&sessions));
        (gateway, sessions, login)
    }

    #[tokio::test]
    async fn test_guard_rejects_missing_and_unknown_markers() {
        let guard = SessionGuard::new(Arc::new(SessionStore::in_memory()));

        let missing = guard.check(None).await.unwrap_err();
        assert_eq!(missing.redirect, LOGIN_PATH);

        let unknown = guard.check(Some("not-a-session")).await.unwrap_err();
        assert_eq!(unknown.redirect, LOGIN_PATH);
        assert_ne!(unknown.error, missing.error);
    }

    #[tokio::test]
    async fn test_admin_login_issues_a_marker_the_guard_accepts() {
        let (_gateway, sessions, login) = setup("admin");

        let outcome = login.login("Admin@Site.dev", "hunter22").await.unwrap();
        assert_eq!(outcome.profile.email, "admin@site.dev");

        let guard = SessionGuard::new(sessions);
        let profile = guard.check(Some(&outcome.marker)).await.unwrap();
        assert_eq!(profile.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_moderator_is_refused_and_signed_out() {
        let (gateway, sessions, login) = setup("moderator");
        let before = gateway.call_count();

        let err = login.login("admin@site.dev", "hunter22").await.unwrap_err();

        assert!(matches!(err, AuthError::AuthorizationMismatch { .. }));
        assert_eq!(sessions.len().await, 0);
        // sign-in, role lookup, sign-out
        assert_eq!(gateway.call_count(), before + 3);
        assert_eq!(gateway.active_identity_sessions(), 0);
    }

    #[tokio::test]
    async fn test_session_storage_failure_signs_identity_out() {
        let (gateway, _sessions, _login) = setup("admin");
        let dir = std::env::temp_dir().join(format!("sessions-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let sessions =
            Arc::new(SessionStore::open(Some(blocker.join("admin-sessions.json"))).await);
        let login = AdminLogin::new(Arc::clone(&gateway), Arc::clone(&sessions));

        let err = login.login("admin@site.dev", "hunter22").await.unwrap_err();

        assert!(matches!(err, AuthError::Storage(_)));
        assert_eq!(sessions.len().await, 0);
        assert_eq!(gateway.active_identity_sessions(), 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let (_gateway, _sessions, login) = setup("admin");
        let err = login.login("admin@site.dev", "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_input_is_checked_before_the_gateway() {
        let (gateway, _sessions, login) = setup("admin");
        assert!(matches!(
            login.login("", "x").await.unwrap_err(),
            AuthError::MissingCredentials
        ));
        assert!(matches!(
            login.login("no-at-sign", "x").await.unwrap_err(),
            AuthError::InvalidEmail
        ));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_logout_revokes_marker() {
        let (gateway, sessions, login) = setup("admin");
        let outcome = login.login("admin@site.dev", "hunter22").await.unwrap();

        assert!(login.logout(&outcome.marker).await.unwrap());
        assert!(!login.logout(&outcome.marker).await.unwrap());
        assert!(sessions.lookup(&outcome.marker).await.is_none());
        assert_eq!(gateway.active_identity_sessions(), 0);
    }
}
