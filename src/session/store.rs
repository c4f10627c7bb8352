//! Admin session markers, optionally persisted to a JSON file.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::model::Role;

const MARKER_LEN: usize = 64;

/// Cached display profile of the signed-in admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub profile: AdminProfile,
    /// Identity-provider token, revoked on logout.
    pub access_token: String,
}

fn generate_marker() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), MARKER_LEN)
}

/// Markers are stored hashed; the raw marker only exists on the client.
fn hash_marker(marker: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(marker.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct SessionStore {
    path: Option<PathBuf>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Opens the store, reading existing sessions from `path` when it exists.
    /// An unreadable file is logged and replaced on the next write.
    pub async fn open(path: Option<PathBuf>) -> Self {
        let mut sessions = HashMap::new();
        if let Some(path) = &path {
            match tokio::fs::read(path).await {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(stored) => sessions = stored,
                    Err(e) => {
                        tracing::warn!("Ignoring unreadable session file {}: {}", path.display(), e)
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to read session file {}: {}", path.display(), e),
            }
            tracing::info!(count = sessions.len(), "Admin sessions loaded from {}", path.display());
        }

        Self {
            path,
            sessions: RwLock::new(sessions),
        }
    }

    /// Stores a session and returns the marker the client keeps.
    ///
    /// Nothing is kept when the session file cannot be written.
    pub async fn issue(&self, record: SessionRecord) -> std::io::Result<String> {
        let marker = generate_marker();
        let key = hash_marker(&marker);
        let mut sessions = self.sessions.write().await;
        sessions.insert(key.clone(), record);
        if let Err(e) = self.persist(&sessions).await {
            sessions.remove(&key);
            return Err(e);
        }
        Ok(marker)
    }

    pub async fn lookup(&self, marker: &str) -> Option<SessionRecord> {
        self.sessions.read().await.get(&hash_marker(marker)).cloned()
    }

    pub async fn revoke(&self, marker: &str) -> std::io::Result<Option<SessionRecord>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&hash_marker(marker));
        if removed.is_some() {
            self.persist(&sessions).await?;
        }
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn persist(&self, sessions: &HashMap<String, SessionRecord>) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(sessions)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str) -> SessionRecord {
        SessionRecord {
            profile: AdminProfile {
                user_id: "u1".to_string(),
                email: email.to_string(),
                role: Role::Admin,
                signed_in_at: Utc::now(),
            },
            access_token: "token".to_string(),
        }
    }

    #[test]
    fn test_marker_hash_is_stable_and_hex() {
        let hash = hash_marker("abc");
        assert_eq!(hash, hash_marker("abc"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_issue_lookup_revoke() {
        let store = SessionStore::in_memory();
        let marker = store.issue(record("admin@site.dev")).await.unwrap();
        assert_eq!(marker.len(), MARKER_LEN);

        let found = store.lookup(&marker).await.unwrap();
        assert_eq!(found.profile.email, "admin@site.dev");

        assert!(store.revoke(&marker).await.unwrap().is_some());
        assert!(store.lookup(&marker).await.is_none());
        assert!(store.revoke(&marker).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_issue_keeps_nothing_when_persist_fails() {
        let dir = std::env::temp_dir().join(format!("sessions-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        // a regular file where the session directory should be
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let store = SessionStore::open(Some(blocker.join("admin-sessions.json"))).await;
        assert!(store.issue(record("admin@site.dev")).await.is_err());
        assert_eq!(store.len().await, 0);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sessions_survive_reopen() {
        let dir = std::env::temp_dir().join(format!("sessions-{}", uuid::Uuid::new_v4()));
        let path = dir.join("admin-sessions.json");

        let store = SessionStore::open(Some(path.clone())).await;
        let marker = store.issue(record("admin@site.dev")).await.unwrap();

        let reopened = SessionStore::open(Some(path)).await;
        assert_eq!(reopened.len().await, 1);
        assert!(reopened.lookup(&marker).await.is_some());

        let _ = std::fs::remove_dir_all(dir);
    }
}
