//! Client-side content store.
//!
//! Holds every collection and section the site renders, mirrors them from the
//! gateway on [`ContentStore::load`], and applies admin edits optimistically:
//! local state changes first, the remote write runs on a spawned task.

pub mod collection;
pub mod notify;
pub mod sections;
pub mod upload;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::SiteConfig;
use crate::error::{GatewayError, UploadError, ValidationError};
use crate::gateway::Gateway;
use crate::model::{
    Certification, ContactForm, Experience, Message, Project, SectionName, Service, Skill,
    UserRole,
};

pub use collection::Collection;
pub use notify::{NoticeLevel, Notification, Notifier};
pub use sections::{SectionPersistence, Sections};
pub use upload::StoredImage;

/// What happens to local state once a background write settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Adopt the stored row on success, undo the local change on failure.
    #[default]
    Reconcile,
    /// Keep whatever was applied locally, whatever the outcome.
    Optimistic,
}

impl WritePolicy {
    pub fn reconciles(self) -> bool {
        self == WritePolicy::Reconcile
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePolicy::Reconcile => f.write_str("reconcile"),
            WritePolicy::Optimistic => f.write_str("optimistic"),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reconcile" => Ok(WritePolicy::Reconcile),
            "optimistic" => Ok(WritePolicy::Optimistic),
            other => Err(format!("unknown write policy '{}'", other)),
        }
    }
}

/// A remote write running in the background.
///
/// Dropping the handle does not cancel the write; its outcome is still
/// applied to the store and notified.
#[derive(Debug)]
pub struct PendingWrite {
    id: String,
    handle: JoinHandle<Result<String, GatewayError>>,
}

impl PendingWrite {
    pub(crate) fn new(id: String, handle: JoinHandle<Result<String, GatewayError>>) -> Self {
        Self { id, handle }
    }

    /// Id of the entity the write targets (the temporary id for adds).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the write to settle. Yields the id the gateway stored the
    /// entity under, which differs from [`PendingWrite::id`] for adds.
    pub async fn settled(self) -> Result<String, GatewayError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(id = %self.id, error = %e, "Write task did not complete");
                Err(GatewayError::Aborted)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Loading,
    Ready,
}

/// Everything that shapes a store besides its gateway.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub policy: WritePolicy,
    pub local_only_sections: Vec<SectionName>,
    pub bucket: String,
}

impl From<&SiteConfig> for StoreOptions {
    fn from(config: &SiteConfig) -> Self {
        Self {
            policy: config.write_policy,
            local_only_sections: config.local_only_sections.clone(),
            bucket: config.gateway.bucket.clone(),
        }
    }
}

pub struct ContentStore<G> {
    gateway: Arc<G>,
    notifier: Notifier,
    state: watch::Sender<LoadState>,
    bucket: String,
    projects: Collection<G, Project>,
    services: Collection<G, Service>,
    messages: Collection<G, Message>,
    skills: Collection<G, Skill>,
    certifications: Collection<G, Certification>,
    experiences: Collection<G, Experience>,
    user_roles: Collection<G, UserRole>,
    sections: Sections<G>,
}

impl<G: Gateway> ContentStore<G> {
    pub fn new(gateway: Arc<G>, options: StoreOptions) -> Self {
        let notifier = Notifier::new();
        let (state, _) = watch::channel(LoadState::Loading);
        let policy = options.policy;
        tracing::info!(
            policy = %policy,
            local_only = ?options.local_only_sections,
            "Content store created"
        );

        Self {
            projects: Collection::new(Arc::clone(&gateway), notifier.clone(), policy),
            services: Collection::new(Arc::clone(&gateway), notifier.clone(), policy),
            messages: Collection::new(Arc::clone(&gateway), notifier.clone(), policy),
            skills: Collection::new(Arc::clone(&gateway), notifier.clone(), policy),
            certifications: Collection::new(Arc::clone(&gateway), notifier.clone(), policy),
            experiences: Collection::new(Arc::clone(&gateway), notifier.clone(), policy),
            user_roles: Collection::new(Arc::clone(&gateway), notifier.clone(), policy),
            sections: Sections::new(
                Arc::clone(&gateway),
                notifier.clone(),
                policy,
                options.local_only_sections,
            ),
            gateway,
            notifier,
            state,
            bucket: options.bucket,
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn projects(&self) -> &Collection<G, Project> {
        &self.projects
    }

    pub fn services(&self) -> &Collection<G, Service> {
        &self.services
    }

    pub fn messages(&self) -> &Collection<G, Message> {
        &self.messages
    }

    pub fn skills(&self) -> &Collection<G, Skill> {
        &self.skills
    }

    pub fn certifications(&self) -> &Collection<G, Certification> {
        &self.certifications
    }

    pub fn experiences(&self) -> &Collection<G, Experience> {
        &self.experiences
    }

    pub fn user_roles(&self) -> &Collection<G, UserRole> {
        &self.user_roles
    }

    pub fn sections(&self) -> &Sections<G> {
        &self.sections
    }

    pub fn state(&self) -> LoadState {
        *self.state.borrow()
    }

    /// Resolves once the initial load has finished, successful or not.
    pub async fn wait_ready(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives as long as `self`, so this only ends on Ready
        let _ = rx.wait_for(|state| *state == LoadState::Ready).await;
    }

    /// Fetches every collection and section concurrently.
    ///
    /// A failing fetch is notified and leaves its collection empty; the
    /// store becomes ready either way.
    pub async fn load(&self) {
        self.state.send_replace(LoadState::Loading);
        let started = std::time::Instant::now();

        let (projects, services, messages, skills, certifications, experiences, roles, sections) =
            tokio::join!(
                self.projects.refresh(),
                self.services.refresh(),
                self.messages.refresh(),
                self.skills.refresh(),
                self.certifications.refresh(),
                self.experiences.refresh(),
                self.user_roles.refresh(),
                self.sections.load(),
            );

        let failed = [
            projects.is_err(),
            services.is_err(),
            messages.is_err(),
            skills.is_err(),
            certifications.is_err(),
            experiences.is_err(),
            roles.is_err(),
            sections.is_err(),
        ]
        .into_iter()
        .filter(|failed| *failed)
        .count();

        self.state.send_replace(LoadState::Ready);
        if failed == 0 {
            tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Content store ready"
            );
        } else {
            tracing::warn!(
                failed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Content store ready with failed loads"
            );
        }
    }

    /// Public contact form: stored as an unread message.
    pub fn submit_contact(&self, form: ContactForm) -> Result<PendingWrite, ValidationError> {
        self.messages.add(form)
    }

    /// Validates and stores an image under `<section>/`.
    pub async fn upload_image(
        &self,
        section: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredImage, UploadError> {
        let image = upload::check_image(section, file_name, bytes)?;
        match upload::store_image(self.gateway.as_ref(), &self.bucket, image).await {
            Ok(stored) => {
                self.notifier.success("Image uploaded successfully");
                Ok(stored)
            }
            Err(e) => {
                tracing::error!(section, error = %e, "Failed to upload image");
                self.notifier.error("Failed to upload image");
                Err(e)
            }
        }
    }
}
