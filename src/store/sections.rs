//! Singleton content sections (hero, about, footer...).

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;

use super::notify::{capitalize, Notifier};
use super::{PendingWrite, WritePolicy};
use crate::error::GatewayError;
use crate::gateway::{table, Gateway};
use crate::model::SectionName;

/// Whether edits to a section are written to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionPersistence {
    Persisted,
    /// Edits live in this process only and are lost on restart.
    LocalOnly,
}

pub struct Sections<G> {
    values: Arc<RwLock<HashMap<SectionName, Value>>>,
    local_only: Vec<SectionName>,
    gateway: Arc<G>,
    notifier: Notifier,
    policy: WritePolicy,
}

impl<G: Gateway> Sections<G> {
    pub(crate) fn new(
        gateway: Arc<G>,
        notifier: Notifier,
        policy: WritePolicy,
        local_only: Vec<SectionName>,
    ) -> Self {
        Self {
            values: Arc::new(RwLock::new(HashMap::new())),
            local_only,
            gateway,
            notifier,
            policy,
        }
    }

    pub fn persistence(&self, name: SectionName) -> SectionPersistence {
        if self.local_only.contains(&name) {
            SectionPersistence::LocalOnly
        } else {
            SectionPersistence::Persisted
        }
    }

    /// Current content, or the built-in default when nothing was stored.
    pub fn get(&self, name: SectionName) -> Value {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned()
            .unwrap_or_else(|| name.default_content())
    }

    pub fn snapshot(&self) -> BTreeMap<SectionName, Value> {
        SectionName::ALL
            .into_iter()
            .map(|name| (name, self.get(name)))
            .collect()
    }

    /// Replaces a section's content locally. Persisted sections are also
    /// upserted in the background; local-only sections return `None`.
    pub fn set(&self, name: SectionName, content: Value) -> Option<PendingWrite> {
        let previous = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, content.clone());

        if self.persistence(name) == SectionPersistence::LocalOnly {
            tracing::info!(section = %name, "Section updated locally only");
            return None;
        }

        let values = Arc::clone(&self.values);
        let gateway = Arc::clone(&self.gateway);
        let notifier = self.notifier.clone();
        let policy = self.policy;

        let handle = tokio::spawn(async move {
            match table::upsert_section(gateway.as_ref(), name, content).await {
                Ok(stored) => {
                    notifier.success(format!(
                        "{} section updated successfully",
                        capitalize(name.as_str())
                    ));
                    Ok(stored.section_name)
                }
                Err(e) => {
                    tracing::error!(section = %name, error = %e, "Failed to update section");
                    if policy.reconciles() {
                        let mut values = values.write().unwrap_or_else(PoisonError::into_inner);
                        match previous {
                            Some(value) => values.insert(name, value),
                            None => values.remove(&name),
                        };
                    }
                    notifier.error(format!("Failed to update {} section", name));
                    Err(e)
                }
            }
        });

        Some(PendingWrite::new(name.to_string(), handle))
    }

    /// Loads every stored section. Rows for local-only sections are still
    /// read so that content written elsewhere shows up.
    pub async fn load(&self) -> Result<usize, GatewayError> {
        match table::list_sections(self.gateway.as_ref()).await {
            Ok(rows) => {
                let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
                let mut count = 0;
                for row in rows {
                    if let Some(name) = row.name() {
                        values.insert(name, row.content);
                        count += 1;
                    }
                }
                tracing::debug!(count, "Sections loaded");
                Ok(count)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load content sections");
                self.notifier.error("Failed to load content sections");
                Err(e)
            }
        }
    }
}
