//! An ordered, locally cached list of one entity kind with optimistic writes.
//!
//! Writes against an echo whose create has not settled yet wait for it and
//! then go to the stored id. Patches merged into such an echo are replayed
//! onto the stored row when the create lands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use uuid::Uuid;

use super::notify::{capitalize, Notifier};
use super::{PendingWrite, WritePolicy};
use crate::error::{GatewayError, ValidationError};
use crate::gateway::{table, Gateway};
use crate::model::{Entity, Message, MessagePatch};

pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Created {
    Pending,
    Stored(String),
    Failed,
}

/// A create that has not settled, keyed by its local id.
struct InFlight<P> {
    created: watch::Sender<Created>,
    patches: Vec<P>,
}

type InFlightMap<P> = Arc<Mutex<HashMap<String, InFlight<P>>>>;

// Lock order: `in_flight` before `items`.
pub struct Collection<G, E: Entity> {
    items: Arc<RwLock<Vec<E>>>,
    in_flight: InFlightMap<E::Patch>,
    gateway: Arc<G>,
    notifier: Notifier,
    policy: WritePolicy,
}

fn write_items<E>(items: &RwLock<Vec<E>>) -> RwLockWriteGuard<'_, Vec<E>> {
    items.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Waits for a create to settle. `None` when it failed.
async fn stored_id(mut created: watch::Receiver<Created>) -> Option<String> {
    let settled = created.wait_for(|c| *c != Created::Pending).await.ok()?;
    match &*settled {
        Created::Stored(id) => Some(id.clone()),
        _ => None,
    }
}

/// Puts the stored version of `id` back after a failed write whose local
/// snapshot no longer matches it. With `reinsert_at` a missing slot is
/// re-created at that position.
async fn reload_slot<G: Gateway, E: Entity>(
    items: &RwLock<Vec<E>>,
    gateway: &G,
    id: &str,
    reinsert_at: Option<usize>,
) {
    match table::get_by_id::<E, G>(gateway, id).await {
        Ok(stored) => {
            let mut items = write_items(items);
            if let Some(slot) = items.iter_mut().find(|item| item.id() == id) {
                *slot = stored;
            } else if let Some(at) = reinsert_at {
                let at = at.min(items.len());
                items.insert(at, stored);
            }
        }
        Err(e) => {
            tracing::warn!(table = E::TABLE, id, error = %e, "Could not reload {}", E::LABEL);
        }
    }
}

impl<G: Gateway, E: Entity> Collection<G, E> {
    pub(crate) fn new(gateway: Arc<G>, notifier: Notifier, policy: WritePolicy) -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            gateway,
            notifier,
            policy,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<E>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<E>> {
        write_items(&self.items)
    }

    pub fn get_all(&self) -> Vec<E> {
        self.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<E> {
        self.read().iter().find(|item| item.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Re-populates the list from the gateway, in the entity's default order.
    ///
    /// On failure the cached list is left as it was.
    pub async fn refresh(&self) -> Result<usize, GatewayError> {
        match table::list_all::<E, G>(self.gateway.as_ref(), None).await {
            Ok(items) => {
                let count = items.len();
                *self.write() = items;
                tracing::debug!(table = E::TABLE, count, "Collection loaded");
                Ok(count)
            }
            Err(e) => {
                tracing::error!(table = E::TABLE, error = %e, "Failed to load {}s", E::LABEL);
                self.notifier.error(format!("Failed to load {}s", E::LABEL));
                Err(e)
            }
        }
    }

    /// Appends a local echo of `draft` right away and creates it remotely in
    /// the background. The handle's id is the temporary local id.
    pub fn add(&self, draft: E::Draft) -> Result<PendingWrite, ValidationError> {
        E::validate_draft(&draft)?;

        let local_id = format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4());
        {
            let mut in_flight = lock(&self.in_flight);
            let mut items = self.write();
            items.iter().try_for_each(|item| item.conflicts_with(&draft))?;
            let (created, _) = watch::channel(Created::Pending);
            in_flight.insert(
                local_id.clone(),
                InFlight {
                    created,
                    patches: Vec::new(),
                },
            );
            items.push(E::echo(local_id.clone(), &draft));
        }
        tracing::debug!(table = E::TABLE, id = %local_id, "Added locally");

        let items = Arc::clone(&self.items);
        let in_flight = Arc::clone(&self.in_flight);
        let gateway = Arc::clone(&self.gateway);
        let notifier = self.notifier.clone();
        let policy = self.policy;
        let id = local_id.clone();

        let handle = tokio::spawn(async move {
            let result = table::create::<E, G>(gateway.as_ref(), &draft).await;
            let (outcome, entry) = {
                let mut in_flight = lock(&in_flight);
                let entry = in_flight.remove(&id);
                let outcome = match result {
                    Ok(mut created) => {
                        let stored_id = created.id().to_string();
                        if policy.reconciles() {
                            if let Some(entry) = &entry {
                                for patch in &entry.patches {
                                    created.apply(patch);
                                }
                            }
                            let mut items = write_items(&items);
                            if let Some(slot) = items.iter_mut().find(|item| item.id() == id) {
                                *slot = created;
                            }
                        }
                        Ok(stored_id)
                    }
                    Err(e) => {
                        if policy.reconciles() {
                            write_items(&items).retain(|item| item.id() != id);
                        }
                        Err(e)
                    }
                };
                (outcome, entry)
            };
            if let Some(entry) = entry {
                entry.created.send_replace(match &outcome {
                    Ok(stored_id) => Created::Stored(stored_id.clone()),
                    Err(_) => Created::Failed,
                });
            }

            match outcome {
                Ok(stored_id) => {
                    notifier.success(format!("{} added successfully", capitalize(E::LABEL)));
                    Ok(stored_id)
                }
                Err(e) => {
                    tracing::error!(table = E::TABLE, error = %e, "Failed to add {}", E::LABEL);
                    notifier.error(format!("Failed to add {}", E::LABEL));
                    Err(e)
                }
            }
        });

        Ok(PendingWrite::new(local_id, handle))
    }

    /// Merges `patch` into the cached entity right away and updates it
    /// remotely in the background. The handle settles with the id the row
    /// is stored under.
    ///
    /// An id that is not cached is a no-op: `Ok(None)`, nothing is sent.
    pub fn update(
        &self,
        id: &str,
        patch: E::Patch,
    ) -> Result<Option<PendingWrite>, ValidationError> {
        E::validate_patch(&patch)?;

        let (previous, created) = {
            let mut in_flight = lock(&self.in_flight);
            let mut items = self.write();
            let Some(item) = items.iter_mut().find(|item| item.id() == id) else {
                tracing::debug!(table = E::TABLE, id, "Update for unknown id ignored");
                return Ok(None);
            };
            let mut merged = item.clone();
            merged.apply(&patch);
            merged.validate()?;
            let previous = std::mem::replace(item, merged);
            let created = in_flight.get_mut(id).map(|entry| {
                entry.patches.push(patch.clone());
                entry.created.subscribe()
            });
            (previous, created)
        };

        let items = Arc::clone(&self.items);
        let gateway = Arc::clone(&self.gateway);
        let notifier = self.notifier.clone();
        let policy = self.policy;
        let id = id.to_string();
        let task_id = id.clone();

        let handle = tokio::spawn(async move {
            let target = match created {
                None => task_id.clone(),
                Some(created) => match stored_id(created).await {
                    Some(stored) => stored,
                    None => {
                        notifier.error(format!("Failed to update {}", E::LABEL));
                        return Err(GatewayError::not_found(E::TABLE, &task_id));
                    }
                },
            };

            match table::update::<E, G>(gateway.as_ref(), &target, &patch).await {
                Ok(stored) => {
                    if policy.reconciles() {
                        let mut items = write_items(&items);
                        if let Some(slot) = items.iter_mut().find(|item| item.id() == target) {
                            *slot = stored;
                        }
                    }
                    notifier.success(format!("{} updated successfully", capitalize(E::LABEL)));
                    Ok(target)
                }
                Err(e) => {
                    tracing::error!(
                        table = E::TABLE,
                        id = %target,
                        error = %e,
                        "Failed to update {}",
                        E::LABEL
                    );
                    if policy.reconciles() {
                        if target == task_id {
                            let mut items = write_items(&items);
                            if let Some(slot) = items.iter_mut().find(|item| item.id() == target) {
                                *slot = previous;
                            }
                        } else {
                            reload_slot::<G, E>(&items, gateway.as_ref(), &target, None).await;
                        }
                    }
                    notifier.error(format!("Failed to update {}", E::LABEL));
                    Err(e)
                }
            }
        });

        Ok(Some(PendingWrite::new(id, handle)))
    }

    /// Drops the entity locally right away and deletes it remotely in the
    /// background. `None` when the id is not cached.
    ///
    /// Removing an echo whose create is still in flight deletes the row once
    /// it is stored; if the create fails there is nothing left to delete.
    pub fn remove(&self, id: &str) -> Option<PendingWrite> {
        let (index, removed, created) = {
            let in_flight = lock(&self.in_flight);
            let mut items = self.write();
            let index = items.iter().position(|item| item.id() == id)?;
            let created = in_flight.get(id).map(|entry| entry.created.subscribe());
            (index, items.remove(index), created)
        };

        let items = Arc::clone(&self.items);
        let gateway = Arc::clone(&self.gateway);
        let notifier = self.notifier.clone();
        let policy = self.policy;
        let id = id.to_string();
        let task_id = id.clone();

        let handle = tokio::spawn(async move {
            let target = match created {
                None => task_id.clone(),
                Some(created) => match stored_id(created).await {
                    Some(stored) => stored,
                    None => {
                        notifier.success(format!("{} deleted successfully", capitalize(E::LABEL)));
                        return Ok(task_id);
                    }
                },
            };

            match table::delete::<E, G>(gateway.as_ref(), &target).await {
                Ok(()) => {
                    notifier.success(format!("{} deleted successfully", capitalize(E::LABEL)));
                    Ok(target)
                }
                Err(e) => {
                    tracing::error!(
                        table = E::TABLE,
                        id = %target,
                        error = %e,
                        "Failed to delete {}",
                        E::LABEL
                    );
                    if policy.reconciles() {
                        if target == task_id {
                            let mut items = write_items(&items);
                            let at = index.min(items.len());
                            items.insert(at, removed);
                        } else {
                            reload_slot::<G, E>(&items, gateway.as_ref(), &target, Some(index))
                                .await;
                        }
                    }
                    notifier.error(format!("Failed to delete {}", E::LABEL));
                    Err(e)
                }
            }
        });

        Some(PendingWrite::new(id, handle))
    }
}

impl<G: Gateway> Collection<G, Message> {
    /// Marks a message read. Already-read and unknown messages are left alone.
    pub fn mark_read(&self, id: &str) -> Option<PendingWrite> {
        if self.get(id)?.read {
            return None;
        }
        self.update(id, MessagePatch::mark_read()).unwrap_or(None)
    }

    pub fn unread_count(&self) -> usize {
        self.read().iter().filter(|m| !m.read).count()
    }
}
