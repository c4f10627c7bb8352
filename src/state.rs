//! Application state shared by every request handler.

use std::sync::Arc;

use crate::config::SiteConfig;
use crate::gateway::SiteGateway;
use crate::payment::Checkouts;
use crate::session::{AdminLogin, SessionGuard, SessionStore};
use crate::store::{ContentStore, StoreOptions};

pub struct AppState {
    pub store: ContentStore<SiteGateway>,
    pub guard: SessionGuard,
    pub login: AdminLogin<SiteGateway>,
    pub checkouts: Checkouts,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(gateway: Arc<SiteGateway>, sessions: Arc<SessionStore>, config: &SiteConfig) -> Self {
        let store = ContentStore::new(Arc::clone(&gateway), StoreOptions::from(config));
        let checkouts = Checkouts::new(config.payment.clone(), store.notifier().clone());

        Self {
            guard: SessionGuard::new(Arc::clone(&sessions)),
            login: AdminLogin::new(gateway, sessions),
            checkouts,
            store,
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}
