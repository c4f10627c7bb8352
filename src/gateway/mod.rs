//! Remote data gateway: the boundary between the content store and the hosted
//! table/object/identity service.
//!
//! The [`Gateway`] trait speaks JSON rows. Typed per-entity operations live in
//! [`table`] and go through the mapping layer in [`crate::model`].

pub mod memory;
pub mod rest;
pub mod table;

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

pub use memory::MemoryGateway;
pub use rest::RestGateway;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// One column of an ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

impl Order {
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Authenticated identity returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

/// Row, object and identity operations against the hosted store.
///
/// No retries and no timeouts beyond the transport's own. Callers that stop
/// awaiting a call abandon its result; the remote side may still apply it.
pub trait Gateway: Send + Sync + 'static {
    fn select(
        &self,
        table: &str,
        filter: Option<&Filter>,
        order: &[Order],
    ) -> impl Future<Output = GatewayResult<Vec<Value>>> + Send;

    fn select_one(&self, table: &str, id: &str)
        -> impl Future<Output = GatewayResult<Value>> + Send;

    /// Inserts a row; the store assigns `id` and timestamps.
    fn insert(&self, table: &str, row: Value) -> impl Future<Output = GatewayResult<Value>> + Send;

    fn update(
        &self,
        table: &str,
        id: &str,
        patch: Value,
    ) -> impl Future<Output = GatewayResult<Value>> + Send;

    fn delete(&self, table: &str, id: &str) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Insert-or-merge keyed on `conflict_column`.
    fn upsert(
        &self,
        table: &str,
        conflict_column: &str,
        row: Value,
    ) -> impl Future<Output = GatewayResult<Value>> + Send;

    /// Stores an object and returns its public URL.
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = GatewayResult<String>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = GatewayResult<Identity>> + Send;

    fn sign_out(&self, access_token: &str) -> impl Future<Output = GatewayResult<()>> + Send;
}

/// The gateway the service runs with: the hosted store when a URL is
/// configured, otherwise the in-memory one.
pub enum SiteGateway {
    Rest(RestGateway),
    Memory(MemoryGateway),
}

impl SiteGateway {
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        match &config.url {
            Some(url) => {
                tracing::info!(url = %url, "Using hosted gateway");
                Ok(SiteGateway::Rest(RestGateway::new(url, &config.api_key)?))
            }
            None => {
                tracing::info!("GATEWAY_URL not set. Running against in-memory gateway.");
                Ok(SiteGateway::Memory(MemoryGateway::new()))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SiteGateway::Rest(_) => "rest",
            SiteGateway::Memory(_) => "memory",
        }
    }

    pub fn memory(&self) -> Option<&MemoryGateway> {
        match self {
            SiteGateway::Memory(g) => Some(g),
            SiteGateway::Rest(_) => None,
        }
    }
}

impl Gateway for SiteGateway {
    async fn select(
        &self,
        table: &str,
        filter: Option<&Filter>,
        order: &[Order],
    ) -> GatewayResult<Vec<Value>> {
        match self {
            SiteGateway::Rest(g) => g.select(table, filter, order).await,
            SiteGateway::Memory(g) => g.select(table, filter, order).await,
        }
    }

    async fn select_one(&self, table: &str, id: &str) -> GatewayResult<Value> {
        match self {
            SiteGateway::Rest(g) => g.select_one(table, id).await,
            SiteGateway::Memory(g) => g.select_one(table, id).await,
        }
    }

    async fn insert(&self, table: &str, row: Value) -> GatewayResult<Value> {
        match self {
            SiteGateway::Rest(g) => g.insert(table, row).await,
            SiteGateway::Memory(g) => g.insert(table, row).await,
        }
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> GatewayResult<Value> {
        match self {
            SiteGateway::Rest(g) => g.update(table, id, patch).await,
            SiteGateway::Memory(g) => g.update(table, id, patch).await,
        }
    }

    async fn delete(&self, table: &str, id: &str) -> GatewayResult<()> {
        match self {
            SiteGateway::Rest(g) => g.delete(table, id).await,
            SiteGateway::Memory(g) => g.delete(table, id).await,
        }
    }

    async fn upsert(&self, table: &str, conflict_column: &str, row: Value) -> GatewayResult<Value> {
        match self {
            SiteGateway::Rest(g) => g.upsert(table, conflict_column, row).await,
            SiteGateway::Memory(g) => g.upsert(table, conflict_column, row).await,
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> GatewayResult<String> {
        match self {
            SiteGateway::Rest(g) => g.upload(bucket, path, bytes, content_type).await,
            SiteGateway::Memory(g) => g.upload(bucket, path, bytes, content_type).await,
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        match self {
            SiteGateway::Rest(g) => g.sign_in(email, password).await,
            SiteGateway::Memory(g) => g.sign_in(email, password).await,
        }
    }

    async fn sign_out(&self, access_token: &str) -> GatewayResult<()> {
        match self {
            SiteGateway::Rest(g) => g.sign_out(access_token).await,
            SiteGateway::Memory(g) => g.sign_out(access_token).await,
        }
    }
}
