//! In-process gateway with the same row semantics as the hosted store.
//!
//! Used when no `GATEWAY_URL` is configured and throughout the tests.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Filter, Gateway, GatewayResult, Identity, Order};
use crate::error::GatewayError;

const PUBLIC_BASE: &str = "memory://storage";

/// Unique columns of the hosted schema, as `(table, column)`.
const UNIQUE_COLUMNS: &[(&str, &str)] = &[("user_roles", "email")];

pub struct MemoryGateway {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    users: RwLock<HashMap<String, (String, String)>>,
    signed_in: RwLock<HashSet<String>>,
    unique: Vec<(String, String)>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            tables: RwLock::default(),
            objects: RwLock::default(),
            users: RwLock::default(),
            signed_in: RwLock::default(),
            unique: UNIQUE_COLUMNS
                .iter()
                .map(|(table, column)| (table.to_string(), column.to_string()))
                .collect(),
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unique constraint: inserts and updates that would repeat a
    /// non-null value of `column` fail with a 409 rejection.
    pub fn with_unique(mut self, table: &str, column: &str) -> Self {
        self.unique.push((table.to_string(), column.to_string()));
        self
    }

    /// Fails when `row` repeats a unique value held by another row than `own_id`.
    fn check_unique(
        &self,
        table: &str,
        rows: &[Value],
        row: &Map<String, Value>,
        own_id: Option<&str>,
    ) -> GatewayResult<()> {
        let columns = self
            .unique
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, column)| column);
        for column in columns {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = rows.iter().any(|existing| {
                existing.get(column) == Some(value)
                    && (own_id.is_none() || existing.get("id").and_then(Value::as_str) != own_id)
            });
            if taken {
                return Err(GatewayError::Rejected {
                    status: 409,
                    message: format!(
                        "duplicate key value violates unique constraint \"{}_{}_key\"",
                        table, column
                    ),
                });
            }
        }
        Ok(())
    }

    /// Replaces the contents of a table.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string(), rows);
    }

    /// Registers an identity-provider account.
    pub fn add_user(&self, email: &str, password: &str) -> String {
        let user_id = Uuid::new_v4().to_string();
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                email.to_lowercase(),
                (password.to_string(), user_id.clone()),
            );
        user_id
    }

    /// Identity sessions signed in and not yet signed out.
    pub fn active_identity_sessions(&self) -> usize {
        self.signed_in
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// While offline every call fails with a 503 rejection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Number of gateway calls made so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&format!("{}/{}", bucket, path))
            .cloned()
    }

    fn enter(&self) -> GatewayResult<()> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                message: "gateway offline".to_string(),
            });
        }
        Ok(())
    }
}

/// String form used for equality filters, matching how the wire format
/// compares `eq.<value>`.
fn filter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        // nulls sort last, as in the hosted store's default
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

fn sort_rows(rows: &mut [Value], order: &[Order]) {
    rows.sort_by(|a, b| {
        for o in order {
            let left = a.get(o.column).unwrap_or(&Value::Null);
            let right = b.get(o.column).unwrap_or(&Value::Null);
            let ord = match (o.descending, left, right) {
                // nulls stay last in both directions
                (true, Value::Null, _) | (true, _, Value::Null) => compare_values(left, right),
                (true, _, _) => compare_values(right, left),
                (false, _, _) => compare_values(left, right),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn as_object(table: &str, row: Value) -> GatewayResult<Map<String, Value>> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::Rejected {
            status: 400,
            message: format!("{} expects an object row, got {}", table, other),
        }),
    }
}

fn stamp_new(map: &mut Map<String, Value>) {
    let now = Value::String(Utc::now().to_rfc3339());
    if !matches!(map.get("id"), Some(Value::String(_))) {
        map.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    map.entry("created_at").or_insert_with(|| now.clone());
    map.entry("updated_at").or_insert(now);
}

fn merge(target: &mut Value, patch: Map<String, Value>) {
    if let Value::Object(existing) = target {
        for (key, value) in patch {
            existing.insert(key, value);
        }
        if existing.contains_key("updated_at") {
            existing.insert(
                "updated_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
    }
}

impl Gateway for MemoryGateway {
    async fn select(
        &self,
        table: &str,
        filter: Option<&Filter>,
        order: &[Order],
    ) -> GatewayResult<Vec<Value>> {
        self.enter()?;
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| match filter {
                Some(f) => row
                    .get(&f.column)
                    .map(|v| filter_text(v) == f.value)
                    .unwrap_or(false),
                None => true,
            })
            .collect();
        sort_rows(&mut rows, order);
        Ok(rows)
    }

    async fn select_one(&self, table: &str, id: &str) -> GatewayResult<Value> {
        self.enter()?;
        self.rows(table)
            .into_iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| GatewayError::not_found(table, id))
    }

    async fn insert(&self, table: &str, row: Value) -> GatewayResult<Value> {
        self.enter()?;
        let mut map = as_object(table, row)?;
        stamp_new(&mut map);

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let rows = tables.entry(table.to_string()).or_default();
        self.check_unique(table, rows, &map, None)?;
        let row = Value::Object(map);
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> GatewayResult<Value> {
        self.enter()?;
        let patch = as_object(table, patch)?;

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| GatewayError::not_found(table, id))?;
        self.check_unique(table, rows, &patch, Some(id))?;
        let row = rows
            .iter_mut()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| GatewayError::not_found(table, id))?;
        merge(row, patch);
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> GatewayResult<()> {
        self.enter()?;
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| row.get("id").and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, conflict_column: &str, row: Value) -> GatewayResult<Value> {
        self.enter()?;
        let mut map = as_object(table, row)?;
        let key = map.get(conflict_column).cloned().ok_or_else(|| GatewayError::Rejected {
            status: 400,
            message: format!("upsert on {} requires column {}", table, conflict_column),
        })?;

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(existing) = rows
            .iter_mut()
            .find(|r| r.get(conflict_column) == Some(&key))
        {
            merge(existing, map);
            return Ok(existing.clone());
        }

        stamp_new(&mut map);
        let row = Value::Object(map);
        rows.push(row.clone());
        Ok(row)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> GatewayResult<String> {
        self.enter()?;
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(format!("{}/{}", bucket, path), bytes);
        Ok(format!("{}/{}/{}", PUBLIC_BASE, bucket, path))
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        self.enter()?;
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        match users.get(&email.to_lowercase()) {
            Some((stored, user_id)) if stored == password => {
                let access_token = format!("memory-{}", Uuid::new_v4());
                self.signed_in
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(access_token.clone());
                Ok(Identity {
                    user_id: user_id.clone(),
                    email: email.to_lowercase(),
                    access_token,
                })
            }
            _ => Err(GatewayError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            }),
        }
    }

    async fn sign_out(&self, access_token: &str) -> GatewayResult<()> {
        self.enter()?;
        self.signed_in
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(access_token);
        Ok(())
    }
}
