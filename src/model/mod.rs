//! Domain entities and their mapping to and from gateway rows.
//!
//! Each entity module defines four shapes:
//! - the row as the hosted store returns it (snake_case, nullable columns),
//! - the domain value the site works with (defaults applied),
//! - a draft used to create one,
//! - a patch with every field optional, validated before it is merged.

pub mod certification;
pub mod experience;
pub mod message;
pub mod project;
pub mod section;
pub mod service;
pub mod skill;
pub mod user_role;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::gateway::Order;

pub use certification::{Certification, CertificationPatch, NewCertification};
pub use experience::{Experience, ExperiencePatch, NewExperience};
pub use message::{ContactForm, Message, MessagePatch};
pub use project::{NewProject, Project, ProjectPatch};
pub use section::{ContentSection, SectionName};
pub use service::{NewService, Service, ServicePatch};
pub use skill::{NewSkill, Skill, SkillPatch};
pub use user_role::{NewUserRole, Role, UserRole, UserRolePatch};

/// A collection-backed entity stored in one gateway table.
pub trait Entity: Clone + Send + Sync + 'static {
    type Row: Serialize + DeserializeOwned + Send;
    type Draft: Clone + Send + Sync + 'static;
    type Patch: Clone + Default + Send + Sync + 'static;

    const TABLE: &'static str;
    /// Lowercase singular noun used in notifications ("project").
    const LABEL: &'static str;
    const ORDER: &'static [Order];

    fn id(&self) -> &str;

    /// Row to domain value. Total: missing columns take their defaults.
    fn from_row(row: Self::Row) -> Self;

    fn to_row(&self) -> Self::Row;

    /// Insert payload for a draft (no id; the store assigns it).
    fn draft_row(draft: &Self::Draft) -> Value;

    /// Local copy of a draft shown before the store answers.
    fn echo(local_id: String, draft: &Self::Draft) -> Self;

    /// Update payload holding only the fields the patch sets.
    fn patch_row(patch: &Self::Patch) -> Value;

    /// Field-wise shallow merge.
    fn apply(&mut self, patch: &Self::Patch);

    fn validate_draft(_draft: &Self::Draft) -> Result<(), ValidationError> {
        Ok(())
    }

    fn validate_patch(_patch: &Self::Patch) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Cross-field rules checked on the merged value before an update lands.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Rejects a draft that would duplicate this entity on a unique column.
    fn conflicts_with(&self, _draft: &Self::Draft) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Decodes a gateway row into a domain value.
pub fn decode<E: Entity>(row: Value) -> Result<E, serde_json::Error> {
    serde_json::from_value::<E::Row>(row).map(E::from_row)
}

/// Builder for partial rows: unset optional fields are left out entirely.
#[derive(Debug, Default)]
pub struct PartialRow(Map<String, Value>);

impl PartialRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(mut self, column: &str, value: &T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.0.insert(column.to_string(), value);
        }
        self
    }

    pub fn set<T: Serialize>(self, column: &str, value: &Option<T>) -> Self {
        match value {
            Some(v) => self.put(column, v),
            None => self,
        }
    }

    /// Optional text column: an empty string clears it (stored as null).
    pub fn set_text(self, column: &str, value: &Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some("") => self.put(column, &Value::Null),
            Some(_) => self.set(column, value),
            None => self,
        }
    }

    /// Clearable column: `Some(None)` is written as null.
    pub fn set_nullable<T: Serialize>(self, column: &str, value: &Option<Option<T>>) -> Self {
        match value {
            Some(Some(v)) => self.put(column, v),
            Some(None) => self.put(column, &Value::Null),
            None => self,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Replaces `target` when the patch carries a value.
pub(crate) fn merge_field<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// Like [`merge_field`] for optional text: an empty string clears the field.
pub(crate) fn merge_text(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        *target = non_empty(Some(v.clone()));
    }
}

pub(crate) fn merge_nullable<T: Clone>(target: &mut Option<T>, value: &Option<Option<T>>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// Patch field that tells an absent key (`None`) apart from an explicit
/// `null` (`Some(None)`). Use with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Stand-in for a missing required date column.
pub(crate) fn epoch_date() -> chrono::NaiveDate {
    chrono::DateTime::<chrono::Utc>::default().date_naive()
}

/// Date columns arrive as `YYYY-MM-DD` or, from timestamp-typed columns,
/// as a full RFC 3339 string; only the calendar date is kept.
pub(crate) fn date_column<'de, D>(deserializer: D) -> Result<Option<chrono::NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let date = text.get(..10).unwrap_or(&text);
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid date '{}': {}", text, e)))
}

/// String-array columns arrive either as a JSON array or as a
/// comma-separated string; both decode to an ordered list.
pub(crate) fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<Option<String>>),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::List(items)) => Some(items.into_iter().flatten().collect()),
        Some(Raw::Text(text)) => Some(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    })
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

pub(crate) fn require_if_set(
    field: &'static str,
    value: &Option<String>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) => require(field, v),
        None => Ok(()),
    }
}

pub(crate) fn check_email(value: &str) -> Result<(), ValidationError> {
    lazy_static::lazy_static! {
        static ref EMAIL_REGEX: regex::Regex =
            regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex");
    }

    require("email", value)?;
    if EMAIL_REGEX.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::invalid("email", "not an email address"))
    }
}
