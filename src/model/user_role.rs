use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_email, merge_text, non_empty, Entity, PartialRow};
use crate::error::ValidationError;
use crate::gateway::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
        }
    }

    /// Unknown role names map to the least privileged role.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            _ => Role::Moderator,
        }
    }
}

/// `user_roles` table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRoleRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub assigned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Authorization record, separate from the identity provider's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserRole {
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRolePatch {
    pub role: Option<Role>,
    pub assigned_by: Option<String>,
}

impl Entity for UserRole {
    type Row = UserRoleRow;
    type Draft = NewUserRole;
    type Patch = UserRolePatch;

    const TABLE: &'static str = "user_roles";
    const LABEL: &'static str = "user role";
    const ORDER: &'static [Order] = &[Order::desc("created_at")];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: UserRoleRow) -> Self {
        let created_at = row.created_at.unwrap_or_default();
        Self {
            id: row.id.unwrap_or_default(),
            email: row.email.unwrap_or_default().to_lowercase(),
            role: row
                .role
                .as_deref()
                .map(Role::parse_lenient)
                .unwrap_or(Role::Moderator),
            assigned_by: non_empty(row.assigned_by),
            created_at,
            updated_at: row.updated_at.unwrap_or(created_at),
        }
    }

    fn to_row(&self) -> UserRoleRow {
        UserRoleRow {
            id: Some(self.id.clone()),
            email: Some(self.email.clone()),
            role: Some(self.role.as_str().to_string()),
            assigned_by: self.assigned_by.clone(),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }

    fn draft_row(draft: &NewUserRole) -> Value {
        PartialRow::new()
            .put("email", &draft.email.trim().to_lowercase())
            .put("role", &draft.role)
            .put("assigned_by", &non_empty(draft.assigned_by.clone()))
            .into_value()
    }

    fn echo(local_id: String, draft: &NewUserRole) -> Self {
        let now = Utc::now();
        Self {
            id: local_id,
            email: draft.email.trim().to_lowercase(),
            role: draft.role,
            assigned_by: non_empty(draft.assigned_by.clone()),
            created_at: now,
            updated_at: now,
        }
    }

    fn conflicts_with(&self, draft: &NewUserRole) -> Result<(), ValidationError> {
        let email = draft.email.trim().to_lowercase();
        if self.email == email {
            Err(ValidationError::Duplicate {
                field: "email",
                value: email,
            })
        } else {
            Ok(())
        }
    }

    fn patch_row(patch: &UserRolePatch) -> Value {
        PartialRow::new()
            .set("role", &patch.role)
            .set_text("assigned_by", &patch.assigned_by)
            .into_value()
    }

    fn apply(&mut self, patch: &UserRolePatch) {
        if let Some(role) = patch.role {
            self.role = role;
        }
        merge_text(&mut self.assigned_by, &patch.assigned_by);
        self.updated_at = Utc::now();
    }

    fn validate_draft(draft: &NewUserRole) -> Result<(), ValidationError> {
        check_email(&draft.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode;
    use serde_json::json;

    #[test]
    fn test_unknown_role_maps_to_moderator() {
        let role: UserRole = decode(json!({
            "id": "r1", "email": "Someone@Site.dev", "role": "owner",
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(role.role, Role::Moderator);
        assert_eq!(role.email, "someone@site.dev");
        assert_eq!(role.updated_at, role.created_at);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let row = UserRole::draft_row(&NewUserRole {
            email: "Admin@Site.dev".to_string(),
            role: Role::Admin,
            assigned_by: None,
        });
        assert_eq!(row["role"], "admin");
        assert_eq!(row["email"], "admin@site.dev");
    }

    #[test]
    fn test_round_trip_keeps_role() {
        let role: UserRole = decode(json!({
            "id": "r1", "email": "a@b.com", "role": "admin", "assigned_by": "root@b.com",
            "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-02-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(UserRole::from_row(role.to_row()), role);
    }
}
