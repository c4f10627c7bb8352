use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_email, non_empty, require, Entity, PartialRow};
use crate::error::ValidationError;
use crate::gateway::Order;

/// `messages` table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub read: Option<bool>,
}

/// A contact-form submission as the admin inbox sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Public contact form input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

/// The only change the admin can make to a message is marking it read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePatch {
    pub read: Option<bool>,
}

impl MessagePatch {
    pub fn mark_read() -> Self {
        Self { read: Some(true) }
    }
}

impl Entity for Message {
    type Row = MessageRow;
    type Draft = ContactForm;
    type Patch = MessagePatch;

    const TABLE: &'static str = "messages";
    const LABEL: &'static str = "message";
    const ORDER: &'static [Order] = &[Order::desc("created_at")];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: MessageRow) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
            subject: row.subject.unwrap_or_default(),
            body: row.message.unwrap_or_default(),
            created_at: row.created_at.unwrap_or_default(),
            read: row.read.unwrap_or(false),
        }
    }

    fn to_row(&self) -> MessageRow {
        MessageRow {
            id: Some(self.id.clone()),
            name: Some(self.name.clone()),
            email: Some(self.email.clone()),
            subject: Some(self.subject.clone()),
            message: Some(self.body.clone()),
            created_at: Some(self.created_at),
            read: Some(self.read),
        }
    }

    fn draft_row(form: &ContactForm) -> Value {
        PartialRow::new()
            .put("name", &form.name.trim())
            .put("email", &form.email.trim())
            .put("subject", &non_empty(form.subject.clone()).unwrap_or_default())
            .put("message", &form.message)
            .put("read", &false)
            .into_value()
    }

    fn echo(local_id: String, form: &ContactForm) -> Self {
        Self {
            id: local_id,
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            subject: non_empty(form.subject.clone()).unwrap_or_default(),
            body: form.message.clone(),
            created_at: Utc::now(),
            read: false,
        }
    }

    fn patch_row(patch: &MessagePatch) -> Value {
        PartialRow::new().set("read", &patch.read).into_value()
    }

    fn apply(&mut self, patch: &MessagePatch) {
        if patch.read == Some(true) {
            self.read = true;
        }
    }

    fn validate_draft(form: &ContactForm) -> Result<(), ValidationError> {
        require("name", &form.name)?;
        check_email(&form.email)?;
        require("message", &form.message)
    }

    fn validate_patch(patch: &MessagePatch) -> Result<(), ValidationError> {
        match patch.read {
            Some(false) => Err(ValidationError::invalid(
                "read",
                "messages cannot be marked unread",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode;
    use serde_json::json;

    #[test]
    fn test_missing_read_defaults_to_false() {
        let message: Message = decode(json!({
            "id": "m1", "name": "A", "email": "a@b.com", "message": "hi",
            "created_at": "2024-01-02T03:04:05Z"
        }))
        .unwrap();
        assert!(!message.read);
        assert_eq!(message.subject, "");
        assert_eq!(message.body, "hi");
    }

    #[test]
    fn test_contact_form_without_subject_is_valid() {
        let form = ContactForm {
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            subject: None,
            message: "hi".to_string(),
        };
        assert!(Message::validate_draft(&form).is_ok());

        let echo = Message::echo("local-1".to_string(), &form);
        assert!(!echo.read);
        assert_eq!(echo.subject, "");
    }

    #[test]
    fn test_contact_form_requires_valid_email() {
        let form = ContactForm {
            name: "A".to_string(),
            email: "nope".to_string(),
            subject: None,
            message: "hi".to_string(),
        };
        assert!(Message::validate_draft(&form).is_err());
    }

    #[test]
    fn test_read_cannot_go_back_to_false() {
        let patch = MessagePatch { read: Some(false) };
        assert!(Message::validate_patch(&patch).is_err());

        let mut message = Message::echo(
            "m1".to_string(),
            &ContactForm {
                name: "A".to_string(),
                email: "a@b.com".to_string(),
                subject: None,
                message: "hi".to_string(),
            },
        );
        message.apply(&MessagePatch::mark_read());
        message.apply(&patch);
        assert!(message.read);
    }
}
