//! Error types shared across the gateway, store, session and upload layers.

use thiserror::Error;

/// Failures talking to the hosted data store.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("{table} row '{id}' not found")]
    NotFound { table: String, id: String },

    #[error("failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("write task aborted before completion")]
    Aborted,

    #[error("invalid gateway configuration: {0}")]
    Configuration(String),
}

impl GatewayError {
    pub fn not_found(table: &str, id: &str) -> Self {
        GatewayError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

/// Input rejected before it reaches local state or the gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{field} '{value}' is already in use")]
    Duplicate { field: &'static str, value: String },
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{email} is not authorized for the admin dashboard")]
    AuthorizationMismatch { email: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to persist session: {0}")]
    Storage(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.")]
    UnsupportedType,

    #[error("File too large. Maximum size is 5MB.")]
    TooLarge,

    #[error("Empty file")]
    Empty,

    #[error("File content does not match an allowed image type.")]
    ContentMismatch,

    #[error("Invalid section '{0}'")]
    InvalidSection(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
