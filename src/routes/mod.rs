/**
 * Routes Module
 * API route handlers, the shared error response and the admin extractor
 */
pub mod auth;
pub mod checkout;
pub mod collections;
pub mod content;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod upload;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{AuthError, GatewayError, UploadError, ValidationError};
use crate::payment::PaymentError;
use crate::session::{AdminProfile, GuardRejection};
use crate::state::SharedState;

/// Error body used by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(GuardRejection),
    Validation(ValidationError),
    Auth(AuthError),
    Upload(UploadError),
    Payment(PaymentError),
    Gateway(GatewayError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        ApiError::Upload(e)
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        ApiError::Payment(e)
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError::Gateway(e)
    }
}

impl From<GuardRejection> for ApiError {
    fn from(rejection: GuardRejection) -> Self {
        ApiError::Unauthorized(rejection)
    }
}

fn gateway_status(e: &GatewayError) -> StatusCode {
    match e {
        GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
        GatewayError::Rejected { status: 409, .. } => StatusCode::CONFLICT,
        GatewayError::Configuration(_) | GatewayError::Aborted => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Unauthorized(rejection) => {
                return (StatusCode::UNAUTHORIZED, Json(rejection)).into_response();
            }
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what), None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Validation(e) => {
                let status = match &e {
                    ValidationError::Duplicate { .. } => StatusCode::CONFLICT,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, "Validation failed".to_string(), Some(e.to_string()))
            }
            ApiError::Auth(e) => {
                let status = match &e {
                    AuthError::MissingCredentials | AuthError::InvalidEmail => {
                        StatusCode::BAD_REQUEST
                    }
                    AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                    AuthError::AuthorizationMismatch { .. } => StatusCode::FORBIDDEN,
                    AuthError::Gateway(inner) => gateway_status(inner),
                    AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string(), None)
            }
            ApiError::Upload(e) => {
                let status = match &e {
                    UploadError::Gateway(inner) => gateway_status(inner),
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string(), None)
            }
            ApiError::Payment(e) => {
                let status = match &e {
                    PaymentError::Card(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    PaymentError::UnknownCheckout(_) => StatusCode::NOT_FOUND,
                    PaymentError::NotOpen(_)
                    | PaymentError::AlreadyOpen
                    | PaymentError::InFlight => StatusCode::CONFLICT,
                };
                (status, e.to_string(), None)
            }
            ApiError::Gateway(e) => {
                let status = gateway_status(&e);
                if status.is_server_error() {
                    tracing::error!("Gateway error: {}", e);
                }
                (status, "Failed to reach the content store".to_string(), Some(e.to_string()))
            }
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

/// Extract bearer token from Authorization header
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// A request carrying a known admin session marker.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub marker: String,
    pub profile: AdminProfile,
}

impl FromRequestParts<SharedState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let marker = bearer_token(parts);
        let profile = state.guard.check(marker).await?;
        Ok(AdminSession {
            marker: marker.unwrap_or_default().trim().to_string(),
            profile,
        })
    }
}

/// `?wait=true` makes a write endpoint respond after the gateway settles.
#[derive(Debug, Default, serde::Deserialize)]
pub struct WriteQuery {
    #[serde(default)]
    pub wait: bool,
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::SiteConfig;
    use crate::gateway::{MemoryGateway, SiteGateway};
    use crate::session::SessionStore;
    use crate::state::{AppState, SharedState};

    pub const ADMIN_EMAIL: &str = "admin@site.dev";
    pub const ADMIN_PASSWORD: &str = "correct-horse";

    /// State over an in-memory gateway holding one admin account.
    pub fn state_with(memory: MemoryGateway) -> SharedState {
        memory.add_user(ADMIN_EMAIL, ADMIN_PASSWORD);
        let mut roles = memory.rows("user_roles");
        roles.push(serde_json::json!({ "id": "role-admin", "email": ADMIN_EMAIL, "role": "admin" }));
        memory.seed("user_roles", roles);

        let gateway = Arc::new(SiteGateway::Memory(memory));
        let sessions = Arc::new(SessionStore::in_memory());
        AppState::new(gateway, sessions, &SiteConfig::in_memory()).shared()
    }

    pub async fn admin_marker(state: &SharedState) -> String {
        state
            .login
            .login(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .unwrap()
            .marker
    }

    pub async fn send(
        app: Router,
        method: &str,
        uri: &str,
        marker: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Bytes) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(marker) = marker {
            req = req.header("authorization", format!("Bearer {}", marker));
        }
        let req = match body {
            Some(json) => req
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes)
    }

    pub fn json(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }
}
