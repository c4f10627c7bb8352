/**
 * Authentication Routes
 * Admin login through the identity provider, session lookup and logout
 */
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{AdminSession, ApiError, SuccessResponse};
use crate::session::AdminProfile;
use crate::state::SharedState;

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    /// Bearer marker for every admin request.
    pub marker: String,
    pub profile: AdminProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub valid: bool,
    pub profile: AdminProfile,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let outcome = state.login.login(&payload.email, &payload.password).await?;
    Ok(Json(LoginResponse {
        success: true,
        marker: outcome.marker,
        profile: outcome.profile,
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<SharedState>,
    admin: AdminSession,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.login.logout(&admin.marker).await?;
    Ok(Json(SuccessResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    }))
}

/// GET /api/auth/session
pub async fn session(admin: AdminSession) -> Json<SessionResponse> {
    Json(SessionResponse {
        valid: true,
        profile: admin.profile,
    })
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
}
