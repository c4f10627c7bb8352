/**
 * Checkout Routes
 * Mock card payment for a listed service
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::ApiError;
use crate::payment::{CardInput, CheckoutSnapshot};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckout {
    pub service_id: String,
}

/// POST /api/checkout
pub async fn start(
    State(state): State<SharedState>,
    Json(payload): Json<StartCheckout>,
) -> Result<(StatusCode, Json<CheckoutSnapshot>), ApiError> {
    let service = state
        .store
        .services()
        .get(&payload.service_id)
        .ok_or_else(|| ApiError::NotFound("Service".to_string()))?;

    let snapshot = state.checkouts.start(&service)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /api/checkout/{id}
pub async fn get_checkout(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<CheckoutSnapshot>, ApiError> {
    Ok(Json(state.checkouts.get(&id)?))
}

/// PATCH /api/checkout/{id} - card field edits, formatted as typed
pub async fn edit(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(input): Json<CardInput>,
) -> Result<Json<CheckoutSnapshot>, ApiError> {
    Ok(Json(state.checkouts.edit(&id, &input)?))
}

/// POST /api/checkout/{id}/submit
pub async fn submit(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CheckoutSnapshot>), ApiError> {
    let snapshot = state.checkouts.submit(&id)?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// DELETE /api/checkout/{id}
pub async fn cancel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.checkouts.cancel(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/checkout", post(start))
        .route(
            "/api/checkout/{id}",
            get(get_checkout).patch(edit).delete(cancel),
        )
        .route("/api/checkout/{id}/submit", post(submit))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{json, send, state_with};
    use crate::create_app;
    use crate::gateway::MemoryGateway;
    use crate::state::SharedState;
    use axum::http::StatusCode;
    use serde_json::json;

    async fn state_with_service() -> SharedState {
        let memory = MemoryGateway::new();
        memory.seed(
            "services",
            vec![json!({
                "id": "s1", "title": "Site audit", "description": "Full review",
                "icon": "search", "price": 250.0, "featured": true, "features": ["SEO"]
            })],
        );
        let state = state_with(memory);
        state.store.load().await;
        state
    }

    async fn start(state: &SharedState) -> String {
        let (status, body) = send(
            create_app(state.clone()),
            "POST",
            "/api/checkout",
            None,
            Some(json!({ "serviceId": "s1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json(&body)["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_checkout_for_unknown_service() {
        let state = state_with_service().await;
        let (status, _) = send(
            create_app(state),
            "POST",
            "/api/checkout",
            None,
            Some(json!({ "serviceId": "missing" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_edits_are_formatted() {
        let state = state_with_service().await;
        let id = start(&state).await;

        let (status, body) = send(
            create_app(state),
            "PATCH",
            &format!("/api/checkout/{}", id),
            None,
            Some(json!({ "cardNumber": "4242424242424242", "expiry": "1230" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["state"], "form-open");
        assert_eq!(body["form"]["cardNumber"], "4242 4242 4242 4242");
        assert_eq!(body["form"]["expiry"], "12/30");
    }

    #[tokio::test]
    async fn test_invalid_card_returns_to_form() {
        let state = state_with_service().await;
        let id = start(&state).await;

        let (status, body) = send(
            create_app(state.clone()),
            "POST",
            &format!("/api/checkout/{}/submit", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(&body)["error"], "Please enter a valid card number");

        let (_, body) = send(
            create_app(state),
            "GET",
            &format!("/api/checkout/{}", id),
            None,
            None,
        )
        .await;
        assert_eq!(json(&body)["state"], "form-open");
    }

    #[tokio::test]
    async fn test_valid_card_starts_processing() {
        let state = state_with_service().await;
        let id = start(&state).await;

        send(
            create_app(state.clone()),
            "PATCH",
            &format!("/api/checkout/{}", id),
            None,
            Some(json!({
                "cardNumber": "4242424242424242", "name": "Ann",
                "expiry": "1230", "cvc": "123"
            })),
        )
        .await;
        let (status, body) = send(
            create_app(state.clone()),
            "POST",
            &format!("/api/checkout/{}/submit", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json(&body)["state"], "processing");

        let (status, _) = send(
            create_app(state),
            "DELETE",
            &format!("/api/checkout/{}", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cancel_forgets_checkout() {
        let state = state_with_service().await;
        let id = start(&state).await;

        let (status, _) = send(
            create_app(state.clone()),
            "DELETE",
            &format!("/api/checkout/{}", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            create_app(state),
            "GET",
            &format!("/api/checkout/{}", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
