/**
 * Message Routes
 * Public contact form plus the admin inbox
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::collections::{admin_get_one, admin_list, refresh, remove};
use super::{AdminSession, ApiError, SuccessResponse, WriteQuery};
use crate::model::{ContactForm, Message};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxSummary {
    pub total: usize,
    pub unread: usize,
}

/// POST /api/messages - contact form submission
pub async fn submit(
    State(state): State<SharedState>,
    Query(query): Query<WriteQuery>,
    Json(form): Json<ContactForm>,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    let pending = state.store.submit_contact(form)?;

    let status = if query.wait {
        pending.settled().await?;
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };
    Ok((
        status,
        Json(SuccessResponse {
            success: true,
            message: "Message sent successfully".to_string(),
        }),
    ))
}

/// GET /api/messages/summary
pub async fn summary(State(state): State<SharedState>, _admin: AdminSession) -> Json<InboxSummary> {
    let messages = state.store.messages();
    Json(InboxSummary {
        total: messages.len(),
        unread: messages.unread_count(),
    })
}

/// POST /api/messages/{id}/read
pub async fn mark_read(
    State(state): State<SharedState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    Query(query): Query<WriteQuery>,
) -> Result<Json<Message>, ApiError> {
    let messages = state.store.messages();
    if let Some(pending) = messages.mark_read(&id) {
        if query.wait {
            pending.settled().await?;
        }
    }
    messages
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Message".to_string()))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/messages", get(admin_list::<Message>).post(submit))
        .route("/api/messages/summary", get(summary))
        .route("/api/messages/refresh", post(refresh::<Message>))
        .route(
            "/api/messages/{id}",
            get(admin_get_one::<Message>).delete(remove::<Message>),
        )
        .route("/api/messages/{id}/read", post(mark_read))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{admin_marker, json, send, state_with};
    use crate::create_app;
    use crate::gateway::MemoryGateway;
    use axum::http::StatusCode;
    use serde_json::json;

    fn inbox() -> MemoryGateway {
        let memory = MemoryGateway::new();
        memory.seed(
            "messages",
            vec![json!({
                "id": "m1", "name": "Ada", "email": "ada@example.com",
                "subject": "Hello", "message": "Hi there",
                "created_at": "2024-03-01T10:00:00Z", "read": false
            })],
        );
        memory
    }

    #[tokio::test]
    async fn test_contact_form_is_public() {
        let state = state_with(MemoryGateway::new());

        let (status, body) = send(
            create_app(state.clone()),
            "POST",
            "/api/messages?wait=true",
            None,
            Some(json!({ "name": "Ada", "email": "ada@example.com", "message": "Hello" })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json(&body)["success"], true);
        let memory = state.store.gateway().memory().unwrap();
        assert_eq!(memory.rows("messages")[0]["read"], false);
    }

    #[tokio::test]
    async fn test_contact_form_rejects_bad_email() {
        let state = state_with(MemoryGateway::new());
        let (status, _) = send(
            create_app(state),
            "POST",
            "/api/messages",
            None,
            Some(json!({ "name": "Ada", "email": "nope", "message": "Hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_inbox_requires_admin() {
        let state = state_with(inbox());
        state.store.load().await;

        let (status, _) = send(create_app(state.clone()), "GET", "/api/messages", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let marker = admin_marker(&state).await;
        let (status, body) =
            send(create_app(state), "GET", "/api/messages", Some(&marker), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)[0]["body"], "Hi there");
    }

    #[tokio::test]
    async fn test_mark_read_updates_summary() {
        let state = state_with(inbox());
        state.store.load().await;
        let marker = admin_marker(&state).await;

        let (status, body) = send(
            create_app(state.clone()),
            "POST",
            "/api/messages/m1/read?wait=true",
            Some(&marker),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["read"], true);

        let (_, body) = send(
            create_app(state),
            "GET",
            "/api/messages/summary",
            Some(&marker),
            None,
        )
        .await;
        assert_eq!(json(&body), json!({ "total": 1, "unread": 0 }));
    }

    #[tokio::test]
    async fn test_mark_read_unknown_message() {
        let state = state_with(inbox());
        let marker = admin_marker(&state).await;

        let (status, _) = send(
            create_app(state),
            "POST",
            "/api/messages/missing/read",
            Some(&marker),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
