/**
 * Notification Routes
 * Outcomes of content store writes for the admin dashboard, polled or streamed
 */
use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;

use super::AdminSession;
use crate::state::SharedState;
use crate::store::notify::Notification;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// GET /api/notifications - the latest notifications, oldest first
pub async fn recent(
    State(state): State<SharedState>,
    _admin: AdminSession,
) -> Json<Vec<Notification>> {
    Json(state.store.notifier().recent())
}

/// GET /api/notifications/stream - one `notification` event per store outcome
pub async fn stream(
    State(state): State<SharedState>,
    _admin: AdminSession,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.store.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => match serde_json::to_string(&notification) {
                    Ok(data) => {
                        let event = Event::default().event("notification").data(data);
                        return Some((Ok(event), rx));
                    }
                    Err(e) => tracing::warn!("Failed to encode notification: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification stream fell behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/notifications", get(recent))
        .route("/api/notifications/stream", get(stream))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{admin_marker, json, send, state_with};
    use crate::create_app;
    use crate::gateway::MemoryGateway;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_notifications_require_admin() {
        let state = state_with(MemoryGateway::new());
        let (status, _) = send(create_app(state), "GET", "/api/notifications", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_failed_write_shows_up_in_recent_notifications() {
        let state = state_with(MemoryGateway::new());
        let marker = admin_marker(&state).await;
        state.store.gateway().memory().unwrap().set_offline(true);

        let (status, _) = send(
            create_app(state.clone()),
            "POST",
            "/api/projects?wait=true",
            Some(&marker),
            Some(json!({ "title": "Storefront" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, body) = send(
            create_app(state),
            "GET",
            "/api/notifications",
            Some(&marker),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let notices = json(&body);
        let failure = notices
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["message"] == "Failed to add project")
            .unwrap();
        assert_eq!(failure["level"], "error");
        assert!(failure["createdAt"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_stream_delivers_notifications_as_events() {
        let state = state_with(MemoryGateway::new());
        let marker = admin_marker(&state).await;

        let res = create_app(state.clone())
            .oneshot(
                Request::get("/api/notifications/stream")
                    .header("authorization", format!("Bearer {}", marker))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "text/event-stream");

        state.store.notifier().error("Failed to update service");

        let mut body = res.into_body().into_data_stream();
        let chunk = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.contains("event: notification"));
        assert!(text.contains("Failed to update service"));
    }
}
