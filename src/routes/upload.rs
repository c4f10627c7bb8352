use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::{AdminSession, ApiError};
use crate::state::SharedState;
use crate::store::upload::MAX_FILE_SIZE;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
}

/// POST /api/uploads/{section} - first multipart file field
pub async fn upload_image(
    State(state): State<SharedState>,
    _admin: AdminSession,
    Path(section): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => return Err(ApiError::BadRequest("No file provided".to_string())),
        Err(e) => {
            tracing::error!("Multipart error: {}", e);
            return Err(ApiError::BadRequest("Invalid multipart data".to_string()));
        }
    };

    let original_name = field.file_name().unwrap_or("unknown").to_string();
    let bytes = field.bytes().await.map_err(|e| {
        tracing::error!("Failed to read upload bytes: {}", e);
        ApiError::BadRequest("Failed to read file data".to_string())
    })?;

    let stored = state
        .store
        .upload_image(&section, &original_name, bytes.to_vec())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: stored.url,
            filename: stored.path,
            size: stored.size,
            mime_type: stored.content_type.to_string(),
        }),
    ))
}

pub fn routes() -> Router<SharedState> {
    Router::new().route(
        "/api/uploads/{section}",
        // Leave headroom for the multipart framing around a max-size file.
        post(upload_image).layer(DefaultBodyLimit::max(MAX_FILE_SIZE + 64 * 1024)),
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{admin_marker, json, state_with};
    use crate::create_app;
    use crate::gateway::MemoryGateway;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-UPLOAD-BOUNDARY";
    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn multipart_body(file_name: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn request(uri: &str, marker: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut req = Request::post(uri).header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(marker) = marker {
            req = req.header("authorization", format!("Bearer {}", marker));
        }
        req.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_upload_requires_admin() {
        let state = state_with(MemoryGateway::new());
        let res = create_app(state)
            .oneshot(request("/api/uploads/hero", None, multipart_body("a.png", PNG)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_stores_image_in_section_folder() {
        let state = state_with(MemoryGateway::new());
        let marker = admin_marker(&state).await;

        let res = create_app(state.clone())
            .oneshot(request(
                "/api/uploads/projects",
                Some(&marker),
                multipart_body("shot.png", PNG),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = json(&body);
        let filename = body["filename"].as_str().unwrap();
        assert!(filename.starts_with("projects/"));
        assert_eq!(body["mimeType"], "image/png");
        assert_eq!(body["size"], PNG.len());

        let memory = state.store.gateway().memory().unwrap();
        assert_eq!(memory.object("portfolio", filename), Some(PNG.to_vec()));
    }

    #[tokio::test]
    async fn test_upload_rejects_disguised_file() {
        let state = state_with(MemoryGateway::new());
        let marker = admin_marker(&state).await;

        let res = create_app(state)
            .oneshot(request(
                "/api/uploads/hero",
                Some(&marker),
                multipart_body("fake.png", b"not an image at all"),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
