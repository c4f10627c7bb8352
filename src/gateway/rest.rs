/*!
 * Hosted store client
 * PostgREST-style tables, object storage and password sign-in over HTTPS
 */
use reqwest::{header, Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Filter, Gateway, GatewayResult, Identity, Order};
use crate::error::GatewayError;

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

pub struct RestGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl RestGateway {
    pub fn new(base_url: &str, api_key: &str) -> GatewayResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| GatewayError::Configuration(e.to_string()))?;

        let client = Client::builder()
            .user_agent(concat!("portfolio-site/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> GatewayResult<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| GatewayError::Configuration(e.to_string()))
    }

    fn table_url(&self, table: &str) -> GatewayResult<Url> {
        self.url(&format!("/rest/v1/{}", table))
    }

    fn row_url(&self, table: &str, id: &str) -> GatewayResult<Url> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
        Ok(url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }
}

/// Builds the `order` query value, e.g. `category.asc,name.asc`.
pub fn order_param(order: &[Order]) -> String {
    order
        .iter()
        .map(|o| {
            format!(
                "{}.{}",
                o.column,
                if o.descending { "desc" } else { "asc" }
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Turns a non-2xx response into [`GatewayError::Rejected`].
async fn check(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or(body);

    Err(GatewayError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn rows(response: Response) -> GatewayResult<Vec<Value>> {
    let response = check(response).await?;
    Ok(response.json::<Vec<Value>>().await?)
}

fn first(table: &str, id: &str, rows: Vec<Value>) -> GatewayResult<Value> {
    rows.into_iter()
        .next()
        .ok_or_else(|| GatewayError::not_found(table, id))
}

impl Gateway for RestGateway {
    async fn select(
        &self,
        table: &str,
        filter: Option<&Filter>,
        order: &[Order],
    ) -> GatewayResult<Vec<Value>> {
        let mut url = self.table_url(table)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            if !order.is_empty() {
                query.append_pair("order", &order_param(order));
            }
            if let Some(filter) = filter {
                query.append_pair(&filter.column, &format!("eq.{}", filter.value));
            }
        }

        tracing::debug!(table, "select");
        let response = self.authed(self.client.get(url)).send().await?;
        rows(response).await
    }

    async fn select_one(&self, table: &str, id: &str) -> GatewayResult<Value> {
        let mut url = self.row_url(table, id)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("limit", "1");

        let response = self.authed(self.client.get(url)).send().await?;
        first(table, id, rows(response).await?)
    }

    async fn insert(&self, table: &str, row: Value) -> GatewayResult<Value> {
        let url = self.table_url(table)?;
        let response = self
            .authed(self.client.post(url))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row)
            .send()
            .await?;

        first(table, "<new>", rows(response).await?)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> GatewayResult<Value> {
        let url = self.row_url(table, id)?;
        let response = self
            .authed(self.client.patch(url))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch)
            .send()
            .await?;

        first(table, id, rows(response).await?)
    }

    async fn delete(&self, table: &str, id: &str) -> GatewayResult<()> {
        let url = self.row_url(table, id)?;
        let response = self.authed(self.client.delete(url)).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn upsert(&self, table: &str, conflict_column: &str, row: Value) -> GatewayResult<Value> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("on_conflict", conflict_column);

        let response = self
            .authed(self.client.post(url))
            .header("Prefer", MERGE_DUPLICATES)
            .json(&row)
            .send()
            .await?;

        first(table, conflict_column, rows(response).await?)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> GatewayResult<String> {
        let url = self.url(&format!("/storage/v1/object/{}/{}", bucket, path))?;
        let response = self
            .authed(self.client.post(url))
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check(response).await?;

        Ok(self.public_url(bucket, path))
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        let mut url = self.url("/auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;

        Ok(Identity {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            access_token: token.access_token,
        })
    }

    async fn sign_out(&self, access_token: &str) -> GatewayResult<()> {
        let url = self.url("/auth/v1/logout")?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::RawQuery;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn stub_store() -> Router {
        Router::new()
            .route(
                "/rest/v1/projects",
                get(|RawQuery(query): RawQuery, headers: HeaderMap| async move {
                    let query = query.unwrap_or_default();
                    assert!(query.contains("order=created_at.desc"));
                    assert_eq!(headers.get("apikey").unwrap(), "anon-key");
                    Json(serde_json::json!([{ "id": "p1", "title": "Site" }]))
                })
                .post(|Json(row): Json<Value>| async move {
                    let mut row = row;
                    row["id"] = Value::from("p-new");
                    (StatusCode::CREATED, Json(Value::Array(vec![row])))
                })
                .patch(|| async { Json(serde_json::json!([])) }),
            )
            .route(
                "/rest/v1/services",
                get(|| async {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(serde_json::json!({ "message": "JWT expired" })),
                    )
                }),
            )
            .route(
                "/storage/v1/object/portfolio/about/1.png",
                post(|| async { Json(serde_json::json!({ "Key": "portfolio/about/1.png" })) }),
            )
    }

    #[test]
    fn test_order_param_joins_columns() {
        let order = [Order::asc("category"), Order::desc("name")];
        assert_eq!(order_param(&order), "category.asc,name.desc");
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(RestGateway::new("not a url", "key").is_err());
    }

    #[tokio::test]
    async fn test_select_sends_order_and_decodes_rows() {
        let base = serve(stub_store()).await;
        let gateway = RestGateway::new(&base, "anon-key").unwrap();

        let rows = gateway
            .select("projects", None, &[Order::desc("created_at")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "p1");
    }

    #[tokio::test]
    async fn test_insert_returns_representation() {
        let base = serve(stub_store()).await;
        let gateway = RestGateway::new(&base, "anon-key").unwrap();

        let row = gateway
            .insert("projects", serde_json::json!({ "title": "New" }))
            .await
            .unwrap();
        assert_eq!(row["id"], "p-new");
        assert_eq!(row["title"], "New");
    }

    #[tokio::test]
    async fn test_update_with_no_matching_row_is_not_found() {
        let base = serve(stub_store()).await;
        let gateway = RestGateway::new(&base, "anon-key").unwrap();

        let err = gateway
            .update("projects", "missing", serde_json::json!({ "title": "x" }))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rejection_carries_status_and_message() {
        let base = serve(stub_store()).await;
        let gateway = RestGateway::new(&base, "anon-key").unwrap();

        match gateway.select("services", None, &[]).await {
            Err(GatewayError::Rejected { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "JWT expired");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let base = serve(stub_store()).await;
        let gateway = RestGateway::new(&base, "anon-key").unwrap();

        let url = gateway
            .upload("portfolio", "about/1.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(
            url,
            format!("{}/storage/v1/object/public/portfolio/about/1.png", base)
        );
    }
}
