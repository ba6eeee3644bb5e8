use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{GatewayAuth, GatewaySettings};

// ---------- errors ----------

#[derive(Debug)]
pub enum GatewayError {
    /// Could not reach the gateway, or the request timed out.
    Transport(String),
    /// Non-2xx HTTP status.
    Status { status: u16, body: String },
    /// The gateway answered with an `error` payload.
    Remote(String),
    Decode(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Transport(msg) => write!(f, "Gateway unreachable: {msg}"),
            GatewayError::Status { status, body } => {
                write!(f, "Gateway returned HTTP {status}: {body}")
            }
            GatewayError::Remote(msg) => write!(f, "Gateway query error: {msg}"),
            GatewayError::Decode(msg) => write!(f, "Unreadable gateway response: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

// ---------- result rows ----------

/// Tabular gateway answer. Rows are positional; `column_names` is kept for
/// diagnostics and name lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayRows {
    pub column_names: Vec<String>,
    pub data: Vec<Vec<Value>>,
}

impl GatewayRows {
    /// First column of every row, as strings. Non-string cells are skipped.
    pub fn first_column(&self) -> Vec<String> {
        self.data
            .iter()
            .filter_map(|row| row.first().and_then(cell_str))
            .collect()
    }
}

/// Text value of a cell. Numbers are rendered; null and empty strings are `None`.
pub fn cell_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn cell_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok())),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum GatewayResponse {
    Table {
        #[serde(default)]
        column_names: Vec<String>,
        #[serde(default)]
        data: Vec<Vec<Value>>,
    },
    Error {
        #[serde(default)]
        error_message: Option<String>,
    },
    Ok,
}

impl GatewayResponse {
    fn into_rows(self) -> Result<GatewayRows, GatewayError> {
        match self {
            GatewayResponse::Table { column_names, data } => Ok(GatewayRows { column_names, data }),
            GatewayResponse::Error { error_message } => Err(GatewayError::Remote(
                error_message.unwrap_or_else(|| "unknown error".to_string()),
            )),
            GatewayResponse::Ok => Ok(GatewayRows::default()),
        }
    }
}

// ---------- trait ----------

/// Executes one dialect-specific query against a datasource through the
/// query-federation service.
#[async_trait::async_trait]
pub trait QueryGateway: Send + Sync {
    /// `datasource` is the `{type, ...params}` object; it is sent verbatim on
    /// every call.
    async fn query(&self, sql: &str, datasource: &Value) -> Result<GatewayRows, GatewayError>;
}

// ---------- HTTP implementation ----------

pub struct HttpGateway {
    client: reqwest::Client,
    query_url: String,
    /// Computed once per instance; instances live for one sync run.
    auth_header: Option<String>,
}

impl HttpGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let auth_header = match &settings.auth {
            GatewayAuth::None => None,
            GatewayAuth::Bearer(token) => Some(format!("Bearer {token}")),
            GatewayAuth::Basic { username, password } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{username}:{password}"))
            )),
        };

        Ok(Self {
            client,
            query_url: format!("{}/query", settings.base_url.trim_end_matches('/')),
            auth_header,
        })
    }
}

#[async_trait::async_trait]
impl QueryGateway for HttpGateway {
    async fn query(&self, sql: &str, datasource: &Value) -> Result<GatewayRows, GatewayError> {
        let body = serde_json::json!({
            "query": sql,
            "context": { "datasource": datasource },
        });

        let mut request = self.client.post(&self.query_url).json(&body);
        if let Some(ref header) = self.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, header);
        }

        tracing::debug!(query = %sql, "gateway query");

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GatewayResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        parsed.into_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/sql")
    }

    fn settings(base_url: String, auth: GatewayAuth) -> GatewaySettings {
        GatewaySettings {
            base_url,
            auth,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_query_posts_sql_and_datasource() {
        let router = Router::new().route(
            "/api/sql/query",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(serde_json::json!({
                    "type": "table",
                    "column_names": ["query", "ds_type", "auth"],
                    "data": [[body["query"], body["context"]["datasource"]["type"], auth]],
                }))
            }),
        );
        let base = serve(router).await;

        let gateway =
            HttpGateway::new(&settings(base, GatewayAuth::Bearer("tok".to_string()))).unwrap();
        let rows = gateway
            .query("SHOW DATABASES", &serde_json::json!({"type": "mysql", "host": "h"}))
            .await
            .unwrap();

        assert_eq!(rows.column_names, vec!["query", "ds_type", "auth"]);
        assert_eq!(rows.data[0][0], "SHOW DATABASES");
        assert_eq!(rows.data[0][1], "mysql");
        assert_eq!(rows.data[0][2], "Bearer tok");
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let router = Router::new().route(
            "/api/sql/query",
            post(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(serde_json::json!({"type": "table", "column_names": ["a"], "data": [[auth]]}))
            }),
        );
        let base = serve(router).await;

        let gateway = HttpGateway::new(&settings(
            base,
            GatewayAuth::Basic {
                username: "mindsdb".to_string(),
                password: "pw".to_string(),
            },
        ))
        .unwrap();
        let rows = gateway.query("SELECT 1", &serde_json::json!({})).await.unwrap();
        assert_eq!(rows.first_column(), vec![format!("Basic {}", STANDARD.encode("mindsdb:pw"))]);
    }

    #[tokio::test]
    async fn test_error_payload_is_remote_error() {
        let router = Router::new().route(
            "/api/sql/query",
            post(|| async {
                Json(serde_json::json!({"type": "error", "error_message": "Table 'x' doesn't exist"}))
            }),
        );
        let base = serve(router).await;

        let gateway = HttpGateway::new(&settings(base, GatewayAuth::None)).unwrap();
        let err = gateway.query("DESCRIBE x", &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::Remote(ref m) if m.contains("doesn't exist")), "got: {err}");
    }

    #[tokio::test]
    async fn test_server_error_is_status_error() {
        let router = Router::new().route(
            "/api/sql/query",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = serve(router).await;

        let gateway = HttpGateway::new(&settings(base, GatewayAuth::None)).unwrap();
        let err = gateway.query("SELECT 1", &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 502, .. }), "got: {err}");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway =
            HttpGateway::new(&settings(format!("http://{addr}"), GatewayAuth::None)).unwrap();
        let err = gateway.query("SELECT 1", &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)), "got: {err}");
    }

    #[test]
    fn test_cell_helpers() {
        assert_eq!(cell_str(&serde_json::json!("x")), Some("x".to_string()));
        assert_eq!(cell_str(&serde_json::json!("")), None);
        assert_eq!(cell_str(&Value::Null), None);
        assert_eq!(cell_str(&serde_json::json!(3)), Some("3".to_string()));
        assert_eq!(cell_i64(&serde_json::json!("42")), Some(42));
        assert_eq!(cell_i64(&serde_json::json!(7)), Some(7));
        assert_eq!(cell_i64(&Value::Null), None);
    }

    #[test]
    fn test_counts_beyond_i64_are_unknown() {
        assert_eq!(cell_i64(&serde_json::json!(u64::MAX)), None);
        assert_eq!(cell_i64(&serde_json::json!(i64::MAX as u64)), Some(i64::MAX));
    }
}
