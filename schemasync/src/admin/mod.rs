use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::set_header::response::SetResponseHeaderLayer;

use crate::config::Settings;
use crate::crypto::SecretBox;
use crate::pipeline::SyncLocks;

pub mod catalog_handlers;
pub mod connection_handlers;
pub mod dto;
pub mod jwt;
pub mod sync_handlers;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
    pub secrets: SecretBox,
    /// Connections with a sync in flight.
    pub locks: SyncLocks,
}

impl AppState {
    pub fn new(db: DatabaseConnection, settings: Settings) -> Self {
        let secrets = SecretBox::new(settings.master_key);
        Self {
            db,
            settings: Arc::new(settings),
            secrets,
            locks: SyncLocks::new(),
        }
    }
}

// ---------- error type ----------

/// A JSON error response: `{"error": "..."}` with an HTTP status, plus an
/// optional `details` string.
#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        tracing::error!(error = %e, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg)
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => serde_json::json!({ "error": self.message, "details": details }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------- router ----------

pub fn app_router(state: AppState) -> Router {
    let allowed_origins: Vec<HeaderValue> = state
        .settings
        .cors_allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", api_v1())
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

fn api_v1() -> Router<AppState> {
    Router::new()
        // connection types
        .route(
            "/connection-types",
            get(connection_handlers::list_connection_types),
        )
        // connections
        .route(
            "/connections",
            get(connection_handlers::list_connections).post(connection_handlers::create_connection),
        )
        .route(
            "/connections/{id}",
            get(connection_handlers::get_connection)
                .put(connection_handlers::update_connection)
                .delete(connection_handlers::delete_connection),
        )
        .route(
            "/connections/{id}/test",
            post(connection_handlers::test_connection),
        )
        // sync
        .route("/connections/{id}/sync", post(sync_handlers::trigger_sync))
        .route("/connections/{id}/jobs", get(sync_handlers::list_jobs))
        .route("/jobs/{job_id}", get(sync_handlers::get_job))
        // catalog
        .route(
            "/connections/{id}/catalog",
            get(catalog_handlers::get_catalog),
        )
        .route(
            "/fields/{id}/semantics",
            put(catalog_handlers::update_semantics),
        )
        .route("/fields/{id}/history", get(catalog_handlers::field_history))
}
