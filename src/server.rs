//! HTTP query surface.
//!
//! A thin JSON controller over the search core: it parses raw query-string
//! parameters into a typed [`SearchRequest`], calls the core, and maps
//! outcomes onto responses.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/search` | `q`, `category`, `source`, `page`, `limit` |
//! | `GET` | `/api/skills/{*id}` | One record by id (ids contain `/`) |
//! | `GET` | `/api/stats` | Catalog statistics |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "skill not found: a/b/c" } }
//! ```
//!
//! Error codes: `not_found` (404), `search_failed` (500, or 503 when the
//! failure is retryable, e.g. a query timeout).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::{Config, SearchConfig};
use crate::error::Error;
use crate::models::CanonicalSkillRecord;
use crate::search::{self, SearchPage, SearchRequest};
use crate::stats::{self, Stats};
use crate::store::SkillStore;

#[derive(Clone)]
struct AppState {
    store: SkillStore,
    search: SearchConfig,
}

/// Build the application router over an open store.
pub fn router(store: SkillStore, search: SearchConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", get(handle_search))
        .route("/api/skills/{*id}", get(handle_get))
        .route("/api/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { store, search })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SkillStore::open(config).await?;
    let app = router(store, config.search.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        tracing::error!(error = %err, "request failed");
        let status = if err.is_retryable() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError {
            status,
            code: "search_failed".to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/search ============

/// Raw query-string parameters. Everything arrives as text and is parsed
/// leniently by [`SearchParams::into_request`].
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl SearchParams {
    /// Non-numeric or non-positive `page` becomes 1; `limit` falls back to
    /// the configured default and is capped at the configured maximum.
    pub fn into_request(self, config: &SearchConfig) -> SearchRequest {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p.min(i64::from(u32::MAX)) as u32)
            .unwrap_or(1);

        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .map(|l| l.clamp(1, i64::from(config.max_limit)) as u32)
            .unwrap_or(config.default_limit);

        SearchRequest {
            term: self.q,
            category: self.category,
            source: self.source,
            page,
            limit,
        }
        .normalized()
    }
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, AppError> {
    let request = params.into_request(&state.search);
    let page = search::search(&state.store, &request, state.search.timeout()).await?;
    Ok(Json(page))
}

// ============ GET /api/skills/{*id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CanonicalSkillRecord>, AppError> {
    match search::get_by_id(&state.store, &id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(not_found(format!("skill not found: {}", id))),
    }
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    Ok(Json(stats::collect(&state.store).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> SearchParams {
        SearchParams {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let r = params(None, None).into_request(&SearchConfig::default());
        assert_eq!(r.page, 1);
        assert_eq!(r.limit, 20);
    }

    #[test]
    fn test_bad_page_becomes_one() {
        let config = SearchConfig::default();
        assert_eq!(params(Some("abc"), None).into_request(&config).page, 1);
        assert_eq!(params(Some("-4"), None).into_request(&config).page, 1);
        assert_eq!(params(Some("0"), None).into_request(&config).page, 1);
        assert_eq!(params(Some(" 3 "), None).into_request(&config).page, 3);
    }

    #[test]
    fn test_limit_is_capped() {
        let config = SearchConfig::default();
        assert_eq!(params(None, Some("500")).into_request(&config).limit, 100);
        assert_eq!(params(None, Some("0")).into_request(&config).limit, 1);
        assert_eq!(params(None, Some("x")).into_request(&config).limit, 20);
    }

    #[test]
    fn test_not_found_status() {
        let response = not_found("skill not found: x").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_timeout_maps_to_service_unavailable() {
        let err: AppError = Error::Timeout(std::time::Duration::from_millis(1)).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "search_failed");

        let err: AppError = Error::EmptySnapshot.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
