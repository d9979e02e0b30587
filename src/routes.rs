use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::catalog;
use crate::config::DataPaths;
use crate::error::AppResult;
use crate::models::{
    Catalog, SessionRecord, GUEST_USER, Summary, SummaryFilter, SummaryParams, UserSummary,
};
use crate::projections;
use crate::results_log;

/// Handlers only share file locations; all data is re-read per request
#[derive(Clone)]
pub struct AppState {
    paths: Arc<DataPaths>,
}

impl AppState {
    pub fn new(paths: DataPaths) -> Self {
        Self {
            paths: Arc::new(paths),
        }
    }

    /// Fresh catalog and session log.
    fn load(&self) -> (Catalog, Vec<SessionRecord>) {
        (
            catalog::load(&self.paths.catalog),
            results_log::read_sessions(&self.paths.results_log),
        )
    }
}

pub fn router(state: AppState, cors: bool) -> Router {
    let paths = state.paths.clone();

    let router = Router::new()
        .route_service("/", ServeFile::new(paths.index_page()))
        .route_service("/admin", ServeFile::new(paths.admin_page()))
        .route_service("/data/questions.json", ServeFile::new(&paths.catalog))
        .route("/health", get(health_check))
        .route("/api/results", post(submit_results))
        .route("/api/admin/users", get(admin_users))
        .route("/api/admin/summary", get(admin_summary))
        .route(
            "/.well-known/appspecific/com.chrome.devtools.json",
            get(devtools_stub),
        )
        .fallback_service(ServeDir::new(&paths.static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Store one finished session.
/// Bodies that are not a JSON object are stored as an empty record.
async fn submit_results(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Value>)> {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => map,
        _ => {
            if !body.is_empty() {
                tracing::warn!(bytes = body.len(), "submission is not a JSON object");
            }
            Map::new()
        }
    };
    let user = payload
        .get("user")
        .and_then(Value::as_str)
        .unwrap_or(GUEST_USER)
        .to_string();

    results_log::append_session(&state.paths.results_log, payload)?;
    tracing::info!(%user, "session recorded");

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ok": true }))))
}

async fn admin_users(State(state): State<AppState>) -> Json<Vec<UserSummary>> {
    let sessions = results_log::read_sessions(&state.paths.results_log);
    Json(projections::user_summaries(&sessions))
}

async fn admin_summary(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<Summary> {
    let (catalog, sessions) = state.load();
    let filter = SummaryFilter::from(SummaryParams::from_pairs(pairs));
    tracing::debug!(
        user = ?filter.user,
        unit = %filter.unit,
        query = %filter.query,
        sessions = sessions.len(),
        "building admin summary"
    );
    Json(projections::summarize(&sessions, &catalog, &filter))
}

/// Quiets Chrome DevTools probing
async fn devtools_stub() -> Json<Value> {
    Json(Value::Object(Map::new()))
}
