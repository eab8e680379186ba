use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Days, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use paisa_mail::{clean_body, DirSource, MailSource};
use paisa_storage::DbPool;

use crate::config::Config;
use crate::pipeline::{process_with_retry, Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub cancel: watch::Receiver<bool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/fetch-emails", post(fetch_emails))
        .route("/rules", get(list_rules))
        .route("/rules/test", post(test_rules))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Errors surface to callers as a generic message only; details go to the log.
fn internal(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    tracing::error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal error"})),
    )
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn status(State(state): State<AppState>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let stats = paisa_storage::stats(&state.pool).await.map_err(internal)?;
    Ok(Json(json!({ "store": stats })))
}

/// Pull new messages from the mail source and run the pipeline over them.
/// The response is the aggregate report plus a filter echo.
async fn fetch_emails(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let since = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(state.config.lookback_days))
        .unwrap_or_else(|| Utc::now().date_naive());

    // The source is scoped to this request and closed on every path.
    let mut source = DirSource::new(&state.config.mail_dir);
    let fetched = source.fetch(since, &state.config.keywords);
    let raw = match fetched {
        Ok(raw) => raw,
        Err(e) => {
            let _ = source.logout();
            return Err(internal(e));
        }
    };
    source.logout().map_err(internal)?;

    let report = process_with_retry(&state.pipeline, &raw, Some(&state.cancel))
        .await
        .map_err(internal)?;

    Ok(Json(json!({
        "report": report,
        "since": since.to_string(),
        "keywords": state.config.keywords,
        "message": "done",
    })))
}

async fn list_rules(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "rules": state.pipeline.rules().names() }))
}

#[derive(Debug, Deserialize)]
pub struct TestRuleRequest {
    pub body: String,
}

/// Run the selector against arbitrary text — the pattern-authoring debug
/// entry point.
async fn test_rules(
    State(state): State<AppState>,
    Json(req): Json<TestRuleRequest>,
) -> Json<Value> {
    match state.pipeline.rules().select(&clean_body(&req.body)) {
        Some(matched) => Json(json!({
            "matched": matched.rule.id(),
            "institution": matched.rule.institution(),
            "capture": matched.capture,
        })),
        None => Json(json!({ "matched": Value::Null })),
    }
}
