use super::AppState;
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    cycle_number: i64,
    last_success_at: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let store = state.store.lock().await;
    let cycle_number = store.last_cycle_number()?;
    let last_success_at = store
        .get_sync_state("google_tasks")?
        .and_then(|s| s.last_success);
    Ok(Json(HealthResponse {
        status: "ok",
        cycle_number,
        last_success_at,
    }))
}

pub async fn inbox(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let store = state.store.lock().await;
    let items = store.list_open_resolution_queue()?;
    Ok(Json(serde_json::to_value(items).unwrap_or(Value::Null)))
}

pub async fn list_clients(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let store = state.store.lock().await;
    let clients = store.list_clients()?;
    Ok(Json(serde_json::to_value(clients).unwrap_or(Value::Null)))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let store = state.store.lock().await;
    let client = store.get_client(&id)?.ok_or(AppError::NotFound)?;
    let projects = store.list_projects_for_client(&id)?;
    let tasks = store.list_tasks_for_client(&id)?;
    Ok(Json(serde_json::json!({
        "client": client,
        "projects": projects,
        "tasks": tasks,
    })))
}

#[derive(Deserialize)]
pub struct InboxActionRequest {
    pub action: String,
    pub actor: Option<String>,
}

/// `id` may address either a `resolution_queue` item or a `pending_action`
/// — the inbox the UI renders is a merge of both (§6). Resolution-queue
/// items are tried first since `GET /api/v2/inbox` lists those.
pub async fn inbox_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<InboxActionRequest>,
) -> Result<StatusCode, AppError> {
    let store = state.store.lock().await;
    let now = chrono::Utc::now().to_rfc3339();
    let actor = body.actor.as_deref().unwrap_or("operator");

    if matches!(body.action.as_str(), "accept" | "dismiss") && store.get_resolution_queue_item(&id)?.is_some() {
        store.resolve_by_id(&id, &now, Some(actor))?;
        return Ok(StatusCode::NO_CONTENT);
    }

    match body.action.as_str() {
        "accept" => {
            store.decide_action(&id, "approved", actor, &now)?;
        }
        "dismiss" => {
            store.decide_action(&id, "rejected", actor, &now)?;
        }
        "snooze" => {
            store.decide_action(&id, "pending", actor, &now)?;
        }
        _ => return Err(AppError::Config(format!("unknown action '{}'", body.action))),
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Bearer-token gate for `/api/v2/intelligence/*`. When no token is
/// configured, the prefix is open (operator-only deployment, per §6).
pub fn check_intelligence_auth(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = &state.config.intelligence_token else {
        return Ok(());
    };
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

pub async fn intelligence_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    check_intelligence_auth(&state, &headers)?;
    let store = state.store.lock().await;
    let logs = store.list_recent_cycle_logs(10)?;
    Ok(Json(serde_json::to_value(logs).unwrap_or(Value::Null)))
}
