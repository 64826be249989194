//! Automation and history endpoints

use automation_engine::{AutomationError, CreateAutomationRequest, UpdateAutomationRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{ApiResponse, AppState};

/// Map engine errors onto HTTP status codes
fn status_for(error: &AutomationError) -> StatusCode {
    match error {
        AutomationError::NotFound(_) => StatusCode::NOT_FOUND,
        AutomationError::Disabled(_) | AutomationError::Duplicate(_) => StatusCode::CONFLICT,
        AutomationError::InvalidTrigger(_)
        | AutomationError::InvalidColor(_)
        | AutomationError::InvalidBrightness(_)
        | AutomationError::DeviceNotFound(_) => StatusCode::BAD_REQUEST,
        AutomationError::Io(_) | AutomationError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: AutomationError) -> (StatusCode, Json<ApiResponse>) {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("Automation request failed: {}", error);
    }
    (status, Json(ApiResponse::error(error.to_string())))
}

/// List all automations
pub async fn list_automations(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.engine.list().await))
}

/// Create an automation
pub async fn create_automation(
    State(state): State<AppState>,
    Json(req): Json<CreateAutomationRequest>,
) -> impl IntoResponse {
    match state.engine.create(req).await {
        Ok(automation) => (StatusCode::CREATED, Json(ApiResponse::success(automation))),
        Err(e) => error_response(e),
    }
}

/// Get an automation by ID
pub async fn get_automation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.engine.get(&id).await {
        Some(automation) => (StatusCode::OK, Json(ApiResponse::success(automation))),
        None => error_response(AutomationError::NotFound(id)),
    }
}

/// Update an automation
pub async fn update_automation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAutomationRequest>,
) -> impl IntoResponse {
    match state.engine.update(&id, req).await {
        Ok(automation) => (StatusCode::OK, Json(ApiResponse::success(automation))),
        Err(e) => error_response(e),
    }
}

/// Delete an automation
pub async fn delete_automation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.engine.delete(&id).await {
        Ok(automation) => (StatusCode::OK, Json(ApiResponse::success(automation))),
        Err(e) => error_response(e),
    }
}

/// Enable or disable an automation
pub async fn toggle_automation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.engine.toggle(&id).await {
        Ok(automation) => (StatusCode::OK, Json(ApiResponse::success(automation))),
        Err(e) => error_response(e),
    }
}

/// Run an automation now, ignoring its trigger
pub async fn run_automation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.engine.run_now(&id).await {
        Ok(record) => (StatusCode::OK, Json(ApiResponse::success(record))),
        Err(e) => error_response(e),
    }
}

/// Execution history of one automation
pub async fn automation_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.engine.get(&id).await.is_none() {
        return error_response(AutomationError::NotFound(id));
    }
    let records = state.engine.history_for(&id).await;
    (StatusCode::OK, Json(ApiResponse::success(records)))
}

/// Full execution history, newest first
pub async fn list_history(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.engine.history().await))
}

/// Clear the execution history
pub async fn clear_history(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.clear_history().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "cleared": true }))),
        ),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&AutomationError::NotFound("a1".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AutomationError::InvalidTrigger("hour".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AutomationError::Disabled("a1".into())),
            StatusCode::CONFLICT
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(
            status_for(&AutomationError::Io(io)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
