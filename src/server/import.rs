//! Handlers for bulk import

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::error::ApiResult;
use crate::types::{FrequencyImportRequest, LessonImportRequest, TextbookImportRequest};

pub async fn import_textbook(
    State(state): State<AppState>,
    Json(req): Json<TextbookImportRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let (textbook, stats) = state.store.import_textbook(&req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"status": "ok", "textbook": textbook, "stats": stats})),
    ))
}

pub async fn import_lesson(
    State(state): State<AppState>,
    Json(req): Json<LessonImportRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.store.import_lesson(&req).await?;
    Ok(Json(json!({"status": "ok", "stats": stats})))
}

pub async fn import_frequency(
    State(state): State<AppState>,
    Json(req): Json<FrequencyImportRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.store.import_frequency(&req).await?;
    Ok(Json(json!({"status": "ok", "stats": stats})))
}
