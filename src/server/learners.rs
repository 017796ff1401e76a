//! Handlers for learner management, test sessions, and progress reporting

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{parse_id, AppState};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    AttemptRecord, CharacterStatus, Learner, ProgressSummary, Skill, TestSession,
    TestSessionSubmit,
};

// --- Request schemas ---

#[derive(Debug, Deserialize)]
pub struct LearnerCreate {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressFilter {
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// --- Learners ---

pub async fn list_learners(State(state): State<AppState>) -> ApiResult<Json<Vec<Learner>>> {
    Ok(Json(state.store.list_learners().await?))
}

pub async fn create_learner(
    State(state): State<AppState>,
    Json(req): Json<LearnerCreate>,
) -> ApiResult<(StatusCode, Json<Learner>)> {
    let learner = state.store.create_learner(&req.name).await?;
    Ok((StatusCode::CREATED, Json(learner)))
}

pub async fn get_learner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Learner>> {
    Ok(Json(state.store.get_learner(parse_id(&id)?).await?))
}

pub async fn rename_learner(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LearnerCreate>,
) -> ApiResult<Json<Learner>> {
    Ok(Json(
        state.store.rename_learner(parse_id(&id)?, &req.name).await?,
    ))
}

pub async fn delete_learner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_learner(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Test sessions ---

pub async fn submit_session(
    State(state): State<AppState>,
    Json(req): Json<TestSessionSubmit>,
) -> ApiResult<(StatusCode, Json<TestSession>)> {
    let session = state.store.submit_session(&req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_session(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TestSession>>> {
    Ok(Json(state.store.list_sessions(parse_id(&id)?).await?))
}

// --- Progress reporting ---

pub async fn progress_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressSummary>> {
    Ok(Json(state.store.progress_summary(parse_id(&id)?).await?))
}

pub async fn progress_characters(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(filter): Query<ProgressFilter>,
) -> ApiResult<Json<Vec<CharacterStatus>>> {
    let skill = match filter.skill.as_deref() {
        Some(value) => Some(Skill::parse(value).ok_or_else(|| {
            ApiError::Validation(format!("unknown skill '{value}' (expected read or write)"))
        })?),
        None => None,
    };
    let passed = match filter.status.as_deref() {
        Some("passed") => Some(true),
        Some("failed") => Some(false),
        Some(other) => {
            return Err(ApiError::Validation(format!(
                "unknown status '{other}' (expected passed or failed)"
            )));
        }
        None => None,
    };
    Ok(Json(
        state
            .store
            .progress_characters(parse_id(&id)?, skill, passed)
            .await?,
    ))
}

pub async fn character_history(
    State(state): State<AppState>,
    Path((id, char)): Path<(String, String)>,
) -> ApiResult<Json<Vec<AttemptRecord>>> {
    Ok(Json(
        state.store.character_history(parse_id(&id)?, &char).await?,
    ))
}
