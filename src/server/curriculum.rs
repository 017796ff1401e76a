//! Handlers for the curriculum hierarchy: subjects, textbooks, units, lessons

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_id, AppState};
use crate::error::ApiResult;
use crate::types::{Lesson, Subject, Textbook, Unit};

// --- Request schemas ---

#[derive(Debug, Deserialize)]
pub struct SubjectCreate {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TextbookCreate {
    pub subject_id: Uuid,
    pub publisher: String,
    pub grade: i64,
    pub volume: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UnitCreate {
    pub textbook_id: Uuid,
    pub unit_number: i64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct LessonCreate {
    pub unit_id: Uuid,
    pub lesson_number: i64,
    pub title: String,
    #[serde(default)]
    pub page_start: Option<i64>,
    #[serde(default)]
    pub page_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TextbookFilter {
    #[serde(default)]
    pub subject_id: Option<Uuid>,
}

// --- Subjects ---

pub async fn list_subjects(State(state): State<AppState>) -> ApiResult<Json<Vec<Subject>>> {
    Ok(Json(state.store.list_subjects().await?))
}

pub async fn create_subject(
    State(state): State<AppState>,
    Json(req): Json<SubjectCreate>,
) -> ApiResult<(StatusCode, Json<Subject>)> {
    let subject = state.store.create_subject(&req.code, &req.name).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn delete_subject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_subject(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Textbooks ---

pub async fn list_textbooks(
    State(state): State<AppState>,
    Query(filter): Query<TextbookFilter>,
) -> ApiResult<Json<Vec<Textbook>>> {
    Ok(Json(state.store.list_textbooks(filter.subject_id).await?))
}

pub async fn create_textbook(
    State(state): State<AppState>,
    Json(req): Json<TextbookCreate>,
) -> ApiResult<(StatusCode, Json<Textbook>)> {
    let textbook = state
        .store
        .create_textbook(req.subject_id, &req.publisher, req.grade, req.volume, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(textbook)))
}

pub async fn get_textbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Textbook>> {
    Ok(Json(state.store.get_textbook(parse_id(&id)?).await?))
}

pub async fn delete_textbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_textbook(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Units ---

pub async fn list_units(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Unit>>> {
    Ok(Json(state.store.list_units(parse_id(&id)?).await?))
}

pub async fn create_unit(
    State(state): State<AppState>,
    Json(req): Json<UnitCreate>,
) -> ApiResult<(StatusCode, Json<Unit>)> {
    let unit = state
        .store
        .create_unit(req.textbook_id, req.unit_number, &req.title)
        .await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn delete_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_unit(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Lessons ---

pub async fn list_lessons(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Lesson>>> {
    Ok(Json(state.store.list_lessons(parse_id(&id)?).await?))
}

pub async fn create_lesson(
    State(state): State<AppState>,
    Json(req): Json<LessonCreate>,
) -> ApiResult<(StatusCode, Json<Lesson>)> {
    let lesson = state
        .store
        .create_lesson(
            req.unit_id,
            req.lesson_number,
            &req.title,
            req.page_start,
            req.page_end,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn get_lesson(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Lesson>> {
    Ok(Json(state.store.get_lesson(parse_id(&id)?).await?))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_lesson(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
