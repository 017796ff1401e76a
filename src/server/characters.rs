//! Handlers for the character/phrase registry, lesson content links, and
//! cumulative coverage queries

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{parse_id, AppState};
use crate::error::ApiResult;
use crate::types::{
    Character, CharacterDetail, CoverageCharacter, CoveragePhrase, LessonCharacter, LessonPhrase,
    Phrase, RequirementType,
};

// --- Request schemas ---

#[derive(Debug, Deserialize)]
pub struct CharacterUpsert {
    pub character: String,
    #[serde(default)]
    pub pinyin: String,
    #[serde(default)]
    pub standard_level: Option<i64>,
    #[serde(default)]
    pub cumulative_percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PhraseCreate {
    pub phrase: String,
    #[serde(default)]
    pub pinyin: String,
    #[serde(default)]
    pub meaning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CharacterAttach {
    pub character: String,
    pub requirement: String,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PhraseAttach {
    pub phrase: String,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CoverageQuery {
    #[serde(default)]
    pub up_to_lesson: Option<i64>,
}

// --- Characters ---

pub async fn list_characters(State(state): State<AppState>) -> ApiResult<Json<Vec<Character>>> {
    Ok(Json(state.store.list_characters().await?))
}

pub async fn upsert_character(
    State(state): State<AppState>,
    Json(req): Json<CharacterUpsert>,
) -> ApiResult<(StatusCode, Json<Character>)> {
    let character = state
        .store
        .upsert_character(
            &req.character,
            &req.pinyin,
            req.standard_level,
            req.cumulative_percent,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(character)))
}

pub async fn get_character(
    State(state): State<AppState>,
    Path(char): Path<String>,
) -> ApiResult<Json<CharacterDetail>> {
    Ok(Json(state.store.get_character(&char).await?))
}

pub async fn delete_character(
    State(state): State<AppState>,
    Path(char): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_character(&char).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn character_phrases(
    State(state): State<AppState>,
    Path(char): Path<String>,
) -> ApiResult<Json<Vec<Phrase>>> {
    Ok(Json(state.store.phrases_for_character(&char).await?))
}

// --- Phrases ---

pub async fn list_phrases(State(state): State<AppState>) -> ApiResult<Json<Vec<Phrase>>> {
    Ok(Json(state.store.list_phrases().await?))
}

pub async fn create_phrase(
    State(state): State<AppState>,
    Json(req): Json<PhraseCreate>,
) -> ApiResult<(StatusCode, Json<Phrase>)> {
    let phrase = state
        .store
        .create_phrase(&req.phrase, &req.pinyin, req.meaning.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(phrase)))
}

pub async fn get_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Phrase>> {
    Ok(Json(state.store.get_phrase(parse_id(&id)?).await?))
}

pub async fn delete_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_phrase(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Requirement types ---

pub async fn list_requirement_types(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RequirementType>>> {
    Ok(Json(state.store.list_requirement_types().await?))
}

// --- Lesson content links ---

pub async fn lesson_characters(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<LessonCharacter>>> {
    Ok(Json(state.store.lesson_characters(parse_id(&id)?).await?))
}

pub async fn attach_character(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CharacterAttach>,
) -> ApiResult<(StatusCode, Json<LessonCharacter>)> {
    let linked = state
        .store
        .attach_character_to_lesson(parse_id(&id)?, &req.character, &req.requirement, req.sort_order)
        .await?;
    Ok((StatusCode::CREATED, Json(linked)))
}

pub async fn lesson_phrases(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<LessonPhrase>>> {
    Ok(Json(state.store.lesson_phrases(parse_id(&id)?).await?))
}

pub async fn attach_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PhraseAttach>,
) -> ApiResult<(StatusCode, Json<LessonPhrase>)> {
    let linked = state
        .store
        .attach_phrase_to_lesson(parse_id(&id)?, &req.phrase, req.sort_order)
        .await?;
    Ok((StatusCode::CREATED, Json(linked)))
}

// --- Cumulative coverage ---

pub async fn textbook_characters(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CoverageQuery>,
) -> ApiResult<Json<Vec<CoverageCharacter>>> {
    Ok(Json(
        state
            .store
            .textbook_characters(parse_id(&id)?, query.up_to_lesson)
            .await?,
    ))
}

pub async fn textbook_phrases(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CoverageQuery>,
) -> ApiResult<Json<Vec<CoveragePhrase>>> {
    Ok(Json(
        state
            .store
            .textbook_phrases(parse_id(&id)?, query.up_to_lesson)
            .await?,
    ))
}
