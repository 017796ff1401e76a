//! HTTP server: router assembly and startup

pub mod characters;
pub mod curriculum;
pub mod import;
pub mod learners;

use anyhow::{Context, Result};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::store::Store;

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
}

/// Parse an opaque id from a path segment
pub(crate) fn parse_id(value: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| ApiError::Validation(format!("malformed id '{value}'")))
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Curriculum hierarchy
        .route(
            "/subjects",
            get(curriculum::list_subjects).post(curriculum::create_subject),
        )
        .route("/subjects/{id}", delete(curriculum::delete_subject))
        .route(
            "/textbooks",
            get(curriculum::list_textbooks).post(curriculum::create_textbook),
        )
        .route(
            "/textbooks/{id}",
            get(curriculum::get_textbook).delete(curriculum::delete_textbook),
        )
        .route("/textbooks/{id}/units", get(curriculum::list_units))
        .route("/units", post(curriculum::create_unit))
        .route("/units/{id}", delete(curriculum::delete_unit))
        .route("/units/{id}/lessons", get(curriculum::list_lessons))
        .route("/lessons", post(curriculum::create_lesson))
        .route(
            "/lessons/{id}",
            get(curriculum::get_lesson).delete(curriculum::delete_lesson),
        )
        // Registry and lesson content
        .route(
            "/characters",
            get(characters::list_characters).post(characters::upsert_character),
        )
        .route(
            "/characters/{char}",
            get(characters::get_character).delete(characters::delete_character),
        )
        .route("/characters/{char}/phrases", get(characters::character_phrases))
        .route(
            "/phrases",
            get(characters::list_phrases).post(characters::create_phrase),
        )
        .route(
            "/phrases/{id}",
            get(characters::get_phrase).delete(characters::delete_phrase),
        )
        .route("/requirement-types", get(characters::list_requirement_types))
        .route(
            "/lessons/{id}/characters",
            get(characters::lesson_characters).post(characters::attach_character),
        )
        .route(
            "/lessons/{id}/phrases",
            get(characters::lesson_phrases).post(characters::attach_phrase),
        )
        // Cumulative coverage
        .route(
            "/textbooks/{id}/characters",
            get(characters::textbook_characters),
        )
        .route("/textbooks/{id}/phrases", get(characters::textbook_phrases))
        // Learner activity
        .route(
            "/learners",
            get(learners::list_learners).post(learners::create_learner),
        )
        .route(
            "/learners/{id}",
            get(learners::get_learner)
                .put(learners::rename_learner)
                .delete(learners::delete_learner),
        )
        .route("/learners/{id}/sessions", get(learners::list_sessions))
        .route("/learners/{id}/progress", get(learners::progress_summary))
        .route(
            "/learners/{id}/progress/characters",
            get(learners::progress_characters),
        )
        .route(
            "/learners/{id}/characters/{char}/history",
            get(learners::character_history),
        )
        .route("/test-sessions", post(learners::submit_session))
        .route("/test-sessions/{id}", delete(learners::delete_session))
        // Bulk import
        .route("/import/textbook", post(import::import_textbook))
        .route("/import/lesson", post(import::import_lesson))
        .route("/import/frequency", post(import::import_frequency));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

/// Liveness endpoint for the process supervisor
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy", "service": "knowledge-base"}))
}

/// Start the web server
pub async fn start(config: &Config) -> Result<()> {
    let store = Store::open(&config.database.path, config.database.busy_timeout_ms)
        .await
        .context("Failed to open store")?;
    let app = router(AppState { store });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     Knowledge Base Server Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("✓ Database: {}", config.database.path.display());
    println!("✓ Listening on http://{}", addr);
    println!();

    info!(%addr, database = %config.database.path.display(), "server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listen address")?;
    axum::serve(listener, app).await?;

    Ok(())
}
