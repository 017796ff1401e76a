//! SQLite-backed curriculum and progress store
//!
//! A single connection behind an async mutex; every mutating operation runs
//! inside one explicit transaction. Lock waits are bounded by the configured
//! busy timeout and surface as a retryable error.

pub mod coverage;
pub mod curriculum;
pub mod import;
pub mod progress;
pub mod registry;
pub mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::types::{Character, Learner, Lesson, Phrase, Subject, TestSession, Textbook, Unit};

/// Shared handle to the SQLite store
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) a store at the given path
    pub async fn open<P: AsRef<Path>>(path: P, busy_timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open(&path).context("Failed to open database")?;

        // WAL mode for concurrent readers; bounded waits on a locked store
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;

        schema::init(&conn)?;
        schema::seed_requirement_types(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store (used by tests)
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init(&conn)?;
        schema::seed_requirement_types(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Row counts for every table, for the `status` CLI command
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let conn = self.conn.lock().await;
        let mut counts = Vec::new();
        for table in [
            "subjects",
            "textbooks",
            "units",
            "lessons",
            "requirement_types",
            "characters",
            "character_lessons",
            "phrases",
            "phrase_characters",
            "phrase_lessons",
            "learners",
            "test_sessions",
            "test_results",
        ] {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            counts.push((table, count));
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// Column helpers and row mappers shared across store modules
// ---------------------------------------------------------------------------

pub(crate) fn uuid_field(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let value: String = row.get(idx)?;
    Uuid::parse_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_uuid_field(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let value: Option<String> = row.get(idx)?;
    match value {
        Some(s) => Uuid::parse_str(&s)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

pub(crate) fn ts_field(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) const SUBJECT_COLS: &str = "id, code, name";

pub(crate) fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: uuid_field(row, 0)?,
        code: row.get(1)?,
        name: row.get(2)?,
    })
}

pub(crate) const TEXTBOOK_COLS: &str =
    "id, subject_id, publisher, grade, volume, name, created_at";

pub(crate) fn textbook_from_row(row: &Row<'_>) -> rusqlite::Result<Textbook> {
    Ok(Textbook {
        id: uuid_field(row, 0)?,
        subject_id: uuid_field(row, 1)?,
        publisher: row.get(2)?,
        grade: row.get(3)?,
        volume: row.get(4)?,
        name: row.get(5)?,
        created_at: ts_field(row, 6)?,
    })
}

pub(crate) const UNIT_COLS: &str = "id, textbook_id, unit_number, title, created_at";

pub(crate) fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: uuid_field(row, 0)?,
        textbook_id: uuid_field(row, 1)?,
        unit_number: row.get(2)?,
        title: row.get(3)?,
        created_at: ts_field(row, 4)?,
    })
}

pub(crate) const LESSON_COLS: &str =
    "id, unit_id, lesson_number, title, page_start, page_end, created_at";

pub(crate) fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: uuid_field(row, 0)?,
        unit_id: uuid_field(row, 1)?,
        lesson_number: row.get(2)?,
        title: row.get(3)?,
        page_start: row.get(4)?,
        page_end: row.get(5)?,
        created_at: ts_field(row, 6)?,
    })
}

pub(crate) const CHARACTER_COLS: &str =
    "character, pinyin, standard_level, cumulative_percent, created_at";

pub(crate) fn character_from_row(row: &Row<'_>) -> rusqlite::Result<Character> {
    Ok(Character {
        character: row.get(0)?,
        pinyin: row.get(1)?,
        standard_level: row.get(2)?,
        cumulative_percent: row.get(3)?,
        created_at: ts_field(row, 4)?,
    })
}

pub(crate) const PHRASE_COLS: &str = "id, phrase, pinyin, meaning, created_at";

pub(crate) fn phrase_from_row(row: &Row<'_>) -> rusqlite::Result<Phrase> {
    Ok(Phrase {
        id: uuid_field(row, 0)?,
        phrase: row.get(1)?,
        pinyin: row.get(2)?,
        meaning: row.get(3)?,
        created_at: ts_field(row, 4)?,
    })
}

pub(crate) const LEARNER_COLS: &str = "id, name, created_at";

pub(crate) fn learner_from_row(row: &Row<'_>) -> rusqlite::Result<Learner> {
    Ok(Learner {
        id: uuid_field(row, 0)?,
        name: row.get(1)?,
        created_at: ts_field(row, 2)?,
    })
}

pub(crate) const SESSION_COLS: &str = "id, learner_id, lesson_id, title, notes, tested_at";

pub(crate) fn session_from_row(row: &Row<'_>) -> rusqlite::Result<TestSession> {
    Ok(TestSession {
        id: uuid_field(row, 0)?,
        learner_id: uuid_field(row, 1)?,
        lesson_id: opt_uuid_field(row, 2)?,
        title: row.get(3)?,
        notes: row.get(4)?,
        tested_at: ts_field(row, 5)?,
    })
}

/// Serialize a timestamp with fixed fractional precision so the TEXT
/// column sorts chronologically.
pub(crate) fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// True when the value is a single Unicode character
pub(crate) fn is_single_character(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some() && chars.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_seeds_requirements() {
        let store = Store::open_in_memory().await.unwrap();
        let types = store.list_requirement_types().await.unwrap();
        let codes: Vec<&str> = types.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["recognize", "read", "write", "recite"]);
    }

    #[tokio::test]
    async fn test_table_counts_empty() {
        let store = Store::open_in_memory().await.unwrap();
        let counts = store.table_counts().await.unwrap();
        let requirement_count = counts
            .iter()
            .find(|(t, _)| *t == "requirement_types")
            .unwrap()
            .1;
        assert_eq!(requirement_count, 4);
        let subject_count = counts.iter().find(|(t, _)| *t == "subjects").unwrap().1;
        assert_eq!(subject_count, 0);
    }

    #[test]
    fn test_is_single_character() {
        assert!(is_single_character("天"));
        assert!(is_single_character("a"));
        assert!(!is_single_character(""));
        assert!(!is_single_character("天地"));
    }
}
