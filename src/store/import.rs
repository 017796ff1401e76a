//! Transactional bulk import
//!
//! Three shapes: a whole textbook, a single lesson's content, and corpus
//! frequency rankings. Each call is one transaction; any malformed record
//! rolls the whole call back, reported with its position in the input.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use uuid::Uuid;

use super::curriculum::{row_exists, validate_grade_volume};
use super::registry::{
    insert_phrase_with_decomposition, next_sort_order, requirement_by_code, upsert_character_row,
};
use super::{is_single_character, Store};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    CharacterImportEntry, FrequencyImportRequest, ImportStats, LessonImportRequest,
    PhraseImportEntry, TextbookImportRequest, Textbook,
};

impl Store {
    /// Import a textbook with its units, lessons, and per-lesson content in
    /// one transaction.
    pub async fn import_textbook(
        &self,
        req: &TextbookImportRequest,
    ) -> ApiResult<(Textbook, ImportStats)> {
        validate_grade_volume(req.grade, req.volume)?;

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "subjects", req.subject_id)? {
            return Err(ApiError::NotFound(format!(
                "subject {} not found",
                req.subject_id
            )));
        }

        let now = Utc::now();
        let textbook_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO textbooks (id, subject_id, publisher, grade, volume, name, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                textbook_id.to_string(),
                req.subject_id.to_string(),
                req.publisher,
                req.grade,
                req.volume,
                req.name,
                super::fmt_ts(&now),
            ],
        )?;

        let mut stats = ImportStats::default();
        for (ui, unit) in req.units.iter().enumerate() {
            let unit_id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO units (id, textbook_id, unit_number, title, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    unit_id.to_string(),
                    textbook_id.to_string(),
                    unit.unit_number,
                    unit.title,
                    super::fmt_ts(&now),
                ],
            )?;
            stats.units_created += 1;

            let mut seen_numbers = HashSet::new();
            for (li, lesson) in unit.lessons.iter().enumerate() {
                if !seen_numbers.insert(lesson.lesson_number) {
                    return Err(ApiError::Validation(format!(
                        "units[{ui}].lessons[{li}]: duplicate lesson_number {} in unit {}",
                        lesson.lesson_number, unit.unit_number
                    )));
                }
                let lesson_id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO lessons (id, unit_id, lesson_number, title, page_start, page_end, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        lesson_id.to_string(),
                        unit_id.to_string(),
                        lesson.lesson_number,
                        lesson.title,
                        lesson.page_start,
                        lesson.page_end,
                        super::fmt_ts(&now),
                    ],
                )?;
                stats.lessons_created += 1;

                import_lesson_content(
                    &tx,
                    lesson_id,
                    &lesson.characters,
                    &lesson.phrases,
                    &format!("units[{ui}].lessons[{li}]."),
                    &mut stats,
                )?;
            }
        }
        tx.commit()?;
        tracing::info!(
            textbook_id = %textbook_id,
            units = stats.units_created,
            lessons = stats.lessons_created,
            characters = stats.characters_created,
            phrases = stats.phrases_created,
            "imported textbook"
        );

        Ok((
            Textbook {
                id: textbook_id,
                subject_id: req.subject_id,
                publisher: req.publisher.clone(),
                grade: req.grade,
                volume: req.volume,
                name: req.name.clone(),
                created_at: now,
            },
            stats,
        ))
    }

    /// Import characters and phrases for an existing lesson. Repeating an
    /// import leaves existing links untouched.
    pub async fn import_lesson(&self, req: &LessonImportRequest) -> ApiResult<ImportStats> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "lessons", req.lesson_id)? {
            return Err(ApiError::NotFound(format!(
                "lesson {} not found",
                req.lesson_id
            )));
        }
        let mut stats = ImportStats::default();
        import_lesson_content(&tx, req.lesson_id, &req.characters, &req.phrases, "", &mut stats)?;
        tx.commit()?;
        tracing::info!(
            lesson_id = %req.lesson_id,
            character_links = stats.character_links_created,
            phrase_links = stats.phrase_links_created,
            "imported lesson content"
        );
        Ok(stats)
    }

    /// Import corpus frequency rankings. Frequency data may arrive before
    /// curriculum data, so unknown characters become minimal stubs.
    pub async fn import_frequency(&self, req: &FrequencyImportRequest) -> ApiResult<ImportStats> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let now = Utc::now();
        let mut stats = ImportStats::default();
        for (i, entry) in req.entries.iter().enumerate() {
            if !is_single_character(&entry.character) {
                return Err(ApiError::Validation(format!(
                    "entries[{i}]: '{}' is not a single character",
                    entry.character
                )));
            }
            let created = upsert_character_row(
                &tx,
                &entry.character,
                entry.pinyin.as_deref().unwrap_or(""),
                entry.standard_level,
                entry.cumulative_percent,
                now,
            )?;
            if created {
                stats.characters_created += 1;
            } else {
                stats.characters_updated += 1;
            }
        }
        tx.commit()?;
        tracing::info!(
            created = stats.characters_created,
            updated = stats.characters_updated,
            "imported frequency data"
        );
        Ok(stats)
    }
}

/// Shared body of the lesson-content import shapes. `ctx` prefixes error
/// positions so whole-textbook imports can name the nested record.
fn import_lesson_content(
    tx: &Connection,
    lesson_id: Uuid,
    characters: &[CharacterImportEntry],
    phrases: &[PhraseImportEntry],
    ctx: &str,
    stats: &mut ImportStats,
) -> ApiResult<()> {
    let now = Utc::now();

    let mut sort_order = next_sort_order(tx, "character_lessons", lesson_id)?;
    for (i, entry) in characters.iter().enumerate() {
        if !is_single_character(&entry.character) {
            return Err(ApiError::Validation(format!(
                "{ctx}characters[{i}]: '{}' is not a single character",
                entry.character
            )));
        }
        let (requirement_id, _) = match requirement_by_code(tx, &entry.requirement) {
            Ok(found) => found,
            Err(ApiError::Validation(_)) => {
                return Err(ApiError::Validation(format!(
                    "{ctx}characters[{i}]: unknown requirement code '{}'",
                    entry.requirement
                )));
            }
            Err(err) => return Err(err),
        };

        if upsert_character_row(tx, &entry.character, &entry.pinyin, None, None, now)? {
            stats.characters_created += 1;
        }

        let linked: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM character_lessons \
                 WHERE character = ?1 AND lesson_id = ?2 AND requirement_id = ?3",
                params![entry.character, lesson_id.to_string(), requirement_id],
                |row| row.get(0),
            )
            .optional()?;
        if linked.is_none() {
            tx.execute(
                "INSERT INTO character_lessons (character, lesson_id, requirement_id, sort_order) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.character,
                    lesson_id.to_string(),
                    requirement_id,
                    sort_order
                ],
            )?;
            sort_order += 1;
            stats.character_links_created += 1;
        }
    }

    let mut phrase_sort = next_sort_order(tx, "phrase_lessons", lesson_id)?;
    for (i, entry) in phrases.iter().enumerate() {
        if entry.phrase.is_empty() {
            return Err(ApiError::Validation(format!(
                "{ctx}phrases[{i}]: phrase must be non-empty"
            )));
        }
        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM phrases WHERE phrase = ?1",
                params![entry.phrase],
                |row| row.get(0),
            )
            .optional()?;
        let phrase_id = match existing {
            Some(id) => id,
            None => {
                let (id, stubs) = insert_phrase_with_decomposition(
                    tx,
                    &entry.phrase,
                    &entry.pinyin,
                    entry.meaning.as_deref(),
                    now,
                )?;
                stats.phrases_created += 1;
                stats.characters_created += stubs;
                id.to_string()
            }
        };

        let linked: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM phrase_lessons WHERE phrase_id = ?1 AND lesson_id = ?2",
                params![phrase_id, lesson_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if linked.is_none() {
            tx.execute(
                "INSERT INTO phrase_lessons (phrase_id, lesson_id, sort_order) VALUES (?1, ?2, ?3)",
                params![phrase_id, lesson_id.to_string(), phrase_sort],
            )?;
            phrase_sort += 1;
            stats.phrase_links_created += 1;
        }
    }

    Ok(())
}
