//! Character and phrase registry
//!
//! Characters and phrases are shared across the whole corpus rather than
//! owned by one lesson. Characters are keyed by their literal value and
//! written with upsert-by-natural-key semantics.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::curriculum::row_exists;
use super::{
    character_from_row, is_single_character, phrase_from_row, Store, CHARACTER_COLS, PHRASE_COLS,
};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    Character, CharacterDetail, CharacterLessonRef, LessonCharacter, LessonPhrase, Phrase,
    RequirementType,
};

impl Store {
    // --- Characters ---

    pub async fn list_characters(&self) -> ApiResult<Vec<Character>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHARACTER_COLS} FROM characters ORDER BY character"
        ))?;
        let characters = stmt
            .query_map([], character_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(characters)
    }

    /// Insert a character, or update its metadata when the literal value is
    /// already registered. Never duplicates.
    pub async fn upsert_character(
        &self,
        character: &str,
        pinyin: &str,
        standard_level: Option<i64>,
        cumulative_percent: Option<f64>,
    ) -> ApiResult<Character> {
        if !is_single_character(character) {
            return Err(ApiError::Validation(format!(
                "'{character}' is not a single character"
            )));
        }
        let conn = self.conn.lock().await;
        upsert_character_row(
            &conn,
            character,
            pinyin,
            standard_level,
            cumulative_percent,
            Utc::now(),
        )?;
        let row = conn.query_row(
            &format!("SELECT {CHARACTER_COLS} FROM characters WHERE character = ?1"),
            params![character],
            character_from_row,
        )?;
        Ok(row)
    }

    pub async fn get_character(&self, character: &str) -> ApiResult<CharacterDetail> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!("SELECT {CHARACTER_COLS} FROM characters WHERE character = ?1"),
                params![character],
                character_from_row,
            )
            .optional()?
            .ok_or_else(|| ApiError::NotFound(format!("character '{character}' not found")))?;

        let mut stmt = conn.prepare(
            "SELECT cl.lesson_id, l.title, rt.code, rt.label, cl.sort_order \
             FROM character_lessons cl \
             JOIN lessons l ON l.id = cl.lesson_id \
             JOIN requirement_types rt ON rt.id = cl.requirement_id \
             WHERE cl.character = ?1 \
             ORDER BY cl.sort_order",
        )?;
        let lessons = stmt
            .query_map(params![character], |row| {
                Ok(CharacterLessonRef {
                    lesson_id: super::uuid_field(row, 0)?,
                    lesson_title: row.get(1)?,
                    requirement: row.get(2)?,
                    requirement_label: row.get(3)?,
                    sort_order: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let phrases = phrases_containing(&conn, character)?;

        Ok(CharacterDetail {
            character: row,
            lessons,
            phrases,
        })
    }

    /// Delete a character together with its lesson links and phrase
    /// decomposition rows. Recorded test results block the delete: the
    /// activity log is removed only through learner/session deletion.
    pub async fn delete_character(&self, character: &str) -> ApiResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let found: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM characters WHERE character = ?1",
                params![character],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(ApiError::NotFound(format!(
                "character '{character}' not found"
            )));
        }
        let results: i64 = tx.query_row(
            "SELECT COUNT(*) FROM test_results WHERE character = ?1",
            params![character],
            |row| row.get(0),
        )?;
        if results > 0 {
            return Err(ApiError::Validation(format!(
                "character '{character}' has {results} recorded test results"
            )));
        }
        tx.execute(
            "DELETE FROM character_lessons WHERE character = ?1",
            params![character],
        )?;
        tx.execute(
            "DELETE FROM phrase_characters WHERE character = ?1",
            params![character],
        )?;
        tx.execute(
            "DELETE FROM characters WHERE character = ?1",
            params![character],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Phrases whose decomposition contains the given character
    pub async fn phrases_for_character(&self, character: &str) -> ApiResult<Vec<Phrase>> {
        let conn = self.conn.lock().await;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM characters WHERE character = ?1",
                params![character],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(ApiError::NotFound(format!(
                "character '{character}' not found"
            )));
        }
        phrases_containing(&conn, character).map_err(ApiError::from)
    }

    // --- Phrases ---

    pub async fn list_phrases(&self) -> ApiResult<Vec<Phrase>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare(&format!("SELECT {PHRASE_COLS} FROM phrases ORDER BY phrase"))?;
        let phrases = stmt
            .query_map([], phrase_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(phrases)
    }

    /// Create a phrase and its ordered character decomposition. Unknown
    /// constituent characters are auto-registered as minimal stubs.
    pub async fn create_phrase(
        &self,
        phrase: &str,
        pinyin: &str,
        meaning: Option<&str>,
    ) -> ApiResult<Phrase> {
        if phrase.is_empty() {
            return Err(ApiError::Validation("phrase must be non-empty".to_string()));
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM phrases WHERE phrase = ?1",
                params![phrase],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(ApiError::Validation(format!(
                "phrase '{phrase}' already exists"
            )));
        }
        let now = Utc::now();
        let (id, _) = insert_phrase_with_decomposition(&tx, phrase, pinyin, meaning, now)?;
        tx.commit()?;
        Ok(Phrase {
            id,
            phrase: phrase.to_string(),
            pinyin: pinyin.to_string(),
            meaning: meaning.map(|m| m.to_string()),
            created_at: now,
        })
    }

    pub async fn get_phrase(&self, id: Uuid) -> ApiResult<Phrase> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {PHRASE_COLS} FROM phrases WHERE id = ?1"),
            params![id.to_string()],
            phrase_from_row,
        )
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("phrase {id} not found")))
    }

    pub async fn delete_phrase(&self, id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "phrases", id)? {
            return Err(ApiError::NotFound(format!("phrase {id} not found")));
        }
        tx.execute(
            "DELETE FROM phrase_characters WHERE phrase_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM phrase_lessons WHERE phrase_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute("DELETE FROM phrases WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    // --- Requirement types ---

    pub async fn list_requirement_types(&self) -> ApiResult<Vec<RequirementType>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT id, code, label FROM requirement_types ORDER BY id")?;
        let types = stmt
            .query_map([], |row| {
                Ok(RequirementType {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    label: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(types)
    }

    // --- Lesson content links ---

    pub async fn lesson_characters(&self, lesson_id: Uuid) -> ApiResult<Vec<LessonCharacter>> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "lessons", lesson_id)? {
            return Err(ApiError::NotFound(format!("lesson {lesson_id} not found")));
        }
        let mut stmt = conn.prepare(
            "SELECT c.character, c.pinyin, c.standard_level, c.cumulative_percent, c.created_at, \
                    rt.code, rt.label, cl.sort_order \
             FROM character_lessons cl \
             JOIN characters c ON c.character = cl.character \
             JOIN requirement_types rt ON rt.id = cl.requirement_id \
             WHERE cl.lesson_id = ?1 \
             ORDER BY cl.sort_order",
        )?;
        let characters = stmt
            .query_map(params![lesson_id.to_string()], |row| {
                Ok(LessonCharacter {
                    character: character_from_row(row)?,
                    requirement: row.get(5)?,
                    requirement_label: row.get(6)?,
                    sort_order: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(characters)
    }

    pub async fn attach_character_to_lesson(
        &self,
        lesson_id: Uuid,
        character: &str,
        requirement: &str,
        sort_order: Option<i64>,
    ) -> ApiResult<LessonCharacter> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "lessons", lesson_id)? {
            return Err(ApiError::NotFound(format!("lesson {lesson_id} not found")));
        }
        let char_row = tx
            .query_row(
                &format!("SELECT {CHARACTER_COLS} FROM characters WHERE character = ?1"),
                params![character],
                character_from_row,
            )
            .optional()?
            .ok_or_else(|| ApiError::NotFound(format!("character '{character}' not found")))?;
        let (requirement_id, requirement_label) = requirement_by_code(&tx, requirement)?;

        let duplicate: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM character_lessons \
                 WHERE character = ?1 AND lesson_id = ?2 AND requirement_id = ?3",
                params![character, lesson_id.to_string(), requirement_id],
                |row| row.get(0),
            )
            .optional()?;
        if duplicate.is_some() {
            return Err(ApiError::Validation(format!(
                "character '{character}' already linked to lesson {lesson_id} with requirement '{requirement}'"
            )));
        }

        let sort_order =
            resolve_sort_order(&tx, "character_lessons", lesson_id, sort_order)?;
        tx.execute(
            "INSERT INTO character_lessons (character, lesson_id, requirement_id, sort_order) \
             VALUES (?1, ?2, ?3, ?4)",
            params![character, lesson_id.to_string(), requirement_id, sort_order],
        )?;
        tx.commit()?;
        Ok(LessonCharacter {
            character: char_row,
            requirement: requirement.to_string(),
            requirement_label,
            sort_order,
        })
    }

    pub async fn lesson_phrases(&self, lesson_id: Uuid) -> ApiResult<Vec<LessonPhrase>> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "lessons", lesson_id)? {
            return Err(ApiError::NotFound(format!("lesson {lesson_id} not found")));
        }
        let mut stmt = conn.prepare(
            "SELECT p.id, p.phrase, p.pinyin, p.meaning, p.created_at, pl.sort_order \
             FROM phrase_lessons pl \
             JOIN phrases p ON p.id = pl.phrase_id \
             WHERE pl.lesson_id = ?1 \
             ORDER BY pl.sort_order",
        )?;
        let phrases = stmt
            .query_map(params![lesson_id.to_string()], |row| {
                Ok(LessonPhrase {
                    phrase: phrase_from_row(row)?,
                    sort_order: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(phrases)
    }

    pub async fn attach_phrase_to_lesson(
        &self,
        lesson_id: Uuid,
        phrase: &str,
        sort_order: Option<i64>,
    ) -> ApiResult<LessonPhrase> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "lessons", lesson_id)? {
            return Err(ApiError::NotFound(format!("lesson {lesson_id} not found")));
        }
        let phrase_row = tx
            .query_row(
                &format!("SELECT {PHRASE_COLS} FROM phrases WHERE phrase = ?1"),
                params![phrase],
                phrase_from_row,
            )
            .optional()?
            .ok_or_else(|| ApiError::NotFound(format!("phrase '{phrase}' not found")))?;

        let duplicate: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM phrase_lessons WHERE phrase_id = ?1 AND lesson_id = ?2",
                params![phrase_row.id.to_string(), lesson_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if duplicate.is_some() {
            return Err(ApiError::Validation(format!(
                "phrase '{phrase}' already linked to lesson {lesson_id}"
            )));
        }

        let sort_order = resolve_sort_order(&tx, "phrase_lessons", lesson_id, sort_order)?;
        tx.execute(
            "INSERT INTO phrase_lessons (phrase_id, lesson_id, sort_order) VALUES (?1, ?2, ?3)",
            params![phrase_row.id.to_string(), lesson_id.to_string(), sort_order],
        )?;
        tx.commit()?;
        Ok(LessonPhrase {
            phrase: phrase_row,
            sort_order,
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction-scoped helpers shared with bulk import
// ---------------------------------------------------------------------------

/// Upsert a character by its literal value. Existing pinyin survives an
/// empty incoming value; frequency fields only move from NULL.
pub(crate) fn upsert_character_row(
    conn: &Connection,
    character: &str,
    pinyin: &str,
    standard_level: Option<i64>,
    cumulative_percent: Option<f64>,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM characters WHERE character = ?1",
            params![character],
            |row| row.get(0),
        )
        .optional()?;
    conn.execute(
        "INSERT INTO characters (character, pinyin, standard_level, cumulative_percent, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(character) DO UPDATE SET \
             pinyin = CASE WHEN excluded.pinyin = '' THEN characters.pinyin ELSE excluded.pinyin END, \
             standard_level = COALESCE(excluded.standard_level, characters.standard_level), \
             cumulative_percent = COALESCE(excluded.cumulative_percent, characters.cumulative_percent)",
        params![
            character,
            pinyin,
            standard_level,
            cumulative_percent,
            super::fmt_ts(&now),
        ],
    )?;
    Ok(existing.is_none())
}

/// Register a stub character when the literal value is unknown. Returns
/// true when a row was created.
pub(crate) fn ensure_character_stub(
    conn: &Connection,
    character: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let created = conn.execute(
        "INSERT OR IGNORE INTO characters (character, pinyin, created_at) VALUES (?1, '', ?2)",
        params![character, super::fmt_ts(&now)],
    )?;
    Ok(created > 0)
}

/// Insert a phrase and its decomposition rows (positions contiguous from 0),
/// auto-registering stub characters. Returns the phrase id and how many
/// stubs were created.
pub(crate) fn insert_phrase_with_decomposition(
    conn: &Connection,
    phrase: &str,
    pinyin: &str,
    meaning: Option<&str>,
    now: DateTime<Utc>,
) -> rusqlite::Result<(Uuid, i64)> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO phrases (id, phrase, pinyin, meaning, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id.to_string(), phrase, pinyin, meaning, super::fmt_ts(&now)],
    )?;
    let mut stubs = 0;
    for (position, ch) in phrase.chars().enumerate() {
        let ch = ch.to_string();
        if ensure_character_stub(conn, &ch, now)? {
            stubs += 1;
        }
        conn.execute(
            "INSERT INTO phrase_characters (phrase_id, character, position) VALUES (?1, ?2, ?3)",
            params![id.to_string(), ch, position as i64],
        )?;
    }
    Ok((id, stubs))
}

/// Resolve a requirement code to (id, label); unknown codes are a
/// validation failure, the seeded set is closed.
pub(crate) fn requirement_by_code(
    conn: &Connection,
    code: &str,
) -> Result<(i64, String), ApiError> {
    conn.query_row(
        "SELECT id, label FROM requirement_types WHERE code = ?1",
        params![code],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )
    .optional()?
    .ok_or_else(|| ApiError::Validation(format!("unknown requirement code '{code}'")))
}

/// Pick the next free sort_order for a lesson, or validate an explicit one
fn resolve_sort_order(
    conn: &Connection,
    table: &str,
    lesson_id: Uuid,
    requested: Option<i64>,
) -> Result<i64, ApiError> {
    match requested {
        Some(sort_order) => {
            let taken: Option<i64> = conn
                .query_row(
                    &format!("SELECT 1 FROM {table} WHERE lesson_id = ?1 AND sort_order = ?2"),
                    params![lesson_id.to_string(), sort_order],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(ApiError::Validation(format!(
                    "sort_order {sort_order} already used in lesson {lesson_id}"
                )));
            }
            Ok(sort_order)
        }
        None => next_sort_order(conn, table, lesson_id).map_err(ApiError::from),
    }
}

pub(crate) fn next_sort_order(
    conn: &Connection,
    table: &str,
    lesson_id: Uuid,
) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COALESCE(MAX(sort_order), -1) + 1 FROM {table} WHERE lesson_id = ?1"),
        params![lesson_id.to_string()],
        |row| row.get(0),
    )
}

fn phrases_containing(conn: &Connection, character: &str) -> rusqlite::Result<Vec<Phrase>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT p.id, p.phrase, p.pinyin, p.meaning, p.created_at \
         FROM phrases p \
         JOIN phrase_characters pc ON pc.phrase_id = p.id \
         WHERE pc.character = ?1 \
         ORDER BY p.phrase",
    )?;
    let rows = stmt.query_map(params![character], phrase_from_row)?
        .collect::<Result<Vec<_>, _>>();
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_lesson() -> (Store, Uuid) {
        let store = Store::open_in_memory().await.unwrap();
        let subject = store.create_subject("chinese", "语文").await.unwrap();
        let textbook = store
            .create_textbook(subject.id, "人教版", 1, 1, "一年级上册")
            .await
            .unwrap();
        let unit = store.create_unit(textbook.id, 1, "识字").await.unwrap();
        let lesson = store
            .create_lesson(unit.id, 1, "天地人", None, None)
            .await
            .unwrap();
        (store, lesson.id)
    }

    #[tokio::test]
    async fn test_upsert_never_duplicates() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        let updated = store
            .upsert_character("天", "tiān", Some(1), Some(42.5))
            .await
            .unwrap();
        assert_eq!(updated.standard_level, Some(1));
        assert_eq!(updated.cumulative_percent, Some(42.5));
        assert_eq!(store.list_characters().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_keeps_pinyin_on_empty_update() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        let updated = store.upsert_character("天", "", Some(1), None).await.unwrap();
        assert_eq!(updated.pinyin, "tiān");
    }

    #[tokio::test]
    async fn test_upsert_rejects_multi_char() {
        let store = Store::open_in_memory().await.unwrap();
        let err = store
            .upsert_character("天地", "", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_phrase_decomposition_auto_registers_stubs() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_character("人", "rén", None, None).await.unwrap();
        store.create_phrase("人民", "rén mín", Some("people")).await.unwrap();

        // 民 was unknown and must now exist as a stub
        let min = store.get_character("民").await.unwrap();
        assert_eq!(min.character.pinyin, "");

        let phrases = store.phrases_for_character("民").await.unwrap();
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].phrase, "人民");
    }

    #[tokio::test]
    async fn test_duplicate_phrase_rejected() {
        let store = Store::open_in_memory().await.unwrap();
        store.create_phrase("天地", "tiān dì", None).await.unwrap();
        let err = store.create_phrase("天地", "", None).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_attach_character_validates_requirement() {
        let (store, lesson_id) = store_with_lesson().await;
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        let err = store
            .attach_character_to_lesson(lesson_id, "天", "memorize", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_attach_character_requires_both_rows() {
        let (store, lesson_id) = store_with_lesson().await;
        let err = store
            .attach_character_to_lesson(lesson_id, "天", "recognize", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        let err = store
            .attach_character_to_lesson(Uuid::new_v4(), "天", "recognize", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_sort_order_unique_within_lesson() {
        let (store, lesson_id) = store_with_lesson().await;
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        store.upsert_character("地", "dì", None, None).await.unwrap();
        store
            .attach_character_to_lesson(lesson_id, "天", "recognize", Some(0))
            .await
            .unwrap();
        let err = store
            .attach_character_to_lesson(lesson_id, "地", "recognize", Some(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        // Omitted sort_order picks the next free slot
        let linked = store
            .attach_character_to_lesson(lesson_id, "地", "recognize", None)
            .await
            .unwrap();
        assert_eq!(linked.sort_order, 1);
    }

    #[tokio::test]
    async fn test_duplicate_link_rejected() {
        let (store, lesson_id) = store_with_lesson().await;
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        store
            .attach_character_to_lesson(lesson_id, "天", "recognize", None)
            .await
            .unwrap();
        let err = store
            .attach_character_to_lesson(lesson_id, "天", "recognize", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_character_detail_lists_lessons_and_phrases() {
        let (store, lesson_id) = store_with_lesson().await;
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        store
            .attach_character_to_lesson(lesson_id, "天", "recognize", None)
            .await
            .unwrap();
        store.create_phrase("天地", "tiān dì", None).await.unwrap();

        let detail = store.get_character("天").await.unwrap();
        assert_eq!(detail.lessons.len(), 1);
        assert_eq!(detail.lessons[0].requirement, "recognize");
        assert_eq!(detail.lessons[0].requirement_label, "认识");
        assert_eq!(detail.phrases.len(), 1);
        assert_eq!(detail.phrases[0].phrase, "天地");
    }

    #[tokio::test]
    async fn test_delete_phrase_cascades_links() {
        let (store, lesson_id) = store_with_lesson().await;
        let phrase = store.create_phrase("天地", "tiān dì", None).await.unwrap();
        store
            .attach_phrase_to_lesson(lesson_id, "天地", None)
            .await
            .unwrap();

        store.delete_phrase(phrase.id).await.unwrap();

        assert!(store.lesson_phrases(lesson_id).await.unwrap().is_empty());
        // Stub characters from the decomposition stay registered
        assert_eq!(store.list_characters().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_character_blocked_by_results() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        let learner = store.create_learner("小明").await.unwrap();
        store
            .submit_session(&crate::types::TestSessionSubmit {
                learner_id: learner.id,
                lesson_id: None,
                title: None,
                notes: None,
                results: vec![crate::types::TestResultEntry {
                    character: "天".to_string(),
                    skill: "read".to_string(),
                    passed: true,
                }],
            })
            .await
            .unwrap();

        let err = store.delete_character("天").await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
