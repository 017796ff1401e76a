//! Curriculum hierarchy: subjects, textbooks, units, lessons
//!
//! Deletes run an explicit bottom-up deletion plan inside one transaction
//! rather than relying on database-level cascade triggers.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    lesson_from_row, subject_from_row, textbook_from_row, unit_from_row, Store, LESSON_COLS,
    SUBJECT_COLS, TEXTBOOK_COLS, UNIT_COLS,
};
use crate::error::{ApiError, ApiResult};
use crate::types::{Lesson, Subject, Textbook, Unit};

impl Store {
    // --- Subjects ---

    pub async fn list_subjects(&self) -> ApiResult<Vec<Subject>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare(&format!("SELECT {SUBJECT_COLS} FROM subjects ORDER BY name"))?;
        let subjects = stmt
            .query_map([], subject_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subjects)
    }

    pub async fn create_subject(&self, code: &str, name: &str) -> ApiResult<Subject> {
        if code.trim().is_empty() || name.trim().is_empty() {
            return Err(ApiError::Validation(
                "subject code and name must be non-empty".to_string(),
            ));
        }
        let conn = self.conn.lock().await;
        if subject_code_exists(&conn, code)? {
            return Err(ApiError::Validation(format!(
                "subject '{code}' already exists"
            )));
        }
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO subjects (id, code, name) VALUES (?1, ?2, ?3)",
            params![id.to_string(), code, name],
        )?;
        Ok(Subject {
            id,
            code: code.to_string(),
            name: name.to_string(),
        })
    }

    pub async fn delete_subject(&self, id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "subjects", id)? {
            return Err(ApiError::NotFound(format!("subject {id} not found")));
        }
        let textbooks = child_ids(&tx, "SELECT id FROM textbooks WHERE subject_id = ?1", id)?;
        for textbook_id in &textbooks {
            delete_textbook_subtree(&tx, textbook_id)?;
        }
        tx.execute("DELETE FROM subjects WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        tracing::info!(subject_id = %id, textbooks = textbooks.len(), "deleted subject");
        Ok(())
    }

    // --- Textbooks ---

    pub async fn list_textbooks(&self, subject_id: Option<Uuid>) -> ApiResult<Vec<Textbook>> {
        let conn = self.conn.lock().await;
        let textbooks = match subject_id {
            Some(subject_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TEXTBOOK_COLS} FROM textbooks WHERE subject_id = ?1 \
                     ORDER BY grade, volume, rowid"
                ))?;
                let rows = stmt.query_map(params![subject_id.to_string()], textbook_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TEXTBOOK_COLS} FROM textbooks ORDER BY grade, volume, rowid"
                ))?;
                let rows = stmt.query_map([], textbook_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(textbooks)
    }

    pub async fn create_textbook(
        &self,
        subject_id: Uuid,
        publisher: &str,
        grade: i64,
        volume: i64,
        name: &str,
    ) -> ApiResult<Textbook> {
        validate_grade_volume(grade, volume)?;
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "subjects", subject_id)? {
            return Err(ApiError::NotFound(format!("subject {subject_id} not found")));
        }
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO textbooks (id, subject_id, publisher, grade, volume, name, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                subject_id.to_string(),
                publisher,
                grade,
                volume,
                name,
                super::fmt_ts(&created_at),
            ],
        )?;
        Ok(Textbook {
            id,
            subject_id,
            publisher: publisher.to_string(),
            grade,
            volume,
            name: name.to_string(),
            created_at,
        })
    }

    pub async fn get_textbook(&self, id: Uuid) -> ApiResult<Textbook> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {TEXTBOOK_COLS} FROM textbooks WHERE id = ?1"),
            params![id.to_string()],
            textbook_from_row,
        )
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("textbook {id} not found")))
    }

    pub async fn delete_textbook(&self, id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "textbooks", id)? {
            return Err(ApiError::NotFound(format!("textbook {id} not found")));
        }
        delete_textbook_subtree(&tx, &id.to_string())?;
        tx.commit()?;
        tracing::info!(textbook_id = %id, "deleted textbook");
        Ok(())
    }

    // --- Units ---

    pub async fn list_units(&self, textbook_id: Uuid) -> ApiResult<Vec<Unit>> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "textbooks", textbook_id)? {
            return Err(ApiError::NotFound(format!("textbook {textbook_id} not found")));
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT {UNIT_COLS} FROM units WHERE textbook_id = ?1 ORDER BY unit_number, rowid"
        ))?;
        let units = stmt
            .query_map(params![textbook_id.to_string()], unit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(units)
    }

    pub async fn create_unit(
        &self,
        textbook_id: Uuid,
        unit_number: i64,
        title: &str,
    ) -> ApiResult<Unit> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "textbooks", textbook_id)? {
            return Err(ApiError::NotFound(format!("textbook {textbook_id} not found")));
        }
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO units (id, textbook_id, unit_number, title, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                textbook_id.to_string(),
                unit_number,
                title,
                super::fmt_ts(&created_at),
            ],
        )?;
        Ok(Unit {
            id,
            textbook_id,
            unit_number,
            title: title.to_string(),
            created_at,
        })
    }

    pub async fn delete_unit(&self, id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "units", id)? {
            return Err(ApiError::NotFound(format!("unit {id} not found")));
        }
        delete_unit_subtree(&tx, &id.to_string())?;
        tx.commit()?;
        Ok(())
    }

    // --- Lessons ---

    pub async fn list_lessons(&self, unit_id: Uuid) -> ApiResult<Vec<Lesson>> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "units", unit_id)? {
            return Err(ApiError::NotFound(format!("unit {unit_id} not found")));
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT {LESSON_COLS} FROM lessons WHERE unit_id = ?1 ORDER BY lesson_number, rowid"
        ))?;
        let lessons = stmt
            .query_map(params![unit_id.to_string()], lesson_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lessons)
    }

    pub async fn create_lesson(
        &self,
        unit_id: Uuid,
        lesson_number: i64,
        title: &str,
        page_start: Option<i64>,
        page_end: Option<i64>,
    ) -> ApiResult<Lesson> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "units", unit_id)? {
            return Err(ApiError::NotFound(format!("unit {unit_id} not found")));
        }
        let duplicate: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM lessons WHERE unit_id = ?1 AND lesson_number = ?2",
                params![unit_id.to_string(), lesson_number],
                |row| row.get(0),
            )
            .optional()?;
        if duplicate.is_some() {
            return Err(ApiError::Validation(format!(
                "lesson_number {lesson_number} already used in unit {unit_id}"
            )));
        }
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO lessons (id, unit_id, lesson_number, title, page_start, page_end, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                unit_id.to_string(),
                lesson_number,
                title,
                page_start,
                page_end,
                super::fmt_ts(&created_at),
            ],
        )?;
        Ok(Lesson {
            id,
            unit_id,
            lesson_number,
            title: title.to_string(),
            page_start,
            page_end,
            created_at,
        })
    }

    pub async fn get_lesson(&self, id: Uuid) -> ApiResult<Lesson> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {LESSON_COLS} FROM lessons WHERE id = ?1"),
            params![id.to_string()],
            lesson_from_row,
        )
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("lesson {id} not found")))
    }

    pub async fn delete_lesson(&self, id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "lessons", id)? {
            return Err(ApiError::NotFound(format!("lesson {id} not found")));
        }
        delete_lesson_rows(&tx, &id.to_string())?;
        tx.commit()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bottom-up deletion plan
// ---------------------------------------------------------------------------

pub(crate) fn validate_grade_volume(grade: i64, volume: i64) -> Result<(), ApiError> {
    if !(1..=12).contains(&grade) {
        return Err(ApiError::Validation(format!(
            "grade must be between 1 and 12, got {grade}"
        )));
    }
    if volume != 1 && volume != 2 {
        return Err(ApiError::Validation(format!(
            "volume must be 1 or 2, got {volume}"
        )));
    }
    Ok(())
}

pub(crate) fn row_exists(conn: &Connection, table: &str, id: Uuid) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn subject_code_exists(conn: &Connection, code: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM subjects WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn child_ids(conn: &Connection, sql: &str, parent: Uuid) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params![parent.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Delete a lesson and every join-table row referencing it. Test sessions
/// keep their history but lose the lesson link.
fn delete_lesson_rows(conn: &Connection, lesson_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM character_lessons WHERE lesson_id = ?1",
        params![lesson_id],
    )?;
    conn.execute(
        "DELETE FROM phrase_lessons WHERE lesson_id = ?1",
        params![lesson_id],
    )?;
    conn.execute(
        "UPDATE test_sessions SET lesson_id = NULL WHERE lesson_id = ?1",
        params![lesson_id],
    )?;
    conn.execute("DELETE FROM lessons WHERE id = ?1", params![lesson_id])?;
    Ok(())
}

fn delete_unit_subtree(conn: &Connection, unit_id: &str) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("SELECT id FROM lessons WHERE unit_id = ?1")?;
    let lessons = stmt
        .query_map(params![unit_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for lesson_id in lessons {
        delete_lesson_rows(conn, &lesson_id)?;
    }
    conn.execute("DELETE FROM units WHERE id = ?1", params![unit_id])?;
    Ok(())
}

fn delete_textbook_subtree(conn: &Connection, textbook_id: &str) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("SELECT id FROM units WHERE textbook_id = ?1")?;
    let units = stmt
        .query_map(params![textbook_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for unit_id in units {
        delete_unit_subtree(conn, &unit_id)?;
    }
    conn.execute("DELETE FROM textbooks WHERE id = ?1", params![textbook_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_lesson() -> (Store, Uuid, Uuid, Uuid, Uuid) {
        let store = Store::open_in_memory().await.unwrap();
        let subject = store.create_subject("chinese", "语文").await.unwrap();
        let textbook = store
            .create_textbook(subject.id, "人教版", 1, 1, "一年级上册")
            .await
            .unwrap();
        let unit = store.create_unit(textbook.id, 1, "识字").await.unwrap();
        let lesson = store
            .create_lesson(unit.id, 1, "天地人", Some(4), Some(5))
            .await
            .unwrap();
        (store, subject.id, textbook.id, unit.id, lesson.id)
    }

    #[tokio::test]
    async fn test_create_hierarchy() {
        let (store, subject_id, textbook_id, unit_id, lesson_id) = store_with_lesson().await;
        assert_eq!(store.list_subjects().await.unwrap().len(), 1);
        assert_eq!(
            store.list_textbooks(Some(subject_id)).await.unwrap().len(),
            1
        );
        assert_eq!(store.list_units(textbook_id).await.unwrap().len(), 1);
        let lessons = store.list_lessons(unit_id).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].id, lesson_id);
        assert_eq!(lessons[0].page_start, Some(4));
    }

    #[tokio::test]
    async fn test_create_textbook_unknown_subject() {
        let store = Store::open_in_memory().await.unwrap();
        let err = store
            .create_textbook(Uuid::new_v4(), "人教版", 1, 1, "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_create_textbook_invalid_grade() {
        let store = Store::open_in_memory().await.unwrap();
        let subject = store.create_subject("chinese", "语文").await.unwrap();
        let err = store
            .create_textbook(subject.id, "人教版", 13, 1, "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = store
            .create_textbook(subject.id, "人教版", 1, 3, "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_duplicate_subject_code() {
        let store = Store::open_in_memory().await.unwrap();
        store.create_subject("chinese", "语文").await.unwrap();
        let err = store.create_subject("chinese", "again").await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_duplicate_lesson_number_rejected() {
        let (store, _, _, unit_id, _) = store_with_lesson().await;
        let err = store
            .create_lesson(unit_id, 1, "金木水火土", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_lessons_ordered_by_number() {
        let (store, _, _, unit_id, _) = store_with_lesson().await;
        store
            .create_lesson(unit_id, 3, "口耳目", None, None)
            .await
            .unwrap();
        store
            .create_lesson(unit_id, 2, "金木水火土", None, None)
            .await
            .unwrap();
        let numbers: Vec<i64> = store
            .list_lessons(unit_id)
            .await
            .unwrap()
            .iter()
            .map(|l| l.lesson_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_absent_is_not_found() {
        let store = Store::open_in_memory().await.unwrap();
        assert_eq!(
            store.delete_lesson(Uuid::new_v4()).await.unwrap_err().kind(),
            "not_found"
        );
        assert_eq!(
            store.delete_subject(Uuid::new_v4()).await.unwrap_err().kind(),
            "not_found"
        );
    }

    #[tokio::test]
    async fn test_subject_cascade_deletes_links() {
        let (store, subject_id, _, _, lesson_id) = store_with_lesson().await;
        store
            .attach_character_to_lesson(lesson_id, "天", "recognize", None)
            .await
            .unwrap_err(); // character not registered yet
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        store
            .attach_character_to_lesson(lesson_id, "天", "recognize", None)
            .await
            .unwrap();

        store.delete_subject(subject_id).await.unwrap();

        let counts = store.table_counts().await.unwrap();
        for table in ["textbooks", "units", "lessons", "character_lessons"] {
            let count = counts.iter().find(|(t, _)| *t == table).unwrap().1;
            assert_eq!(count, 0, "{table} not emptied");
        }
        // The shared registry survives the cascade
        let characters = store.list_characters().await.unwrap();
        assert_eq!(characters.len(), 1);
    }

    #[tokio::test]
    async fn test_lesson_cascade_detaches_sessions() {
        let (store, _, _, _, lesson_id) = store_with_lesson().await;
        store.upsert_character("天", "tiān", None, None).await.unwrap();
        let learner = store.create_learner("小明").await.unwrap();
        let session = store
            .submit_session(&crate::types::TestSessionSubmit {
                learner_id: learner.id,
                lesson_id: Some(lesson_id),
                title: None,
                notes: None,
                results: vec![],
            })
            .await
            .unwrap();

        store.delete_lesson(lesson_id).await.unwrap();

        let sessions = store.list_sessions(learner.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, session.id);
        assert_eq!(sessions[0].lesson_id, None);
    }
}
