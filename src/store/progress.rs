//! Learner activity tracking and mastery aggregation
//!
//! Test results are an append-only log. Mastery for a (learner, character,
//! skill) triple is decided by the most recent result alone; history is
//! never majority-voted.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use uuid::Uuid;

use super::curriculum::row_exists;
use super::{learner_from_row, session_from_row, Store, LEARNER_COLS, SESSION_COLS};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    AttemptRecord, CharacterStatus, Learner, ProgressSummary, Skill, SkillProgress, TestSession,
    TestSessionSubmit,
};

impl Store {
    // --- Learners ---

    pub async fn list_learners(&self) -> ApiResult<Vec<Learner>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare(&format!("SELECT {LEARNER_COLS} FROM learners ORDER BY name"))?;
        let learners = stmt
            .query_map([], learner_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(learners)
    }

    pub async fn create_learner(&self, name: &str) -> ApiResult<Learner> {
        if name.trim().is_empty() {
            return Err(ApiError::Validation(
                "learner name must be non-empty".to_string(),
            ));
        }
        let conn = self.conn.lock().await;
        if learner_name_exists(&conn, name, None)? {
            return Err(ApiError::Validation(format!(
                "learner '{name}' already exists"
            )));
        }
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO learners (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id.to_string(), name, super::fmt_ts(&created_at)],
        )?;
        Ok(Learner {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    pub async fn get_learner(&self, id: Uuid) -> ApiResult<Learner> {
        let conn = self.conn.lock().await;
        get_learner_row(&conn, id)
    }

    pub async fn rename_learner(&self, id: Uuid, name: &str) -> ApiResult<Learner> {
        if name.trim().is_empty() {
            return Err(ApiError::Validation(
                "learner name must be non-empty".to_string(),
            ));
        }
        let conn = self.conn.lock().await;
        let mut learner = get_learner_row(&conn, id)?;
        if learner_name_exists(&conn, name, Some(id))? {
            return Err(ApiError::Validation(format!(
                "learner '{name}' already exists"
            )));
        }
        conn.execute(
            "UPDATE learners SET name = ?1 WHERE id = ?2",
            params![name, id.to_string()],
        )?;
        learner.name = name.to_string();
        Ok(learner)
    }

    /// Remove a learner together with every session and result they own
    pub async fn delete_learner(&self, id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "learners", id)? {
            return Err(ApiError::NotFound(format!("learner {id} not found")));
        }
        tx.execute(
            "DELETE FROM test_results WHERE learner_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM test_sessions WHERE learner_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute("DELETE FROM learners WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        tracing::info!(learner_id = %id, "deleted learner");
        Ok(())
    }

    // --- Sessions ---

    /// Record a test session and its results batch in one transaction
    pub async fn submit_session(&self, req: &TestSessionSubmit) -> ApiResult<TestSession> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "learners", req.learner_id)? {
            return Err(ApiError::NotFound(format!(
                "learner {} not found",
                req.learner_id
            )));
        }
        if let Some(lesson_id) = req.lesson_id {
            if !row_exists(&tx, "lessons", lesson_id)? {
                return Err(ApiError::NotFound(format!("lesson {lesson_id} not found")));
            }
        }

        let id = Uuid::new_v4();
        let tested_at = Utc::now();
        tx.execute(
            "INSERT INTO test_sessions (id, learner_id, lesson_id, title, notes, tested_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                req.learner_id.to_string(),
                req.lesson_id.map(|l| l.to_string()),
                req.title,
                req.notes,
                super::fmt_ts(&tested_at),
            ],
        )?;

        for (i, entry) in req.results.iter().enumerate() {
            let skill = Skill::parse(&entry.skill).ok_or_else(|| {
                ApiError::Validation(format!(
                    "results[{i}]: unknown skill '{}' (expected read or write)",
                    entry.skill
                ))
            })?;
            let known: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM characters WHERE character = ?1",
                    params![entry.character],
                    |row| row.get(0),
                )
                .optional()?;
            if known.is_none() {
                return Err(ApiError::Validation(format!(
                    "results[{i}]: unknown character '{}'",
                    entry.character
                )));
            }
            tx.execute(
                "INSERT INTO test_results (session_id, learner_id, character, skill, passed, tested_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    req.learner_id.to_string(),
                    entry.character,
                    skill.as_str(),
                    entry.passed,
                    super::fmt_ts(&tested_at),
                ],
            )?;
        }
        tx.commit()?;
        tracing::info!(
            session_id = %id,
            learner_id = %req.learner_id,
            results = req.results.len(),
            "recorded test session"
        );

        Ok(TestSession {
            id,
            learner_id: req.learner_id,
            lesson_id: req.lesson_id,
            title: req.title.clone(),
            notes: req.notes.clone(),
            tested_at,
        })
    }

    pub async fn delete_session(&self, id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if !row_exists(&tx, "test_sessions", id)? {
            return Err(ApiError::NotFound(format!("test session {id} not found")));
        }
        tx.execute(
            "DELETE FROM test_results WHERE session_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM test_sessions WHERE id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub async fn list_sessions(&self, learner_id: Uuid) -> ApiResult<Vec<TestSession>> {
        let conn = self.conn.lock().await;
        get_learner_row(&conn, learner_id)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLS} FROM test_sessions WHERE learner_id = ?1 \
             ORDER BY tested_at DESC, rowid DESC"
        ))?;
        let sessions = stmt
            .query_map(params![learner_id.to_string()], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    // --- Progress reporting ---

    /// Overall mastery summary: only the latest result per (character,
    /// skill) counts.
    pub async fn progress_summary(&self, learner_id: Uuid) -> ApiResult<ProgressSummary> {
        let conn = self.conn.lock().await;
        let learner = get_learner_row(&conn, learner_id)?;

        let total_sessions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM test_sessions WHERE learner_id = ?1",
            params![learner_id.to_string()],
            |row| row.get(0),
        )?;

        let latest = latest_results(&conn, learner_id, None)?;

        let mut summary = ProgressSummary {
            learner_id,
            learner: learner.name,
            total_characters_tested: 0,
            total_sessions,
            read: SkillProgress::default(),
            write: SkillProgress::default(),
        };
        let mut characters = std::collections::HashSet::new();
        for ((character, skill), status) in &latest {
            characters.insert(character.clone());
            let bucket = match skill {
                Skill::Read => &mut summary.read,
                Skill::Write => &mut summary.write,
            };
            bucket.total += 1;
            if status.passed {
                bucket.mastered += 1;
            }
        }
        summary.total_characters_tested = characters.len() as i64;
        Ok(summary)
    }

    /// Latest per-character status, optionally filtered by skill and by
    /// passed/failed outcome.
    pub async fn progress_characters(
        &self,
        learner_id: Uuid,
        skill: Option<Skill>,
        passed: Option<bool>,
    ) -> ApiResult<Vec<CharacterStatus>> {
        let conn = self.conn.lock().await;
        get_learner_row(&conn, learner_id)?;

        let latest = latest_results(&conn, learner_id, skill)?;
        let mut statuses: Vec<CharacterStatus> = latest
            .into_values()
            .filter(|s| passed.map_or(true, |want| s.passed == want))
            .collect();
        statuses.sort_by(|a, b| {
            a.character
                .cmp(&b.character)
                .then_with(|| a.skill.cmp(&b.skill))
        });
        Ok(statuses)
    }

    /// Full chronological audit trail for one character, newest first
    pub async fn character_history(
        &self,
        learner_id: Uuid,
        character: &str,
    ) -> ApiResult<Vec<AttemptRecord>> {
        let conn = self.conn.lock().await;
        get_learner_row(&conn, learner_id)?;
        let mut stmt = conn.prepare(
            "SELECT r.session_id, s.title, r.skill, r.passed, r.tested_at \
             FROM test_results r \
             JOIN test_sessions s ON s.id = r.session_id \
             WHERE r.learner_id = ?1 AND r.character = ?2 \
             ORDER BY r.tested_at DESC, r.id DESC",
        )?;
        let attempts = stmt
            .query_map(params![learner_id.to_string(), character], |row| {
                Ok(AttemptRecord {
                    session_id: super::uuid_field(row, 0)?,
                    session_title: row.get(1)?,
                    skill: skill_field(row, 2)?,
                    passed: row.get(3)?,
                    tested_at: super::ts_field(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attempts)
    }
}

fn get_learner_row(conn: &Connection, id: Uuid) -> ApiResult<Learner> {
    conn.query_row(
        &format!("SELECT {LEARNER_COLS} FROM learners WHERE id = ?1"),
        params![id.to_string()],
        learner_from_row,
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound(format!("learner {id} not found")))
}

fn learner_name_exists(
    conn: &Connection,
    name: &str,
    exclude: Option<Uuid>,
) -> rusqlite::Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM learners WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match (found, exclude) {
        (Some(id), Some(exclude)) => id != exclude.to_string(),
        (Some(_), None) => true,
        (None, _) => false,
    })
}

fn skill_field(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Skill> {
    let value: String = row.get(idx)?;
    Skill::parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown skill '{value}'").into(),
        )
    })
}

/// Fold the result log into the latest outcome per (character, skill).
/// Rows arrive newest first, so the first row seen for a key wins; ties on
/// tested_at fall back to insertion order.
fn latest_results(
    conn: &Connection,
    learner_id: Uuid,
    skill: Option<Skill>,
) -> rusqlite::Result<HashMap<(String, Skill), CharacterStatus>> {
    let sql = match skill {
        Some(_) => {
            "SELECT character, skill, passed, tested_at FROM test_results \
             WHERE learner_id = ?1 AND skill = ?2 ORDER BY tested_at DESC, id DESC"
        }
        None => {
            "SELECT character, skill, passed, tested_at FROM test_results \
             WHERE learner_id = ?1 ORDER BY tested_at DESC, id DESC"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let mapper = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, Skill, bool, DateTime<Utc>)> {
        Ok((
            row.get(0)?,
            skill_field(row, 1)?,
            row.get(2)?,
            super::ts_field(row, 3)?,
        ))
    };
    let rows = match skill {
        Some(skill) => stmt
            .query_map(params![learner_id.to_string(), skill.as_str()], mapper)?
            .collect::<Result<Vec<_>, _>>()?,
        None => stmt
            .query_map(params![learner_id.to_string()], mapper)?
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mut latest = HashMap::new();
    for (character, skill, passed, tested_at) in rows {
        latest
            .entry((character.clone(), skill))
            .or_insert(CharacterStatus {
                character,
                skill,
                passed,
                tested_at,
            });
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TestResultEntry;

    fn entry(character: &str, skill: &str, passed: bool) -> TestResultEntry {
        TestResultEntry {
            character: character.to_string(),
            skill: skill.to_string(),
            passed,
        }
    }

    async fn store_with_learner() -> (Store, Uuid) {
        let store = Store::open_in_memory().await.unwrap();
        for (ch, py) in [("天", "tiān"), ("地", "dì"), ("人", "rén")] {
            store.upsert_character(ch, py, None, None).await.unwrap();
        }
        let learner = store.create_learner("小明").await.unwrap();
        (store, learner.id)
    }

    async fn submit(store: &Store, learner_id: Uuid, results: Vec<TestResultEntry>) {
        store
            .submit_session(&TestSessionSubmit {
                learner_id,
                lesson_id: None,
                title: Some("听写".to_string()),
                notes: None,
                results,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_progress_counts_latest_only() {
        let (store, learner_id) = store_with_learner().await;
        submit(
            &store,
            learner_id,
            vec![entry("天", "read", true), entry("天", "write", false)],
        )
        .await;

        let summary = store.progress_summary(learner_id).await.unwrap();
        assert_eq!(summary.total_characters_tested, 1);
        assert_eq!(summary.total_sessions, 1);
        assert_eq!(summary.read.mastered, 1);
        assert_eq!(summary.read.total, 1);
        assert_eq!(summary.write.mastered, 0);
        assert_eq!(summary.write.total, 1);
    }

    #[tokio::test]
    async fn test_mastery_flips_with_latest_result() {
        let (store, learner_id) = store_with_learner().await;
        submit(&store, learner_id, vec![entry("天", "write", false)]).await;
        submit(&store, learner_id, vec![entry("天", "write", true)]).await;

        let summary = store.progress_summary(learner_id).await.unwrap();
        assert_eq!(summary.write.mastered, 1);
        assert_eq!(summary.write.total, 1);

        // Pass then fail must flip back; no duplicate mastery rows
        submit(&store, learner_id, vec![entry("天", "write", false)]).await;
        let summary = store.progress_summary(learner_id).await.unwrap();
        assert_eq!(summary.write.mastered, 0);
        assert_eq!(summary.write.total, 1);
    }

    #[tokio::test]
    async fn test_failed_filter_uses_latest_status() {
        let (store, learner_id) = store_with_learner().await;
        submit(
            &store,
            learner_id,
            vec![entry("天", "write", false), entry("地", "write", true)],
        )
        .await;

        let failed = store
            .progress_characters(learner_id, Some(Skill::Write), Some(false))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].character, "天");

        submit(&store, learner_id, vec![entry("天", "write", true)]).await;
        let failed = store
            .progress_characters(learner_id, Some(Skill::Write), Some(false))
            .await
            .unwrap();
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn test_history_keeps_every_attempt() {
        let (store, learner_id) = store_with_learner().await;
        submit(&store, learner_id, vec![entry("天", "write", false)]).await;
        submit(&store, learner_id, vec![entry("天", "write", true)]).await;
        submit(&store, learner_id, vec![entry("天", "read", true)]).await;

        let history = store.character_history(learner_id, "天").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].skill, Skill::Read);
        assert_eq!(history[0].session_title.as_deref(), Some("听写"));
    }

    #[tokio::test]
    async fn test_submit_unknown_character_names_index() {
        let (store, learner_id) = store_with_learner().await;
        let err = store
            .submit_session(&TestSessionSubmit {
                learner_id,
                lesson_id: None,
                title: None,
                notes: None,
                results: vec![entry("天", "read", true), entry("龘", "read", true)],
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("results[1]"));

        // The whole batch rolled back, including the session row
        let sessions = store.list_sessions(learner_id).await.unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_submit_unknown_skill_rejected() {
        let (store, learner_id) = store_with_learner().await;
        let err = store
            .submit_session(&TestSessionSubmit {
                learner_id,
                lesson_id: None,
                title: None,
                notes: None,
                results: vec![entry("天", "recite", true)],
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("results[0]"));
    }

    #[tokio::test]
    async fn test_delete_session_cascades_results() {
        let (store, learner_id) = store_with_learner().await;
        submit(&store, learner_id, vec![entry("天", "read", true)]).await;
        let session_id = store.list_sessions(learner_id).await.unwrap()[0].id;

        store.delete_session(session_id).await.unwrap();

        let summary = store.progress_summary(learner_id).await.unwrap();
        assert_eq!(summary.total_characters_tested, 0);
        assert_eq!(summary.total_sessions, 0);
    }

    #[tokio::test]
    async fn test_delete_learner_cascades_activity() {
        let (store, learner_id) = store_with_learner().await;
        submit(&store, learner_id, vec![entry("天", "read", true)]).await;

        store.delete_learner(learner_id).await.unwrap();

        assert_eq!(
            store.get_learner(learner_id).await.unwrap_err().kind(),
            "not_found"
        );
        let counts = store.table_counts().await.unwrap();
        for table in ["test_sessions", "test_results"] {
            let count = counts.iter().find(|(t, _)| *t == table).unwrap().1;
            assert_eq!(count, 0, "{table} not emptied");
        }
    }

    #[tokio::test]
    async fn test_rename_learner_checks_uniqueness() {
        let (store, learner_id) = store_with_learner().await;
        store.create_learner("小红").await.unwrap();

        let err = store.rename_learner(learner_id, "小红").await.unwrap_err();
        assert_eq!(err.kind(), "validation");

        // Renaming to the current name is a no-op, not a conflict
        let renamed = store.rename_learner(learner_id, "小明").await.unwrap();
        assert_eq!(renamed.name, "小明");
    }
}
