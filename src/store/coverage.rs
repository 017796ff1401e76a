//! Cumulative coverage queries
//!
//! Computes the vocabulary a learner should have encountered up through a
//! given point in a textbook's lesson sequence: resolve the lessons ordered
//! by (unit_number, lesson_number), cut the prefix at the requested lesson
//! number, then union everything linked to any lesson in the prefix.

use rusqlite::{params, Connection};
use std::collections::HashSet;
use uuid::Uuid;

use super::curriculum::row_exists;
use super::{character_from_row, phrase_from_row, Store};
use crate::error::{ApiError, ApiResult};
use crate::types::{CoverageCharacter, CoveragePhrase};

impl Store {
    /// All characters introduced in a textbook, optionally limited to the
    /// lesson-sequence prefix ending at `up_to_lesson`. Each character
    /// appears once, annotated with its first introduction.
    pub async fn textbook_characters(
        &self,
        textbook_id: Uuid,
        up_to_lesson: Option<i64>,
    ) -> ApiResult<Vec<CoverageCharacter>> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "textbooks", textbook_id)? {
            return Err(ApiError::NotFound(format!("textbook {textbook_id} not found")));
        }
        let included = prefix_lesson_ids(&conn, textbook_id, up_to_lesson)?;

        let mut stmt = conn.prepare(
            "SELECT c.character, c.pinyin, c.standard_level, c.cumulative_percent, c.created_at, \
                    rt.code, rt.label, u.unit_number, u.title, l.lesson_number, l.title, l.id \
             FROM character_lessons cl \
             JOIN lessons l ON l.id = cl.lesson_id \
             JOIN units u ON u.id = l.unit_id \
             JOIN characters c ON c.character = cl.character \
             JOIN requirement_types rt ON rt.id = cl.requirement_id \
             WHERE u.textbook_id = ?1 \
             ORDER BY u.unit_number, l.lesson_number, l.rowid, cl.sort_order",
        )?;
        let rows = stmt
            .query_map(params![textbook_id.to_string()], |row| {
                Ok((
                    CoverageCharacter {
                        character: character_from_row(row)?,
                        requirement: row.get(5)?,
                        requirement_label: row.get(6)?,
                        unit_number: row.get(7)?,
                        unit_title: row.get(8)?,
                        lesson_number: row.get(9)?,
                        lesson_title: row.get(10)?,
                    },
                    row.get::<_, String>(11)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        // Union over the prefix, keeping the first appearance only
        let mut seen = HashSet::new();
        let mut characters = Vec::new();
        for (entry, lesson_id) in rows {
            if !included.contains(&lesson_id) {
                continue;
            }
            if seen.insert(entry.character.character.clone()) {
                characters.push(entry);
            }
        }
        Ok(characters)
    }

    /// All phrases introduced in a textbook, with the same prefix and
    /// deduplication rules as `textbook_characters`.
    pub async fn textbook_phrases(
        &self,
        textbook_id: Uuid,
        up_to_lesson: Option<i64>,
    ) -> ApiResult<Vec<CoveragePhrase>> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "textbooks", textbook_id)? {
            return Err(ApiError::NotFound(format!("textbook {textbook_id} not found")));
        }
        let included = prefix_lesson_ids(&conn, textbook_id, up_to_lesson)?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.phrase, p.pinyin, p.meaning, p.created_at, \
                    u.unit_number, u.title, l.lesson_number, l.title, l.id \
             FROM phrase_lessons pl \
             JOIN lessons l ON l.id = pl.lesson_id \
             JOIN units u ON u.id = l.unit_id \
             JOIN phrases p ON p.id = pl.phrase_id \
             WHERE u.textbook_id = ?1 \
             ORDER BY u.unit_number, l.lesson_number, l.rowid, pl.sort_order",
        )?;
        let rows = stmt
            .query_map(params![textbook_id.to_string()], |row| {
                Ok((
                    CoveragePhrase {
                        phrase: phrase_from_row(row)?,
                        unit_number: row.get(5)?,
                        unit_title: row.get(6)?,
                        lesson_number: row.get(7)?,
                        lesson_title: row.get(8)?,
                    },
                    row.get::<_, String>(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        let mut phrases = Vec::new();
        for (entry, lesson_id) in rows {
            if !included.contains(&lesson_id) {
                continue;
            }
            if seen.insert(entry.phrase.phrase.clone()) {
                phrases.push(entry);
            }
        }
        Ok(phrases)
    }
}

/// Resolve the set of lesson ids inside the coverage prefix. The ordering
/// key is (unit_number, lesson_number), ties broken by creation order; the
/// prefix ends at the last lesson whose lesson_number is within the bound.
fn prefix_lesson_ids(
    conn: &Connection,
    textbook_id: Uuid,
    up_to_lesson: Option<i64>,
) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.lesson_number \
         FROM lessons l \
         JOIN units u ON u.id = l.unit_id \
         WHERE u.textbook_id = ?1 \
         ORDER BY u.unit_number, l.lesson_number, l.rowid",
    )?;
    let ordered = stmt
        .query_map(params![textbook_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let cutoff = match up_to_lesson {
        Some(n) => match ordered
            .iter()
            .rposition(|(_, lesson_number)| *lesson_number <= n)
        {
            Some(idx) => idx + 1,
            None => 0,
        },
        None => ordered.len(),
    };

    Ok(ordered
        .into_iter()
        .take(cutoff)
        .map(|(id, _)| id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CharacterImportEntry, LessonImport, PhraseImportEntry, TextbookImportRequest, UnitImport};

    fn lesson(number: i64, title: &str, chars: &[&str], phrases: &[&str]) -> LessonImport {
        LessonImport {
            lesson_number: number,
            title: title.to_string(),
            page_start: None,
            page_end: None,
            characters: chars
                .iter()
                .map(|c| CharacterImportEntry {
                    character: c.to_string(),
                    pinyin: String::new(),
                    requirement: "recognize".to_string(),
                })
                .collect(),
            phrases: phrases
                .iter()
                .map(|p| PhraseImportEntry {
                    phrase: p.to_string(),
                    pinyin: String::new(),
                    meaning: None,
                })
                .collect(),
        }
    }

    async fn seeded_textbook(store: &Store) -> Uuid {
        let subject = store.create_subject("chinese", "语文").await.unwrap();
        let (textbook, _) = store
            .import_textbook(&TextbookImportRequest {
                subject_id: subject.id,
                publisher: "人教版".to_string(),
                grade: 1,
                volume: 1,
                name: "一年级上册".to_string(),
                units: vec![
                    UnitImport {
                        unit_number: 1,
                        title: "识字".to_string(),
                        lessons: vec![
                            lesson(1, "天地人", &["天", "地", "人"], &["天地", "人民"]),
                            lesson(2, "金木水火土", &["金", "木", "水"], &["水土"]),
                        ],
                    },
                    UnitImport {
                        unit_number: 2,
                        title: "课文".to_string(),
                        lessons: vec![lesson(3, "秋天", &["秋", "天"], &["秋天"])],
                    },
                ],
            })
            .await
            .unwrap();
        textbook.id
    }

    #[tokio::test]
    async fn test_first_lesson_coverage() {
        let store = Store::open_in_memory().await.unwrap();
        let textbook_id = seeded_textbook(&store).await;

        let characters = store
            .textbook_characters(textbook_id, Some(1))
            .await
            .unwrap();
        let values: Vec<&str> = characters
            .iter()
            .map(|c| c.character.character.as_str())
            .collect();
        assert_eq!(values, vec!["天", "地", "人"]);

        let phrases = store.textbook_phrases(textbook_id, Some(1)).await.unwrap();
        let values: Vec<&str> = phrases.iter().map(|p| p.phrase.phrase.as_str()).collect();
        assert_eq!(values, vec!["天地", "人民"]);
    }

    #[tokio::test]
    async fn test_repeated_character_appears_once() {
        let store = Store::open_in_memory().await.unwrap();
        let textbook_id = seeded_textbook(&store).await;

        // 天 is introduced in lesson 1 and repeated in lesson 3
        let characters = store.textbook_characters(textbook_id, None).await.unwrap();
        let tian: Vec<_> = characters
            .iter()
            .filter(|c| c.character.character == "天")
            .collect();
        assert_eq!(tian.len(), 1);
        assert_eq!(tian[0].lesson_number, 1);
        assert_eq!(tian[0].unit_number, 1);
    }

    #[tokio::test]
    async fn test_coverage_is_monotonic() {
        let store = Store::open_in_memory().await.unwrap();
        let textbook_id = seeded_textbook(&store).await;

        let mut previous: HashSet<String> = HashSet::new();
        for n in 0..=4 {
            let current: HashSet<String> = store
                .textbook_characters(textbook_id, Some(n))
                .await
                .unwrap()
                .into_iter()
                .map(|c| c.character.character)
                .collect();
            assert!(
                previous.is_subset(&current),
                "coverage shrank between {} and {}",
                n - 1,
                n
            );
            previous = current;
        }
        assert_eq!(previous.len(), 7);
    }

    #[tokio::test]
    async fn test_unknown_textbook_is_not_found() {
        let store = Store::open_in_memory().await.unwrap();
        let err = store
            .textbook_characters(Uuid::new_v4(), Some(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_zero_prefix_is_empty() {
        let store = Store::open_in_memory().await.unwrap();
        let textbook_id = seeded_textbook(&store).await;
        let characters = store
            .textbook_characters(textbook_id, Some(0))
            .await
            .unwrap();
        assert!(characters.is_empty());
    }
}
