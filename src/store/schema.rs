//! Schema initialization and reference data seeding

use rusqlite::Connection;

/// Initialize the database schema
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Curriculum hierarchy
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS textbooks (
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL REFERENCES subjects(id),
            publisher TEXT NOT NULL,
            grade INTEGER NOT NULL,
            volume INTEGER NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS units (
            id TEXT PRIMARY KEY,
            textbook_id TEXT NOT NULL REFERENCES textbooks(id),
            unit_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lessons (
            id TEXT PRIMARY KEY,
            unit_id TEXT NOT NULL REFERENCES units(id),
            lesson_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            page_start INTEGER,
            page_end INTEGER,
            created_at TEXT NOT NULL,
            UNIQUE (unit_id, lesson_number)
        );

        -- Seeded reference data, immutable after startup
        CREATE TABLE IF NOT EXISTS requirement_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            label TEXT NOT NULL
        );

        -- Shared vocabulary registry, not owned by any lesson
        CREATE TABLE IF NOT EXISTS characters (
            character TEXT PRIMARY KEY,
            pinyin TEXT NOT NULL DEFAULT '',
            standard_level INTEGER,
            cumulative_percent REAL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS character_lessons (
            character TEXT NOT NULL REFERENCES characters(character),
            lesson_id TEXT NOT NULL REFERENCES lessons(id),
            requirement_id INTEGER NOT NULL REFERENCES requirement_types(id),
            sort_order INTEGER NOT NULL DEFAULT 0,
            UNIQUE (character, lesson_id, requirement_id),
            UNIQUE (lesson_id, sort_order)
        );

        CREATE TABLE IF NOT EXISTS phrases (
            id TEXT PRIMARY KEY,
            phrase TEXT NOT NULL UNIQUE,
            pinyin TEXT NOT NULL DEFAULT '',
            meaning TEXT,
            created_at TEXT NOT NULL
        );

        -- Ordered decomposition of a phrase into its characters
        CREATE TABLE IF NOT EXISTS phrase_characters (
            phrase_id TEXT NOT NULL REFERENCES phrases(id),
            character TEXT NOT NULL REFERENCES characters(character),
            position INTEGER NOT NULL,
            UNIQUE (phrase_id, position)
        );

        CREATE TABLE IF NOT EXISTS phrase_lessons (
            phrase_id TEXT NOT NULL REFERENCES phrases(id),
            lesson_id TEXT NOT NULL REFERENCES lessons(id),
            sort_order INTEGER NOT NULL DEFAULT 0,
            UNIQUE (phrase_id, lesson_id),
            UNIQUE (lesson_id, sort_order)
        );

        -- Learner activity, append-only
        CREATE TABLE IF NOT EXISTS learners (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS test_sessions (
            id TEXT PRIMARY KEY,
            learner_id TEXT NOT NULL REFERENCES learners(id),
            lesson_id TEXT REFERENCES lessons(id),
            title TEXT,
            notes TEXT,
            tested_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS test_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES test_sessions(id),
            learner_id TEXT NOT NULL REFERENCES learners(id),
            character TEXT NOT NULL REFERENCES characters(character),
            skill TEXT NOT NULL,
            passed INTEGER NOT NULL,
            tested_at TEXT NOT NULL
        );

        -- Indexes for the hot lookup paths
        CREATE INDEX IF NOT EXISTS idx_textbooks_subject ON textbooks(subject_id);
        CREATE INDEX IF NOT EXISTS idx_units_textbook ON units(textbook_id);
        CREATE INDEX IF NOT EXISTS idx_lessons_unit ON lessons(unit_id);
        CREATE INDEX IF NOT EXISTS idx_character_lessons_lesson ON character_lessons(lesson_id);
        CREATE INDEX IF NOT EXISTS idx_character_lessons_character ON character_lessons(character);
        CREATE INDEX IF NOT EXISTS idx_phrase_characters_character ON phrase_characters(character);
        CREATE INDEX IF NOT EXISTS idx_phrase_characters_phrase ON phrase_characters(phrase_id);
        CREATE INDEX IF NOT EXISTS idx_phrase_lessons_lesson ON phrase_lessons(lesson_id);
        CREATE INDEX IF NOT EXISTS idx_test_sessions_learner ON test_sessions(learner_id);
        CREATE INDEX IF NOT EXISTS idx_test_results_learner ON test_results(learner_id);
        CREATE INDEX IF NOT EXISTS idx_test_results_session ON test_results(session_id);
        CREATE INDEX IF NOT EXISTS idx_test_results_character ON test_results(learner_id, character);
        "#,
    )
}

/// Seed the fixed requirement-type set. Idempotent; guarded by the
/// uniqueness constraint on code.
pub fn seed_requirement_types(conn: &Connection) -> rusqlite::Result<()> {
    let defaults = [
        ("recognize", "认识"),
        ("read", "会读"),
        ("write", "会写"),
        ("recite", "背诵"),
    ];
    for (code, label) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO requirement_types (code, label) VALUES (?1, ?2)",
            rusqlite::params![code, label],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        seed_requirement_types(&conn).unwrap();
        seed_requirement_types(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM requirement_types", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
    }
}
