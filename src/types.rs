//! Shared record types for the curriculum and learner-activity entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root of the curriculum hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

/// A textbook within a subject (e.g. grade 1, volume 1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Textbook {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub publisher: String,
    pub grade: i64,
    pub volume: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A unit within a textbook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub textbook_id: Uuid,
    pub unit_number: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A lesson within a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub lesson_number: i64,
    pub title: String,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Pedagogical expectation level for a character within a lesson
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementType {
    pub id: i64,
    pub code: String,
    pub label: String,
}

/// A single Chinese character, keyed by its literal value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub character: String,
    pub pinyin: String,
    /// 《通用规范汉字表》 tier: 1 = common, 2 = secondary, 3 = rare
    pub standard_level: Option<i64>,
    /// Cumulative corpus text coverage percentage
    pub cumulative_percent: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A multi-character phrase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phrase {
    pub id: Uuid,
    pub phrase: String,
    pub pinyin: String,
    pub meaning: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A learner tracked by the progress aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A single practice/quiz event for a learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSession {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub lesson_id: Option<Uuid>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub tested_at: DateTime<Utc>,
}

/// One pass/fail outcome within a test session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub session_id: Uuid,
    pub learner_id: Uuid,
    pub character: String,
    pub skill: Skill,
    pub passed: bool,
    pub tested_at: DateTime<Utc>,
}

/// Skill tag carried by a test result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Read,
    Write,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Read => "read",
            Skill::Write => "write",
        }
    }

    pub fn parse(s: &str) -> Option<Skill> {
        match s {
            "read" => Some(Skill::Read),
            "write" => Some(Skill::Write),
            _ => None,
        }
    }
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Composite read views
// ---------------------------------------------------------------------------

/// A character as it appears in a lesson's content listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonCharacter {
    #[serde(flatten)]
    pub character: Character,
    pub requirement: String,
    pub requirement_label: String,
    pub sort_order: i64,
}

/// A phrase as it appears in a lesson's content listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPhrase {
    #[serde(flatten)]
    pub phrase: Phrase,
    pub sort_order: i64,
}

/// Lesson reference attached to a character detail view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterLessonRef {
    pub lesson_id: Uuid,
    pub lesson_title: String,
    pub requirement: String,
    pub requirement_label: String,
    pub sort_order: i64,
}

/// Full character detail: registry row plus lesson and phrase links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterDetail {
    #[serde(flatten)]
    pub character: Character,
    pub lessons: Vec<CharacterLessonRef>,
    pub phrases: Vec<Phrase>,
}

/// A character in a cumulative coverage result, annotated with where it
/// was first introduced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageCharacter {
    #[serde(flatten)]
    pub character: Character,
    pub requirement: String,
    pub requirement_label: String,
    pub unit_number: i64,
    pub unit_title: String,
    pub lesson_number: i64,
    pub lesson_title: String,
}

/// A phrase in a cumulative coverage result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoveragePhrase {
    #[serde(flatten)]
    pub phrase: Phrase,
    pub unit_number: i64,
    pub unit_title: String,
    pub lesson_number: i64,
    pub lesson_title: String,
}

/// Per-skill mastery counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillProgress {
    /// Characters whose latest result for this skill passed
    pub mastered: i64,
    /// Distinct characters ever attempted for this skill
    pub total: i64,
}

/// Overall mastery summary for a learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub learner_id: Uuid,
    pub learner: String,
    pub total_characters_tested: i64,
    pub total_sessions: i64,
    pub read: SkillProgress,
    pub write: SkillProgress,
}

/// Latest status of one (character, skill) pair for a learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterStatus {
    pub character: String,
    pub skill: Skill,
    pub passed: bool,
    pub tested_at: DateTime<Utc>,
}

/// One entry in a character's full test history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub session_id: Uuid,
    pub session_title: Option<String>,
    pub skill: Skill,
    pub passed: bool,
    pub tested_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Write payloads shared between handlers and the store
// ---------------------------------------------------------------------------

/// One character entry in a lesson/textbook import
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterImportEntry {
    pub character: String,
    #[serde(default)]
    pub pinyin: String,
    #[serde(default = "default_requirement")]
    pub requirement: String,
}

fn default_requirement() -> String {
    "recognize".to_string()
}

/// One phrase entry in a lesson/textbook import
#[derive(Debug, Clone, Deserialize)]
pub struct PhraseImportEntry {
    pub phrase: String,
    #[serde(default)]
    pub pinyin: String,
    #[serde(default)]
    pub meaning: Option<String>,
}

/// Payload for `POST /import/lesson`
#[derive(Debug, Clone, Deserialize)]
pub struct LessonImportRequest {
    pub lesson_id: Uuid,
    #[serde(default)]
    pub characters: Vec<CharacterImportEntry>,
    #[serde(default)]
    pub phrases: Vec<PhraseImportEntry>,
}

/// A lesson inside a whole-textbook import
#[derive(Debug, Clone, Deserialize)]
pub struct LessonImport {
    pub lesson_number: i64,
    pub title: String,
    #[serde(default)]
    pub page_start: Option<i64>,
    #[serde(default)]
    pub page_end: Option<i64>,
    #[serde(default)]
    pub characters: Vec<CharacterImportEntry>,
    #[serde(default)]
    pub phrases: Vec<PhraseImportEntry>,
}

/// A unit inside a whole-textbook import
#[derive(Debug, Clone, Deserialize)]
pub struct UnitImport {
    pub unit_number: i64,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<LessonImport>,
}

/// Payload for `POST /import/textbook`
#[derive(Debug, Clone, Deserialize)]
pub struct TextbookImportRequest {
    pub subject_id: Uuid,
    pub publisher: String,
    pub grade: i64,
    pub volume: i64,
    pub name: String,
    #[serde(default)]
    pub units: Vec<UnitImport>,
}

/// One entry in a corpus frequency import
#[derive(Debug, Clone, Deserialize)]
pub struct FrequencyImportEntry {
    pub character: String,
    #[serde(default)]
    pub pinyin: Option<String>,
    #[serde(default)]
    pub standard_level: Option<i64>,
    #[serde(default)]
    pub cumulative_percent: Option<f64>,
}

/// Payload for `POST /import/frequency`
#[derive(Debug, Clone, Deserialize)]
pub struct FrequencyImportRequest {
    #[serde(default)]
    pub entries: Vec<FrequencyImportEntry>,
}

/// One result inside a test session submission
#[derive(Debug, Clone, Deserialize)]
pub struct TestResultEntry {
    pub character: String,
    pub skill: String,
    pub passed: bool,
}

/// Payload for `POST /test-sessions`
#[derive(Debug, Clone, Deserialize)]
pub struct TestSessionSubmit {
    pub learner_id: Uuid,
    #[serde(default)]
    pub lesson_id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub results: Vec<TestResultEntry>,
}

/// Row counts written back by a bulk import call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub units_created: i64,
    pub lessons_created: i64,
    pub characters_created: i64,
    pub character_links_created: i64,
    pub phrases_created: i64,
    pub phrase_links_created: i64,
    pub characters_updated: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_round_trip() {
        assert_eq!(Skill::parse("read"), Some(Skill::Read));
        assert_eq!(Skill::parse("write"), Some(Skill::Write));
        assert_eq!(Skill::parse("recite"), None);
        assert_eq!(Skill::Read.as_str(), "read");
        assert_eq!(serde_json::to_string(&Skill::Write).unwrap(), "\"write\"");
    }
}
