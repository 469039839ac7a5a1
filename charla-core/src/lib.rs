pub mod audio;
pub mod error;
pub mod games;
pub mod generation;
pub mod hashing;
pub mod memory;
pub mod partition;
pub mod pipeline;
pub mod session;
pub mod stores;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::{CoreError, GenerationError, StoreError, SynthesisError};

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, Hash, Eq, PartialEq, Ord, PartialOrd,
)]
pub enum Language {
    French,
    English,
    Spanish,
    Korean,
    German,
    Chinese,
    Japanese,
    Russian,
    Portuguese,
    Italian,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::French => "French",
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::Korean => "Korean",
            Language::German => "German",
            Language::Chinese => "Chinese",
            Language::Japanese => "Japanese",
            Language::Russian => "Russian",
            Language::Portuguese => "Portuguese",
            Language::Italian => "Italian",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, Hash, Eq, PartialEq, Ord, PartialOrd,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Vocabulary,
    Sentence,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Vocabulary => write!(f, "vocabulary"),
            ContentKind::Sentence => write!(f, "sentence"),
        }
    }
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, Hash, Eq, PartialEq, Ord, PartialOrd,
)]
#[serde(rename_all = "kebab-case")]
pub enum GameType {
    Mahjong,
    WordSprint,
    TargetTranslation,
    PuzzleBuilder,
    AudioCatch,
}

/// Games a sentence item is always eligible for, regardless of lesson.
pub const SENTENCE_GAMES: &[GameType] = &[
    GameType::TargetTranslation,
    GameType::PuzzleBuilder,
    GameType::AudioCatch,
];

/// A single generated word with its translation and romanized pronunciation.
///
/// Immutable after generation; identified by its content hash, which is a
/// function of the text and translation only, so identical content in two
/// scenarios shares a hash (and shares cached audio).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabularyItem {
    pub hash: String,
    pub word: String,
    pub translation: String,
    pub phonetic: String,
    pub language: Language,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentenceItem {
    pub hash: String,
    pub sentence: String,
    pub translation: String,
    pub phonetic: String,
    pub language: Language,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioMetadata {
    pub language: Language,
    pub purpose: String,
    pub focus: String,
    pub generated_at: DateTime<Utc>,
    pub total_words: usize,
    pub total_sentences: usize,
}

/// One generated curriculum: the vocabulary and sentence pool for a
/// learner's stated goal. Content lists never change after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub user_email: String,
    pub metadata: ScenarioMetadata,
    pub vocabulary: Vec<VocabularyItem>,
    pub sentences: Vec<SentenceItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reference from a lesson to a content item in its parent scenario.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LessonContentRef {
    pub hash: String,
    pub kind: ContentKind,
    /// 1-based presentation position within the lesson.
    pub position: u32,
    pub allowed_games: Vec<GameType>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub scenario_id: String,
    pub user_email: String,
    pub name: String,
    /// 1-based position in the curriculum sequence.
    pub order: u32,
    pub content_items: Vec<LessonContentRef>,
    pub score: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Game-specific measurements. Each game reports only what it naturally
/// produces, so every field is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GameMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words_per_minute: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrong_choices_before_correct: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construction_time_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening_attempts: Option<u32>,
}

/// Outcome of one game played against one content item. Immutable once
/// appended to a session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GameResult {
    pub game_type: GameType,
    pub content_kind: ContentKind,
    pub content_hash: String,
    pub content_text: String,
    pub score: u32,
    pub is_correct: bool,
    pub total_attempts: u32,
    pub correct_on_first_try: bool,
    pub time_spent_seconds: f64,
    #[serde(default)]
    pub metrics: GameMetrics,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// One play-through attempt of a lesson. Transitions `Active -> Completed`
/// exactly once and is never reopened; a retry is a brand-new session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameSession {
    pub id: String,
    pub user_email: String,
    pub lesson_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub results: Vec<GameResult>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GameTypeStats {
    pub played: u32,
    pub won: u32,
    pub total_score: u32,
    pub average_time_seconds: f64,
}

/// Aggregate performance for one completed session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LessonPerformance {
    pub session_id: String,
    pub lesson_id: String,
    pub total_score: u32,
    pub games_won: u32,
    pub total_time_seconds: f64,
    pub game_stats: std::collections::BTreeMap<GameType, GameTypeStats>,
    pub completed_at: DateTime<Utc>,
}

/// Scenario-level progress delta pushed when a session completes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressUpdate {
    pub total_score: u32,
    pub games_won: u32,
    pub last_played: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub language: Language,
}
