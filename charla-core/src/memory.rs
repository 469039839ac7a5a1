//! In-memory collaborator implementations, used by tests and local
//! development. Not suitable for anything persistent: state lives and dies
//! with the process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::audio::{ObjectStore, TextToSpeechGateway};
use crate::error::{StoreError, SynthesisError};
use crate::stores::{GameSessionStore, LessonStore, ProgressStore, ScenarioStore};
use crate::{GameSession, Language, Lesson, ProgressUpdate, Scenario};

/// Text-to-speech fake that counts synthesis calls, so cache tests can
/// assert how many times generation actually happened.
#[derive(Default)]
pub struct CountingTts {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingTts {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextToSpeechGateway for CountingTts {
    async fn synthesize(
        &self,
        text: &str,
        _language: Language,
    ) -> Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SynthesisError::Gateway("synthesis unavailable".to_string()));
        }
        Ok(format!("mp3:{text}").into_bytes())
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(Language, String), Vec<u8>>>,
    fail_next_exists: AtomicBool,
}

impl MemoryObjectStore {
    /// Make the next `exists` call fail, to exercise the conservative
    /// treat-as-missing path.
    pub fn fail_exists_once(&self) {
        self.fail_next_exists.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, key: &str, language: Language) -> Result<bool, StoreError> {
        if self.fail_next_exists.swap(false, Ordering::SeqCst) {
            return Err(StoreError("object store unavailable".to_string()));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .contains_key(&(language, key.to_string())))
    }

    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &str,
        language: Language,
    ) -> Result<String, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .insert((language, key.to_string()), bytes);
        Ok(self.url_for(key, language))
    }

    fn url_for(&self, key: &str, language: Language) -> String {
        format!("memory://audio/{language}/{key}.mp3")
    }
}

#[derive(Clone, Default)]
pub struct MemoryScenarioStore {
    scenarios: Arc<Mutex<BTreeMap<String, Scenario>>>,
}

#[async_trait]
impl ScenarioStore for MemoryScenarioStore {
    async fn insert(&self, scenario: &Scenario) -> Result<(), StoreError> {
        self.scenarios
            .lock()
            .unwrap()
            .insert(scenario.id.clone(), scenario.clone());
        Ok(())
    }

    async fn get(&self, user_email: &str, id: &str) -> Result<Option<Scenario>, StoreError> {
        Ok(self
            .scenarios
            .lock()
            .unwrap()
            .get(id)
            .filter(|s| s.user_email == user_email)
            .cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemoryLessonStore {
    lessons: Arc<Mutex<BTreeMap<String, Lesson>>>,
}

#[async_trait]
impl LessonStore for MemoryLessonStore {
    async fn insert(&self, lesson: &Lesson) -> Result<(), StoreError> {
        self.lessons
            .lock()
            .unwrap()
            .insert(lesson.id.clone(), lesson.clone());
        Ok(())
    }

    async fn get(&self, user_email: &str, id: &str) -> Result<Option<Lesson>, StoreError> {
        Ok(self
            .lessons
            .lock()
            .unwrap()
            .get(id)
            .filter(|l| l.user_email == user_email)
            .cloned())
    }

    async fn list_for_scenario(
        &self,
        user_email: &str,
        scenario_id: &str,
    ) -> Result<Vec<Lesson>, StoreError> {
        let mut lessons: Vec<Lesson> = self
            .lessons
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.user_email == user_email && l.scenario_id == scenario_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.order);
        Ok(lessons)
    }

    async fn update_progress(
        &self,
        id: &str,
        score: u32,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut lessons = self.lessons.lock().unwrap();
        let lesson = lessons
            .get_mut(id)
            .ok_or_else(|| StoreError(format!("lesson {id} not found")))?;
        lesson.score = score;
        lesson.completed = completed;
        lesson.updated_at = updated_at;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<BTreeMap<String, GameSession>>>,
}

#[async_trait]
impl GameSessionStore for MemorySessionStore {
    async fn insert(&self, session: &GameSession) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, user_email: &str, id: &str) -> Result<Option<GameSession>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(id)
            .filter(|s| s.user_email == user_email)
            .cloned())
    }

    async fn update(&self, session: &GameSession) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressRecord {
    pub total_score: u32,
    pub games_won: u32,
    pub last_played: Option<DateTime<Utc>>,
}

#[derive(Clone, Default)]
pub struct MemoryProgressStore {
    records: Arc<Mutex<BTreeMap<(String, String), ProgressRecord>>>,
    fail_apply: Arc<AtomicBool>,
}

impl MemoryProgressStore {
    /// Make every `apply` call fail, to exercise the best-effort push path.
    pub fn failing() -> Self {
        Self {
            records: Arc::default(),
            fail_apply: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn get(&self, user_email: &str, scenario_id: &str) -> Option<ProgressRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(user_email.to_string(), scenario_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn link(&self, user_email: &str, scenario_id: &str) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .entry((user_email.to_string(), scenario_id.to_string()))
            .or_default();
        Ok(())
    }

    async fn apply(
        &self,
        user_email: &str,
        scenario_id: &str,
        update: &ProgressUpdate,
    ) -> Result<(), StoreError> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(StoreError("progress store unavailable".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry((user_email.to_string(), scenario_id.to_string()))
            .or_default();
        record.total_score = update.total_score;
        record.games_won = update.games_won;
        record.last_played = Some(update.last_played);
        Ok(())
    }
}
