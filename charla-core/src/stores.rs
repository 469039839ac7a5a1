//! Persistence contracts. All access is keyed by `(user_email, id)`; there
//! are no transactions across stores, and cross-store consistency is only
//! checked by the offline sweep in [`crate::pipeline`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::{GameSession, Lesson, ProgressUpdate, Scenario};

#[async_trait]
pub trait ScenarioStore: Send + Sync {
    async fn insert(&self, scenario: &Scenario) -> Result<(), StoreError>;
    async fn get(&self, user_email: &str, id: &str) -> Result<Option<Scenario>, StoreError>;
}

#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn insert(&self, lesson: &Lesson) -> Result<(), StoreError>;
    async fn get(&self, user_email: &str, id: &str) -> Result<Option<Lesson>, StoreError>;
    async fn list_for_scenario(
        &self,
        user_email: &str,
        scenario_id: &str,
    ) -> Result<Vec<Lesson>, StoreError>;
    /// Record aggregate score/completion on the lesson itself. The content
    /// list is never touched after creation.
    async fn update_progress(
        &self,
        id: &str,
        score: u32,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GameSessionStore: Send + Sync {
    async fn insert(&self, session: &GameSession) -> Result<(), StoreError>;
    async fn get(&self, user_email: &str, id: &str) -> Result<Option<GameSession>, StoreError>;
    async fn update(&self, session: &GameSession) -> Result<(), StoreError>;
}

/// Scenario-level progress record for a learner, updated best-effort when a
/// session completes.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Create the learner's progress record for a freshly generated
    /// scenario, starting from zero.
    async fn link(&self, user_email: &str, scenario_id: &str) -> Result<(), StoreError>;
    async fn apply(
        &self,
        user_email: &str,
        scenario_id: &str,
        update: &ProgressUpdate,
    ) -> Result<(), StoreError>;
}
