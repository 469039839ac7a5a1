//! Postgrest-backed persistence for scenarios, lessons, sessions and the
//! learner's scenario progress record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgrest::Postgrest;

use charla_core::stores::{GameSessionStore, LessonStore, ProgressStore, ScenarioStore};
use charla_core::{GameSession, Lesson, ProgressUpdate, Scenario, StoreError};

#[derive(Clone)]
pub struct Database {
    supabase_url: String,
    service_role_key: String,
}

impl Database {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Ok(Self {
            supabase_url: std::env::var("SUPABASE_URL")?,
            service_role_key: std::env::var("SUPABASE_SERVICE_ROLE_KEY")?,
        })
    }

    fn client(&self) -> Postgrest {
        Postgrest::new(format!("{}/rest/v1", self.supabase_url))
            .insert_header("apikey", self.service_role_key.clone())
            .insert_header(
                "Authorization",
                format!("Bearer {}", self.service_role_key),
            )
    }

    async fn insert_row<T: serde::Serialize>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(row).map_err(|e| StoreError(e.to_string()))?;
        let response = self
            .client()
            .from(table)
            .insert(payload)
            .execute()
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError(format!(
                "insert into {table} returned {}",
                response.status()
            )))
        }
    }

    /// Fetch a single row owned by the user. Postgrest signals "no rows
    /// matched" for a `.single()` request with a 406.
    async fn get_row<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        user_email: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let response = self
            .client()
            .from(table)
            .select("*")
            .eq("user_email", user_email)
            .eq("id", id)
            .single()
            .execute()
            .await
            .map_err(|e| StoreError(e.to_string()))?;

        if response.status().is_success() {
            let row = response
                .json::<T>()
                .await
                .map_err(|e| StoreError(e.to_string()))?;
            Ok(Some(row))
        } else if response.status() == preqwest::StatusCode::NOT_ACCEPTABLE {
            Ok(None)
        } else {
            Err(StoreError(format!(
                "select from {table} returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl ScenarioStore for Database {
    async fn insert(&self, scenario: &Scenario) -> Result<(), StoreError> {
        self.insert_row("scenarios", scenario).await
    }

    async fn get(&self, user_email: &str, id: &str) -> Result<Option<Scenario>, StoreError> {
        self.get_row("scenarios", user_email, id).await
    }
}

#[async_trait]
impl LessonStore for Database {
    async fn insert(&self, lesson: &Lesson) -> Result<(), StoreError> {
        self.insert_row("lessons", lesson).await
    }

    async fn get(&self, user_email: &str, id: &str) -> Result<Option<Lesson>, StoreError> {
        self.get_row("lessons", user_email, id).await
    }

    async fn list_for_scenario(
        &self,
        user_email: &str,
        scenario_id: &str,
    ) -> Result<Vec<Lesson>, StoreError> {
        let response = self
            .client()
            .from("lessons")
            .select("*")
            .eq("user_email", user_email)
            .eq("scenario_id", scenario_id)
            .order("order.asc")
            .execute()
            .await
            .map_err(|e| StoreError(e.to_string()))?;

        if response.status().is_success() {
            response
                .json::<Vec<Lesson>>()
                .await
                .map_err(|e| StoreError(e.to_string()))
        } else {
            Err(StoreError(format!(
                "lesson list returned {}",
                response.status()
            )))
        }
    }

    async fn update_progress(
        &self,
        id: &str,
        score: u32,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let payload = serde_json::json!({
            "score": score,
            "completed": completed,
            "updated_at": updated_at,
        });
        let response = self
            .client()
            .from("lessons")
            .eq("id", id)
            .update(payload.to_string())
            .execute()
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError(format!(
                "lesson update returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl GameSessionStore for Database {
    async fn insert(&self, session: &GameSession) -> Result<(), StoreError> {
        self.insert_row("game_sessions", session).await
    }

    async fn get(&self, user_email: &str, id: &str) -> Result<Option<GameSession>, StoreError> {
        self.get_row("game_sessions", user_email, id).await
    }

    async fn update(&self, session: &GameSession) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(session).map_err(|e| StoreError(e.to_string()))?;
        let response = self
            .client()
            .from("game_sessions")
            .eq("id", &session.id)
            .eq("user_email", &session.user_email)
            .update(payload)
            .execute()
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError(format!(
                "session update returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl ProgressStore for Database {
    async fn link(&self, user_email: &str, scenario_id: &str) -> Result<(), StoreError> {
        let payload = serde_json::json!({
            "user_email": user_email,
            "scenario_id": scenario_id,
            "total_score": 0,
            "games_won": 0,
        });
        let response = self
            .client()
            .from("scenario_progress")
            .upsert(payload.to_string())
            .execute()
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError(format!(
                "progress link returned {}",
                response.status()
            )))
        }
    }

    async fn apply(
        &self,
        user_email: &str,
        scenario_id: &str,
        update: &ProgressUpdate,
    ) -> Result<(), StoreError> {
        let payload = serde_json::json!({
            "user_email": user_email,
            "scenario_id": scenario_id,
            "total_score": update.total_score,
            "games_won": update.games_won,
            "last_played": update.last_played,
        });
        let response = self
            .client()
            .from("scenario_progress")
            .upsert(payload.to_string())
            .execute()
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError(format!(
                "progress update returned {}",
                response.status()
            )))
        }
    }
}
