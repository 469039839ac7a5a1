//! Game-session state machine and lesson performance aggregation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::stores::{GameSessionStore, LessonStore, ProgressStore};
use crate::{
    CoreError, GameResult, GameSession, GameTypeStats, LessonPerformance, ProgressUpdate,
    SessionStatus,
};

impl GameSession {
    pub fn begin(user_email: &str, lesson_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_email: user_email.to_string(),
            lesson_id: lesson_id.to_string(),
            started_at: now,
            completed_at: None,
            status: SessionStatus::Active,
            results: Vec::new(),
        }
    }

    /// Append one game result. Only valid while the session is active, and
    /// only for a content hash this session has not already recorded.
    /// A retried lesson gets a brand-new session instead.
    pub fn record(&mut self, result: GameResult) -> Result<(), CoreError> {
        if self.status == SessionStatus::Completed {
            return Err(CoreError::SessionCompleted {
                id: self.id.clone(),
            });
        }
        if self
            .results
            .iter()
            .any(|r| r.content_hash == result.content_hash)
        {
            return Err(CoreError::DuplicateResult {
                hash: result.content_hash,
            });
        }
        self.results.push(result);
        Ok(())
    }

    /// Transition `Active -> Completed` and compute the aggregate summary.
    /// There is no transition out of `Completed`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<LessonPerformance, CoreError> {
        if self.status == SessionStatus::Completed {
            return Err(CoreError::SessionCompleted {
                id: self.id.clone(),
            });
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        Ok(summarize(&self.id, &self.lesson_id, &self.results, now))
    }
}

fn summarize(
    session_id: &str,
    lesson_id: &str,
    results: &[GameResult],
    completed_at: DateTime<Utc>,
) -> LessonPerformance {
    let total_score = results.iter().map(|r| r.score).sum();
    let games_won = results.iter().filter(|r| r.is_correct).count() as u32;
    let total_time_seconds = results.iter().map(|r| r.time_spent_seconds).sum();

    let mut time_per_game: BTreeMap<_, f64> = BTreeMap::new();
    let mut game_stats: BTreeMap<_, GameTypeStats> = BTreeMap::new();
    for result in results {
        let stats = game_stats.entry(result.game_type).or_default();
        stats.played += 1;
        stats.won += u32::from(result.is_correct);
        stats.total_score += result.score;
        *time_per_game.entry(result.game_type).or_default() += result.time_spent_seconds;
    }
    for (game_type, stats) in game_stats.iter_mut() {
        stats.average_time_seconds = time_per_game[game_type] / f64::from(stats.played);
    }

    LessonPerformance {
        session_id: session_id.to_string(),
        lesson_id: lesson_id.to_string(),
        total_score,
        games_won,
        total_time_seconds,
        game_stats,
        completed_at,
    }
}

/// Orchestrates session lifecycle against the stores: ownership checks on
/// creation, result recording, and completion with the best-effort
/// progress push.
pub struct GameSessionEngine<S, L, P> {
    sessions: S,
    lessons: L,
    progress: P,
}

impl<S, L, P> GameSessionEngine<S, L, P>
where
    S: GameSessionStore,
    L: LessonStore,
    P: ProgressStore,
{
    pub fn new(sessions: S, lessons: L, progress: P) -> Self {
        Self {
            sessions,
            lessons,
            progress,
        }
    }

    /// Start a session for a lesson the user owns.
    pub async fn create_session(
        &self,
        user_email: &str,
        lesson_id: &str,
    ) -> Result<GameSession, CoreError> {
        let lesson = self
            .lessons
            .get(user_email, lesson_id)
            .await?
            .ok_or_else(|| CoreError::not_found("lesson", lesson_id))?;
        let session = GameSession::begin(user_email, &lesson.id, Utc::now());
        self.sessions.insert(&session).await?;
        Ok(session)
    }

    /// Record a result against an active session. The content hash is
    /// trusted to belong to the session's lesson; membership is checked by
    /// the offline sweep, not per submit.
    pub async fn submit_result(
        &self,
        session_id: &str,
        user_email: &str,
        result: GameResult,
    ) -> Result<(), CoreError> {
        let mut session = self
            .sessions
            .get(user_email, session_id)
            .await?
            .ok_or_else(|| CoreError::not_found("game session", session_id))?;
        session.record(result)?;
        self.sessions.update(&session).await?;
        Ok(())
    }

    /// Complete a session and push aggregates to the learner's scenario
    /// progress record. The session's own completion is the source of
    /// truth: a failing progress or lesson update is logged and retried
    /// out-of-band, never rolled back.
    pub async fn complete_session(
        &self,
        session_id: &str,
        user_email: &str,
    ) -> Result<LessonPerformance, CoreError> {
        let mut session = self
            .sessions
            .get(user_email, session_id)
            .await?
            .ok_or_else(|| CoreError::not_found("game session", session_id))?;
        let lesson = self
            .lessons
            .get(user_email, &session.lesson_id)
            .await?
            .ok_or_else(|| CoreError::not_found("lesson", session.lesson_id.clone()))?;

        let summary = session.complete(Utc::now())?;
        self.sessions.update(&session).await?;

        let update = ProgressUpdate {
            total_score: summary.total_score,
            games_won: summary.games_won,
            last_played: summary.completed_at,
        };
        if let Err(e) = self
            .progress
            .apply(user_email, &lesson.scenario_id, &update)
            .await
        {
            log::warn!(
                "progress update failed for scenario {}: {e}",
                lesson.scenario_id
            );
        }
        if let Err(e) = self
            .lessons
            .update_progress(&lesson.id, summary.total_score, true, summary.completed_at)
            .await
        {
            log::warn!("lesson progress update failed for {}: {e}", lesson.id);
        }

        Ok(summary)
    }
}
