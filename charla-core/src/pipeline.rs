//! End-to-end curriculum generation and the offline integrity sweep.

use chrono::Utc;
use rand::Rng;

use crate::generation::{CurriculumGenerator, GenerationConfig, LanguageModelGateway};
use crate::partition::{LessonPlan, partition_scenario};
use crate::stores::{LessonStore, ProgressStore, ScenarioStore};
use crate::{
    ContentKind, CoreError, Language, Lesson, Scenario, ScenarioMetadata,
};

#[derive(Clone, Debug, serde::Deserialize)]
pub struct GenerationRequest {
    pub language: Language,
    pub purpose: String,
    pub focus: String,
}

/// Orchestrates generate -> persist scenario -> link progress -> partition
/// -> persist lessons, strictly in that order. Generation and parsing
/// happen before any write, so a failed request persists nothing.
pub struct ContentPipeline<G, S, L, P> {
    generator: CurriculumGenerator<G>,
    scenarios: S,
    lessons: L,
    progress: P,
    plans: Vec<LessonPlan>,
}

impl<G, S, L, P> ContentPipeline<G, S, L, P>
where
    G: LanguageModelGateway,
    S: ScenarioStore,
    L: LessonStore,
    P: ProgressStore,
{
    pub fn new(gateway: G, config: GenerationConfig, scenarios: S, lessons: L, progress: P) -> Self {
        Self {
            generator: CurriculumGenerator::new(gateway, config),
            scenarios,
            lessons,
            progress,
            plans: LessonPlan::standard_course(),
        }
    }

    pub fn with_plans(mut self, plans: Vec<LessonPlan>) -> Self {
        self.plans = plans;
        self
    }

    /// Generate a curriculum for the learner's goal and slice it into the
    /// planned lesson sequence.
    pub async fn generate_curriculum_and_lessons<R: Rng + Send>(
        &self,
        user_email: &str,
        request: &GenerationRequest,
        rng: &mut R,
    ) -> Result<(Scenario, Vec<Lesson>), CoreError> {
        let content = self
            .generator
            .generate(request.language, &request.purpose, &request.focus)
            .await?;

        let now = Utc::now();
        let scenario = Scenario {
            id: uuid::Uuid::new_v4().to_string(),
            user_email: user_email.to_string(),
            metadata: ScenarioMetadata {
                language: request.language,
                purpose: request.purpose.clone(),
                focus: request.focus.clone(),
                generated_at: now,
                total_words: content.vocabulary.len(),
                total_sentences: content.sentences.len(),
            },
            vocabulary: content.vocabulary,
            sentences: content.sentences,
            created_at: now,
            updated_at: now,
        };
        self.scenarios.insert(&scenario).await?;
        self.progress.link(user_email, &scenario.id).await?;

        let mut lessons = Vec::with_capacity(self.plans.len());
        for partitioned in partition_scenario(&scenario, &self.plans, rng) {
            let lesson = Lesson {
                id: uuid::Uuid::new_v4().to_string(),
                scenario_id: scenario.id.clone(),
                user_email: user_email.to_string(),
                name: format!("{} Lesson {}", request.language, partitioned.order),
                order: partitioned.order,
                content_items: partitioned.content_items,
                score: 0,
                completed: false,
                created_at: now,
                updated_at: now,
            };
            self.lessons.insert(&lesson).await?;
            lessons.push(lesson);
        }

        log::info!(
            "generated scenario {} ({} words, {} sentences) into {} lessons",
            scenario.id,
            scenario.metadata.total_words,
            scenario.metadata.total_sentences,
            lessons.len()
        );
        Ok((scenario, lessons))
    }

    /// Conversational focus-area clarification ahead of generation.
    pub async fn clarify(
        &self,
        language: Language,
        purpose: &str,
        user_input: &str,
        previous_inputs: &[String],
    ) -> Result<String, CoreError> {
        Ok(self
            .generator
            .clarify(language, purpose, user_input, previous_inputs)
            .await?)
    }

    /// Offline consistency check for a stored scenario and its lessons.
    pub async fn sweep(
        &self,
        user_email: &str,
        scenario_id: &str,
    ) -> Result<Vec<IntegrityWarning>, CoreError> {
        let scenario = self
            .scenarios
            .get(user_email, scenario_id)
            .await?
            .ok_or_else(|| CoreError::not_found("scenario", scenario_id))?;
        let lessons = self
            .lessons
            .list_for_scenario(user_email, scenario_id)
            .await?;
        Ok(sweep_scenario(&scenario, &lessons))
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum IntegrityIssue {
    /// The ref's hash is absent from the scenario's content lists.
    UnresolvedRef { kind: ContentKind },
    /// The same hash appears in more than one lesson of the scenario.
    DuplicatedAcrossLessons { other_lesson_id: String },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct IntegrityWarning {
    pub lesson_id: String,
    pub hash: String,
    pub issue: IntegrityIssue,
}

/// Check every lesson ref against the scenario and against the other
/// lessons. Warnings are logged and returned, never auto-repaired.
pub fn sweep_scenario(scenario: &Scenario, lessons: &[Lesson]) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();
    let mut claimed: std::collections::BTreeMap<&str, &str> = std::collections::BTreeMap::new();

    for lesson in lessons {
        for item in &lesson.content_items {
            let resolves = match item.kind {
                ContentKind::Vocabulary => {
                    scenario.vocabulary.iter().any(|v| v.hash == item.hash)
                }
                ContentKind::Sentence => {
                    scenario.sentences.iter().any(|s| s.hash == item.hash)
                }
            };
            if !resolves {
                warnings.push(IntegrityWarning {
                    lesson_id: lesson.id.clone(),
                    hash: item.hash.clone(),
                    issue: IntegrityIssue::UnresolvedRef { kind: item.kind },
                });
            }

            match claimed.get(item.hash.as_str()) {
                Some(other) if *other != lesson.id => {
                    warnings.push(IntegrityWarning {
                        lesson_id: lesson.id.clone(),
                        hash: item.hash.clone(),
                        issue: IntegrityIssue::DuplicatedAcrossLessons {
                            other_lesson_id: other.to_string(),
                        },
                    });
                }
                Some(_) => {}
                None => {
                    claimed.insert(item.hash.as_str(), lesson.id.as_str());
                }
            }
        }
    }

    for warning in &warnings {
        log::warn!(
            "integrity: lesson {} hash {}: {:?}",
            warning.lesson_id,
            warning.hash,
            warning.issue
        );
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::generation::LanguageModelGateway;
    use crate::memory::{
        MemoryLessonStore, MemoryProgressStore, MemoryScenarioStore, MemorySessionStore,
    };
    use crate::session::GameSessionEngine;
    use crate::{GameMetrics, GameResult, GameType, LessonContentRef, SessionStatus};
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Builds a completion in the generated line format with the requested
    /// number of items.
    fn completion(words: usize, sentences: usize) -> String {
        let mut text = String::from("WORDS:\n");
        for i in 0..words {
            text.push_str(&format!(
                "- palabra{i} | [ENGLISH] word {i} | [PHONETIC] pah-LAH-brah\n"
            ));
        }
        text.push_str("\nSENTENCES:\n");
        for i in 0..sentences {
            text.push_str(&format!(
                "{}. Quiero el plato {i} | [ENGLISH] I want dish {i} | [PHONETIC] KYEH-roh\n",
                i + 1
            ));
        }
        text
    }

    struct FixedGateway(String);

    #[async_trait]
    impl LanguageModelGateway for FixedGateway {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok(self.0.clone())
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl LanguageModelGateway for FailingGateway {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Gateway("boom".to_string()))
        }
    }

    fn pipeline_with(
        gateway: impl LanguageModelGateway,
        scenarios: MemoryScenarioStore,
        lessons: MemoryLessonStore,
        progress: MemoryProgressStore,
    ) -> ContentPipeline<impl LanguageModelGateway, MemoryScenarioStore, MemoryLessonStore, MemoryProgressStore>
    {
        ContentPipeline::new(
            gateway,
            GenerationConfig::default(),
            scenarios,
            lessons,
            progress,
        )
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            language: Language::Spanish,
            purpose: "travel".to_string(),
            focus: "restaurants".to_string(),
        }
    }

    #[tokio::test]
    async fn end_to_end_generation_partition_and_scoring() {
        let user = "learner@example.com";
        let scenarios = MemoryScenarioStore::default();
        let lessons = MemoryLessonStore::default();
        let progress = MemoryProgressStore::default();
        let sessions = MemorySessionStore::default();
        let pipeline = pipeline_with(
            FixedGateway(completion(30, 20)),
            scenarios.clone(),
            lessons.clone(),
            progress.clone(),
        );

        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let (scenario, lesson_list) = pipeline
            .generate_curriculum_and_lessons(user, &request(), &mut rng)
            .await
            .unwrap();

        assert!(scenario.vocabulary.len() <= 30);
        assert!(scenario.sentences.len() <= 20);
        assert!(
            scenario
                .vocabulary
                .iter()
                .all(|v| !v.hash.is_empty())
        );
        assert_eq!(lesson_list.len(), 4);

        let total_lesson_vocab: usize = lesson_list
            .iter()
            .flat_map(|l| &l.content_items)
            .filter(|i| i.kind == ContentKind::Vocabulary)
            .count();
        assert!(total_lesson_vocab <= scenario.vocabulary.len());

        // Play through lesson 1.
        let engine = GameSessionEngine::new(sessions, lessons, progress.clone());
        let session = engine
            .create_session(user, &lesson_list[0].id)
            .await
            .unwrap();
        let mut expected_score = 0;
        for (i, item) in lesson_list[0].content_items.iter().take(10).enumerate() {
            let score = 50 + i as u32;
            expected_score += score;
            engine
                .submit_result(
                    &session.id,
                    user,
                    GameResult {
                        game_type: GameType::Mahjong,
                        content_kind: item.kind,
                        content_hash: item.hash.clone(),
                        content_text: String::new(),
                        score,
                        is_correct: true,
                        total_attempts: 1,
                        correct_on_first_try: true,
                        time_spent_seconds: 5.0,
                        metrics: GameMetrics::default(),
                        timestamp: Utc::now(),
                    },
                )
                .await
                .unwrap();
        }
        let summary = engine.complete_session(&session.id, user).await.unwrap();
        assert_eq!(summary.total_score, expected_score);
        assert_eq!(summary.games_won, 10);

        let record = progress.get(user, &scenario.id).unwrap();
        assert_eq!(record.total_score, expected_score);
    }

    #[tokio::test]
    async fn gateway_failure_persists_nothing() {
        let user = "learner@example.com";
        let scenarios = MemoryScenarioStore::default();
        let lessons = MemoryLessonStore::default();
        let progress = MemoryProgressStore::default();
        let pipeline = pipeline_with(
            FailingGateway,
            scenarios.clone(),
            lessons.clone(),
            progress.clone(),
        );

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = pipeline
            .generate_curriculum_and_lessons(user, &request(), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Generation(GenerationError::Gateway(_))
        ));

        // No scenario means no lessons and no progress link either; the
        // sweep entry point agrees.
        let err = pipeline.sweep(user, "anything").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn empty_pools_partition_into_empty_lessons() {
        let user = "learner@example.com";
        let pipeline = pipeline_with(
            FixedGateway("WORDS:\nnothing parsable\nSENTENCES:\nstill nothing".to_string()),
            MemoryScenarioStore::default(),
            MemoryLessonStore::default(),
            MemoryProgressStore::default(),
        );

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (scenario, lessons) = pipeline
            .generate_curriculum_and_lessons(user, &request(), &mut rng)
            .await
            .unwrap();
        assert!(scenario.vocabulary.is_empty());
        assert!(scenario.sentences.is_empty());
        assert_eq!(lessons.len(), 4);
        assert!(lessons.iter().all(|l| l.content_items.is_empty()));
    }

    #[tokio::test]
    async fn sweep_reports_dangling_and_duplicated_refs() {
        let user = "learner@example.com";
        let scenarios = MemoryScenarioStore::default();
        let lessons = MemoryLessonStore::default();
        let pipeline = pipeline_with(
            FixedGateway(completion(10, 5)),
            scenarios.clone(),
            lessons.clone(),
            MemoryProgressStore::default(),
        );

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (scenario, lesson_list) = pipeline
            .generate_curriculum_and_lessons(user, &request(), &mut rng)
            .await
            .unwrap();

        // A freshly generated curriculum is clean.
        assert!(pipeline.sweep(user, &scenario.id).await.unwrap().is_empty());

        // Corrupt lesson 2: a dangling ref plus a hash stolen from lesson 1.
        let mut corrupted = lesson_list[1].clone();
        corrupted.content_items.push(LessonContentRef {
            hash: "dangling".to_string(),
            kind: ContentKind::Vocabulary,
            position: 98,
            allowed_games: vec![GameType::Mahjong],
        });
        corrupted
            .content_items
            .push(lesson_list[0].content_items[0].clone());
        crate::stores::LessonStore::insert(&lessons, &corrupted)
            .await
            .unwrap();

        let warnings = pipeline.sweep(user, &scenario.id).await.unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| matches!(
            w.issue,
            IntegrityIssue::UnresolvedRef { .. }
        )));
        assert!(warnings.iter().any(|w| matches!(
            w.issue,
            IntegrityIssue::DuplicatedAcrossLessons { .. }
        )));
    }

    #[tokio::test]
    async fn sessions_survive_even_when_generation_was_small() {
        // 3 words, 1 sentence: lessons 2-4 mostly empty, engine still works.
        let user = "learner@example.com";
        let scenarios = MemoryScenarioStore::default();
        let lessons = MemoryLessonStore::default();
        let progress = MemoryProgressStore::default();
        let pipeline = pipeline_with(
            FixedGateway(completion(3, 1)),
            scenarios,
            lessons.clone(),
            progress.clone(),
        );

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (_, lesson_list) = pipeline
            .generate_curriculum_and_lessons(user, &request(), &mut rng)
            .await
            .unwrap();
        assert_eq!(lesson_list[0].content_items.len(), 4);
        assert!(lesson_list[2].content_items.is_empty());

        let engine =
            GameSessionEngine::new(MemorySessionStore::default(), lessons, progress);
        let session = engine
            .create_session(user, &lesson_list[0].id)
            .await
            .unwrap();
        let summary = engine.complete_session(&session.id, user).await.unwrap();
        assert_eq!(summary.total_score, 0);
        assert_eq!(summary.games_won, 0);
        assert_eq!(summary.game_stats.len(), 0);

        let stored = engine
            .create_session(user, &lesson_list[0].id)
            .await
            .unwrap();
        assert_eq!(stored.status, SessionStatus::Active);
    }
}
