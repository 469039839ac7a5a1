//! Game assignment for lesson content, including distractor generation for
//! the target-translation game.

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::{ContentKind, CoreError, GameType, Language, Lesson, Scenario};

/// A lesson content ref joined with the scenario item it points at.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ResolvedContentItem {
    pub hash: String,
    pub kind: ContentKind,
    pub position: u32,
    pub allowed_games: Vec<GameType>,
    pub text: String,
    pub translation: String,
    pub phonetic: String,
    pub language: Language,
}

/// A lesson's content resolved against its scenario, grouped by kind and
/// ordered by presentation position.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct LessonContent {
    pub vocabulary: Vec<ResolvedContentItem>,
    pub sentences: Vec<ResolvedContentItem>,
}

/// Join the lesson's refs with the scenario's content lists.
///
/// A ref whose hash is absent from the scenario is dropped with a warning
/// rather than failing the whole lesson; the offline sweep reports the same
/// refs as integrity warnings.
pub fn resolve_lesson_content(lesson: &Lesson, scenario: &Scenario) -> LessonContent {
    let mut content = LessonContent::default();

    for item in &lesson.content_items {
        let resolved = match item.kind {
            ContentKind::Vocabulary => scenario
                .vocabulary
                .iter()
                .find(|v| v.hash == item.hash)
                .map(|v| ResolvedContentItem {
                    hash: v.hash.clone(),
                    kind: item.kind,
                    position: item.position,
                    allowed_games: item.allowed_games.clone(),
                    text: v.word.clone(),
                    translation: v.translation.clone(),
                    phonetic: v.phonetic.clone(),
                    language: v.language,
                }),
            ContentKind::Sentence => scenario
                .sentences
                .iter()
                .find(|s| s.hash == item.hash)
                .map(|s| ResolvedContentItem {
                    hash: s.hash.clone(),
                    kind: item.kind,
                    position: item.position,
                    allowed_games: item.allowed_games.clone(),
                    text: s.sentence.clone(),
                    translation: s.translation.clone(),
                    phonetic: s.phonetic.clone(),
                    language: s.language,
                }),
        };
        match resolved {
            Some(resolved) => match resolved.kind {
                ContentKind::Vocabulary => content.vocabulary.push(resolved),
                ContentKind::Sentence => content.sentences.push(resolved),
            },
            None => log::warn!(
                "lesson {} references {} content {} missing from scenario {}",
                lesson.id,
                item.kind,
                item.hash,
                scenario.id
            ),
        }
    }

    content.vocabulary.sort_by_key(|i| i.position);
    content.sentences.sort_by_key(|i| i.position);
    content
}

/// Pick a game uniformly from the item's eligibility list. An empty list
/// falls back to target-translation.
pub fn assign_game<R: Rng>(item: &ResolvedContentItem, rng: &mut R) -> GameType {
    item.allowed_games
        .choose(rng)
        .copied()
        .unwrap_or(GameType::TargetTranslation)
}

/// Build the 4-entry answer set for target-translation: the correct
/// translation plus up to 3 distinct distractors from the sibling pool,
/// padded with placeholders when the pool is too small, shuffled last.
pub fn target_translation_options<R: Rng>(
    correct: &str,
    siblings: &[&ResolvedContentItem],
    rng: &mut R,
) -> Vec<String> {
    let mut options = vec![correct.to_string()];

    let mut pool: Vec<&str> = siblings
        .iter()
        .map(|item| item.translation.as_str())
        .filter(|t| !t.is_empty() && *t != correct)
        .collect();
    pool.shuffle(rng);
    for candidate in pool {
        if options.len() == 4 {
            break;
        }
        if !options.iter().any(|o| o == candidate) {
            options.push(candidate.to_string());
        }
    }

    while options.len() < 4 {
        options.push(format!("Option {}", options.len()));
    }

    options.shuffle(rng);
    options
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct TranslationChallenge {
    pub question: String,
    pub pronunciation: String,
    pub correct_answer: String,
    pub options: Vec<String>,
    pub points: u32,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct GameAssignment {
    pub game_type: GameType,
    pub content: ResolvedContentItem,
    /// Populated only for target-translation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<TranslationChallenge>,
}

/// Choose a game for one content item of a lesson and build its payload.
/// The distractor pool is the other items of the same kind in the same
/// lesson, so the options stay on-topic for the learner.
pub fn assign_game_for_content_item<R: Rng>(
    lesson: &Lesson,
    scenario: &Scenario,
    content_hash: &str,
    rng: &mut R,
) -> Result<GameAssignment, CoreError> {
    let content = resolve_lesson_content(lesson, scenario);
    let (item, pool) = content
        .vocabulary
        .iter()
        .find(|i| i.hash == content_hash)
        .map(|i| (i, &content.vocabulary))
        .or_else(|| {
            content
                .sentences
                .iter()
                .find(|i| i.hash == content_hash)
                .map(|i| (i, &content.sentences))
        })
        .ok_or_else(|| CoreError::not_found("lesson content", content_hash))?;

    let game_type = assign_game(item, rng);
    let challenge = (game_type == GameType::TargetTranslation).then(|| {
        let siblings: Vec<&ResolvedContentItem> =
            pool.iter().filter(|i| i.hash != item.hash).collect();
        TranslationChallenge {
            question: item.text.clone(),
            pronunciation: item.phonetic.clone(),
            correct_answer: item.translation.clone(),
            options: target_translation_options(&item.translation, &siblings, rng),
            points: 100,
        }
    });

    Ok(GameAssignment {
        game_type,
        content: item.clone(),
        challenge,
    })
}
