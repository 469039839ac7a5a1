//! Slicing a scenario's content pool into an ordered sequence of lessons.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{ContentKind, GameType, LessonContentRef, SENTENCE_GAMES, Scenario};

/// How many items one lesson takes from the pool, and which games its
/// vocabulary is eligible for. Sentences always get the full sentence set.
#[derive(Clone, Debug)]
pub struct LessonPlan {
    pub vocab_count: usize,
    pub sentence_count: usize,
    pub vocabulary_games: Vec<GameType>,
}

impl LessonPlan {
    /// The standard four-lesson course: three 5+5 lessons, then a 15-word
    /// finale restricted to the matching game. Front-loading means later
    /// lessons only ever see previously-unseen content, which gives a
    /// novelty progression without any difficulty model.
    pub fn standard_course() -> Vec<LessonPlan> {
        vec![
            LessonPlan {
                vocab_count: 5,
                sentence_count: 5,
                vocabulary_games: vec![GameType::Mahjong, GameType::WordSprint],
            },
            LessonPlan {
                vocab_count: 5,
                sentence_count: 5,
                vocabulary_games: vec![GameType::Mahjong, GameType::WordSprint],
            },
            LessonPlan {
                vocab_count: 5,
                sentence_count: 5,
                vocabulary_games: vec![GameType::Mahjong, GameType::WordSprint],
            },
            LessonPlan {
                vocab_count: 15,
                sentence_count: 5,
                vocabulary_games: vec![GameType::Mahjong],
            },
        ]
    }
}

/// One partitioned lesson before persistence: its 1-based order and its
/// content refs in presentation order.
#[derive(Clone, Debug)]
pub struct PartitionedLesson {
    pub order: u32,
    pub content_items: Vec<LessonContentRef>,
}

/// Accumulator threaded through the partition fold.
struct PartitionState {
    used_vocab: BTreeSet<String>,
    used_sentences: BTreeSet<String>,
    lessons: Vec<PartitionedLesson>,
}

/// Slice the scenario's pools into lessons, one per plan, in plan order.
///
/// Selection is stable: each lesson takes the first unused items in
/// scenario order, so two lessons of one scenario can never share a
/// content hash. When the pool runs out a lesson simply comes up short;
/// this never fails, duplicates, or wraps around. The final shuffle only
/// affects presentation order, never which items were selected.
pub fn partition_scenario<R: Rng>(
    scenario: &Scenario,
    plans: &[LessonPlan],
    rng: &mut R,
) -> Vec<PartitionedLesson> {
    let initial = PartitionState {
        used_vocab: BTreeSet::new(),
        used_sentences: BTreeSet::new(),
        lessons: Vec::with_capacity(plans.len()),
    };

    let state = plans
        .iter()
        .enumerate()
        .fold(initial, |mut state, (index, plan)| {
            let vocab: Vec<&str> = scenario
                .vocabulary
                .iter()
                .filter(|v| !state.used_vocab.contains(&v.hash))
                .take(plan.vocab_count)
                .map(|v| v.hash.as_str())
                .collect();
            let sentences: Vec<&str> = scenario
                .sentences
                .iter()
                .filter(|s| !state.used_sentences.contains(&s.hash))
                .take(plan.sentence_count)
                .map(|s| s.hash.as_str())
                .collect();

            let mut content_items: Vec<LessonContentRef> = vocab
                .iter()
                .map(|hash| LessonContentRef {
                    hash: hash.to_string(),
                    kind: ContentKind::Vocabulary,
                    position: 0,
                    allowed_games: plan.vocabulary_games.clone(),
                })
                .chain(sentences.iter().map(|hash| LessonContentRef {
                    hash: hash.to_string(),
                    kind: ContentKind::Sentence,
                    position: 0,
                    allowed_games: SENTENCE_GAMES.to_vec(),
                }))
                .collect();

            // Mixed presentation order; cosmetic only.
            content_items.shuffle(rng);
            for (position, item) in content_items.iter_mut().enumerate() {
                item.position = position as u32 + 1;
            }

            state.used_vocab.extend(vocab.iter().map(|h| h.to_string()));
            state
                .used_sentences
                .extend(sentences.iter().map(|h| h.to_string()));
            state.lessons.push(PartitionedLesson {
                order: index as u32 + 1,
                content_items,
            });
            state
        });

    state.lessons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::content_hash;
    use crate::{
        Language, ScenarioMetadata, SentenceItem, VocabularyItem,
    };
    use chrono::Utc;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scenario_with(vocab: usize, sentences: usize) -> Scenario {
        let language = Language::Spanish;
        let vocabulary = (0..vocab)
            .map(|i| {
                let word = format!("palabra{i}");
                VocabularyItem {
                    hash: content_hash(&format!("{word}||word {i}"), language.as_str()),
                    word,
                    translation: format!("word {i}"),
                    phonetic: String::new(),
                    language,
                }
            })
            .collect();
        let sentence_items = (0..sentences)
            .map(|i| {
                let sentence = format!("frase número {i}");
                SentenceItem {
                    hash: content_hash(&format!("{sentence}||sentence {i}"), language.as_str()),
                    sentence,
                    translation: format!("sentence {i}"),
                    phonetic: String::new(),
                    language,
                }
            })
            .collect();
        Scenario {
            id: "scenario-1".to_string(),
            user_email: "learner@example.com".to_string(),
            metadata: ScenarioMetadata {
                language,
                purpose: "travel".to_string(),
                focus: "restaurants".to_string(),
                generated_at: Utc::now(),
                total_words: vocab,
                total_sentences: sentences,
            },
            vocabulary,
            sentences: sentence_items,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn lessons_never_share_a_hash() {
        let scenario = scenario_with(30, 20);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let lessons = partition_scenario(&scenario, &LessonPlan::standard_course(), &mut rng);

        let mut seen = BTreeSet::new();
        for lesson in &lessons {
            for item in &lesson.content_items {
                assert!(
                    seen.insert(item.hash.clone()),
                    "hash {} appears in more than one lesson",
                    item.hash
                );
            }
        }
    }

    #[test]
    fn plans_are_filled_in_order() {
        let scenario = scenario_with(30, 20);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let lessons = partition_scenario(&scenario, &LessonPlan::standard_course(), &mut rng);

        assert_eq!(lessons.len(), 4);
        for (i, lesson) in lessons.iter().enumerate() {
            assert_eq!(lesson.order, i as u32 + 1);
        }
        let counts: Vec<(usize, usize)> = lessons
            .iter()
            .map(|l| {
                let vocab = l
                    .content_items
                    .iter()
                    .filter(|i| i.kind == ContentKind::Vocabulary)
                    .count();
                let sentences = l
                    .content_items
                    .iter()
                    .filter(|i| i.kind == ContentKind::Sentence)
                    .count();
                (vocab, sentences)
            })
            .collect();
        assert_eq!(counts, vec![(5, 5), (5, 5), (5, 5), (15, 5)]);
    }

    #[test]
    fn positions_are_sequential_from_one() {
        let scenario = scenario_with(30, 20);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let lessons = partition_scenario(&scenario, &LessonPlan::standard_course(), &mut rng);

        for lesson in &lessons {
            let positions: Vec<u32> =
                lesson.content_items.iter().map(|i| i.position).collect();
            let expected: Vec<u32> = (1..=lesson.content_items.len() as u32).collect();
            assert_eq!(positions, expected);
        }
    }

    #[test]
    fn exhausted_pool_yields_short_lessons() {
        // 7 words and 3 sentences against plans asking for 30 and 20.
        let scenario = scenario_with(7, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let lessons = partition_scenario(&scenario, &LessonPlan::standard_course(), &mut rng);

        assert_eq!(lessons.len(), 4);
        let total_vocab: usize = lessons
            .iter()
            .flat_map(|l| &l.content_items)
            .filter(|i| i.kind == ContentKind::Vocabulary)
            .count();
        let total_sentences: usize = lessons
            .iter()
            .flat_map(|l| &l.content_items)
            .filter(|i| i.kind == ContentKind::Sentence)
            .count();
        assert_eq!(total_vocab, 7);
        assert_eq!(total_sentences, 3);
        // Lesson 4 gets nothing once the pool is dry.
        assert!(lessons[3].content_items.is_empty());
    }

    #[test]
    fn vocabulary_game_restrictions_follow_the_plan() {
        let scenario = scenario_with(30, 20);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let lessons = partition_scenario(&scenario, &LessonPlan::standard_course(), &mut rng);

        for item in lessons[0]
            .content_items
            .iter()
            .filter(|i| i.kind == ContentKind::Vocabulary)
        {
            assert_eq!(
                item.allowed_games,
                vec![GameType::Mahjong, GameType::WordSprint]
            );
        }
        for item in lessons[3]
            .content_items
            .iter()
            .filter(|i| i.kind == ContentKind::Vocabulary)
        {
            assert_eq!(item.allowed_games, vec![GameType::Mahjong]);
        }
        for item in lessons[0]
            .content_items
            .iter()
            .filter(|i| i.kind == ContentKind::Sentence)
        {
            assert_eq!(item.allowed_games, SENTENCE_GAMES.to_vec());
        }
    }

    #[test]
    fn selection_is_independent_of_the_shuffle_seed() {
        let scenario = scenario_with(30, 20);
        let mut rng_a = ChaCha8Rng::seed_from_u64(1);
        let mut rng_b = ChaCha8Rng::seed_from_u64(2);
        let a = partition_scenario(&scenario, &LessonPlan::standard_course(), &mut rng_a);
        let b = partition_scenario(&scenario, &LessonPlan::standard_course(), &mut rng_b);

        for (lesson_a, lesson_b) in a.iter().zip(&b) {
            let hashes_a: BTreeSet<_> =
                lesson_a.content_items.iter().map(|i| &i.hash).collect();
            let hashes_b: BTreeSet<_> =
                lesson_b.content_items.iter().map(|i| &i.hash).collect();
            assert_eq!(hashes_a, hashes_b);
        }
    }
}
