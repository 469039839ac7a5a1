//! Curriculum generation: prompt construction, the language-model gateway
//! contract, and the best-effort parser for the model's line format.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::hashing::content_hash;
use crate::{Language, SentenceItem, VocabularyItem};

/// Text completion from a prompt. Implementations own their own wire
/// format and credentials; failures are not retried here.
#[async_trait]
pub trait LanguageModelGateway: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Clone, Copy, Debug)]
pub struct GenerationConfig {
    pub vocabulary_count: usize,
    pub sentence_count: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            vocabulary_count: 30,
            sentence_count: 20,
        }
    }
}

/// Outcome of parsing one completion. `skipped_lines` counts lines that sat
/// in an active section but could not be turned into an item, so tests can
/// assert tolerance without treating a partial parse as an error.
#[derive(Clone, Debug, Default)]
pub struct ParsedContent {
    pub vocabulary: Vec<VocabularyItem>,
    pub sentences: Vec<SentenceItem>,
    pub skipped_lines: usize,
}

pub fn lesson_content_prompt(
    language: Language,
    purpose: &str,
    focus: &str,
    config: &GenerationConfig,
) -> String {
    let GenerationConfig {
        vocabulary_count,
        sentence_count,
    } = config;
    format!(
        r#"You are creating {language} learning content for someone who wants to: "{purpose}"
Their specific focus areas are: "{focus}"

Generate exactly {vocabulary_count} vocabulary words and {sentence_count} sentences that are ESSENTIAL for their goals.

WORD REQUIREMENTS:
- {vocabulary_count} words total
- Must be directly relevant to their purpose and focus areas
- Include practical, high-frequency words they'll actually use
- Provide English translation and simple phonetic pronunciation

SENTENCE REQUIREMENTS:
- {sentence_count} sentences total
- Use ONLY the vocabulary words you provided above
- Make sentences practical for their specific scenarios
- Include English translation and phonetic pronunciation
- Keep sentences short and useful

**IMPORTANT: Use this format exactly:**

WORDS:
- palabra1 | [ENGLISH] translation1 | [PHONETIC] pronunciation1
- palabra2 | [ENGLISH] translation2 | [PHONETIC] pronunciation2
...

SENTENCES:
1. sentence 1 | [ENGLISH] translation1 | [PHONETIC] pronunciation1
2. sentence 2 | [ENGLISH] translation2 | [PHONETIC] pronunciation2
...

Make everything relevant to: {purpose} - {focus}"#
    )
}

pub fn clarification_prompt(
    language: Language,
    purpose: &str,
    user_input: &str,
    previous_inputs: &[String],
) -> String {
    let previous = if previous_inputs.is_empty() {
        "None".to_string()
    } else {
        previous_inputs.join(", ")
    };
    format!(
        r#"You're a smart, efficient language tutor helping someone learn {language}.

CONTEXT:
- User wants to learn {language} for: "{purpose}"
- Previous focus areas discussed: {previous}
- User just added: "{user_input}"

YOUR JOB:
1. Acknowledge their new focus area
2. Suggest 2-3 specific sub-areas or situations within this focus
3. Ask if they want to add more focus areas or if they're ready to generate their learning scenario
4. Keep it conversational and encouraging

Keep it brief, specific, and actionable."#
    )
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Vocabulary,
    Sentences,
}

/// Parse the model's semi-structured line format into content items.
///
/// A line containing "WORDS" switches into vocabulary mode and a line
/// containing "SENTENCES" into sentence mode (case-insensitive). Vocabulary
/// lines are dash-prefixed, sentence lines are pipe-delimited with an
/// optional "N." prefix. This is a best-effort parse, not a strict grammar:
/// anything else inside a section is skipped and counted.
pub fn parse_lesson_content(text: &str, language: Language) -> ParsedContent {
    let mut parsed = ParsedContent::default();
    let mut section = Section::None;

    for line in text.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let upper = line.to_uppercase();
        if upper.contains("WORDS") {
            section = Section::Vocabulary;
            continue;
        } else if upper.contains("SENTENCES") {
            section = Section::Sentences;
            continue;
        }

        match section {
            Section::None => {}
            Section::Vocabulary => match parse_item_line(line.strip_prefix('-').unwrap_or(""))
            {
                Some((word, translation, phonetic)) => {
                    let hash =
                        content_hash(&format!("{word}||{translation}"), language.as_str());
                    parsed.vocabulary.push(VocabularyItem {
                        hash,
                        word,
                        translation,
                        phonetic,
                        language,
                    });
                }
                None => parsed.skipped_lines += 1,
            },
            Section::Sentences => match parse_item_line(strip_list_number(line)) {
                Some((sentence, translation, phonetic)) => {
                    let hash =
                        content_hash(&format!("{sentence}||{translation}"), language.as_str());
                    parsed.sentences.push(SentenceItem {
                        hash,
                        sentence,
                        translation,
                        phonetic,
                        language,
                    });
                }
                None => parsed.skipped_lines += 1,
            },
        }
    }

    log::debug!(
        "parsed {} vocabulary items and {} sentences ({} lines skipped)",
        parsed.vocabulary.len(),
        parsed.sentences.len(),
        parsed.skipped_lines
    );
    parsed
}

/// Split a "text | [ENGLISH] translation | [PHONETIC] pronunciation" line.
/// Lines with fewer than two pipe-delimited fields are rejected.
fn parse_item_line(line: &str) -> Option<(String, String, String)> {
    let mut parts = line.split('|');
    let text = parts.next()?.trim();
    let translation = parts.next()?.replace("[ENGLISH]", "").trim().to_string();
    if text.is_empty() || translation.is_empty() {
        return None;
    }
    let phonetic = parts
        .next()
        .map(|p| p.replace("[PHONETIC]", "").trim().to_string())
        .unwrap_or_default();
    Some((text.to_string(), translation, phonetic))
}

/// Strip a leading "12." list marker, if present.
fn strip_list_number(line: &str) -> &str {
    let digits = line
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(line.len());
    if digits > 0 && line[digits..].starts_with('.') {
        line[digits + 1..].trim_start()
    } else {
        line
    }
}

/// Turns a learner's goal into a vocabulary and sentence pool with a single
/// gateway call. Purely a transform apart from that one piece of I/O:
/// nothing is persisted here.
pub struct CurriculumGenerator<G> {
    gateway: G,
    config: GenerationConfig,
}

impl<G: LanguageModelGateway> CurriculumGenerator<G> {
    pub fn new(gateway: G, config: GenerationConfig) -> Self {
        Self { gateway, config }
    }

    /// Generate the content pool. A gateway failure or an empty completion
    /// fails the whole generation; a section that parses to zero items is
    /// returned as an empty list, not an error.
    pub async fn generate(
        &self,
        language: Language,
        purpose: &str,
        focus: &str,
    ) -> Result<ParsedContent, GenerationError> {
        let prompt = lesson_content_prompt(language, purpose, focus, &self.config);
        let completion = self.gateway.complete(&prompt).await?;
        if completion.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        Ok(parse_lesson_content(&completion, language))
    }

    pub async fn clarify(
        &self,
        language: Language,
        purpose: &str,
        user_input: &str,
        previous_inputs: &[String],
    ) -> Result<String, GenerationError> {
        let prompt = clarification_prompt(language, purpose, user_input, previous_inputs);
        self.gateway.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
Here is your personalized content.

WORDS:
- hola | [ENGLISH] hello | [PHONETIC] OH-lah
- cuenta | [ENGLISH] bill | [PHONETIC] KWEN-tah
- mesa | [ENGLISH] table
- malformed line without pipes
- | [ENGLISH] orphaned translation

SENTENCES:
1. La cuenta, por favor | [ENGLISH] The bill, please | [PHONETIC] lah KWEN-tah por fah-BOR
2. Una mesa para dos | [ENGLISH] A table for two | [PHONETIC] OO-nah MEH-sah PAH-rah dohs
3. no pipes at all here
"#;

    #[test]
    fn parses_both_sections() {
        let parsed = parse_lesson_content(SAMPLE, Language::Spanish);
        assert_eq!(parsed.vocabulary.len(), 3);
        assert_eq!(parsed.sentences.len(), 2);

        let hola = &parsed.vocabulary[0];
        assert_eq!(hola.word, "hola");
        assert_eq!(hola.translation, "hello");
        assert_eq!(hola.phonetic, "OH-lah");
        assert_eq!(
            hola.hash,
            content_hash("hola||hello", Language::Spanish.as_str())
        );

        // Missing phonetic field is tolerated.
        assert_eq!(parsed.vocabulary[2].phonetic, "");
    }

    #[test]
    fn counts_skipped_lines() {
        let parsed = parse_lesson_content(SAMPLE, Language::Spanish);
        // "malformed line without pipes", the orphaned translation, and the
        // pipeless sentence line.
        assert_eq!(parsed.skipped_lines, 3);
    }

    #[test]
    fn sentence_numbering_is_stripped() {
        let parsed = parse_lesson_content(SAMPLE, Language::Spanish);
        assert_eq!(parsed.sentences[0].sentence, "La cuenta, por favor");
        assert_eq!(parsed.sentences[1].sentence, "Una mesa para dos");
    }

    #[test]
    fn empty_sections_yield_empty_lists() {
        let parsed = parse_lesson_content("nothing useful here", Language::French);
        assert!(parsed.vocabulary.is_empty());
        assert!(parsed.sentences.is_empty());
        assert_eq!(parsed.skipped_lines, 0);
    }

    #[test]
    fn section_headers_are_case_insensitive() {
        let text = "words:\n- oui | [ENGLISH] yes\nsentences:\n1. Oui, merci | [ENGLISH] Yes, thank you";
        let parsed = parse_lesson_content(text, Language::French);
        assert_eq!(parsed.vocabulary.len(), 1);
        assert_eq!(parsed.sentences.len(), 1);
    }

    struct FixedGateway(&'static str);

    #[async_trait]
    impl LanguageModelGateway for FixedGateway {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn empty_completion_is_a_generation_failure() {
        let generator = CurriculumGenerator::new(FixedGateway("   \n"), GenerationConfig::default());
        let err = generator
            .generate(Language::Spanish, "travel", "restaurants")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyCompletion));
    }

    #[tokio::test]
    async fn generate_parses_the_completion() {
        let generator = CurriculumGenerator::new(FixedGateway(SAMPLE), GenerationConfig::default());
        let parsed = generator
            .generate(Language::Spanish, "travel", "restaurants")
            .await
            .unwrap();
        assert_eq!(parsed.vocabulary.len(), 3);
        assert_eq!(parsed.sentences.len(), 2);
    }
}
