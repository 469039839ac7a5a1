//! Concrete gateway clients: Gemini for text generation, ElevenLabs for
//! speech synthesis, Supabase Storage for content-addressed audio blobs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use charla_core::audio::{ObjectStore, TextToSpeechGateway};
use charla_core::generation::LanguageModelGateway;
use charla_core::{GenerationError, Language, StoreError, SynthesisError};

pub struct GeminiClient {
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiClient {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Ok(Self {
            api_key: std::env::var("GEMINI_API_KEY")?,
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
        })
    }
}

#[async_trait]
impl LanguageModelGateway for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let client = reqwest::Client::new();
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Gateway(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(GenerationError::Gateway(format!(
                "gemini returned {}",
                response.status()
            )));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Gateway(e.to_string()))?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        Ok(text)
    }
}

pub struct ElevenLabsClient {
    api_key: String,
}

#[derive(Serialize)]
struct ElevenLabsRequest {
    text: String,
    model_id: String,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl ElevenLabsClient {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Ok(Self {
            api_key: std::env::var("ELEVENLABS_API_KEY")?,
        })
    }

    fn voice_id(language: Language) -> Option<&'static str> {
        match language {
            Language::French => Some("ohItIVrXTBI80RrUECOD"),
            Language::Spanish => Some("zl1Ut8dvwcVSuQSB9XkG"), // Ninoska
            Language::English => Some("ohItIVrXTBI80RrUECOD"),
            Language::Korean => Some("nbrxrAz3eYm9NgojrmFK"),
            Language::German => Some("IWm8DnJ4NGjFI7QAM5lM"), // Stephan

            Language::Chinese
            | Language::Japanese
            | Language::Russian
            | Language::Portuguese
            | Language::Italian => None,
        }
    }
}

#[async_trait]
impl TextToSpeechGateway for ElevenLabsClient {
    async fn synthesize(
        &self,
        text: &str,
        language: Language,
    ) -> Result<Vec<u8>, SynthesisError> {
        let voice_id = Self::voice_id(language)
            .ok_or(SynthesisError::UnsupportedLanguage(language))?;

        let request = ElevenLabsRequest {
            text: text.to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let client = reqwest::Client::new();
        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{voice_id}");
        let response = client
            .post(&url)
            .header("Accept", "audio/mpeg")
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SynthesisError::Gateway(format!(
                "elevenlabs returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Gateway(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Content-addressed audio bucket on Supabase Storage. Objects live at
/// `{language}/{hash}.mp3` inside a public bucket; uploads upsert, so a
/// concurrent duplicate generation overwrites with identical audio.
pub struct SupabaseStorage {
    supabase_url: String,
    service_role_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Ok(Self {
            supabase_url: std::env::var("SUPABASE_URL")?,
            service_role_key: std::env::var("SUPABASE_SERVICE_ROLE_KEY")?,
            bucket: std::env::var("AUDIO_BUCKET").unwrap_or_else(|_| "audio".to_string()),
        })
    }

    fn object_path(&self, key: &str, language: Language) -> String {
        format!("{language}/{key}.mp3")
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn exists(&self, key: &str, language: Language) -> Result<bool, StoreError> {
        let client = reqwest::Client::new();
        let response = client
            .head(self.url_for(key, language))
            .send()
            .await
            .map_err(|e| StoreError(e.to_string()))?;

        if response.status().is_success() {
            Ok(true)
        } else if response.status() == reqwest::StatusCode::NOT_FOUND
            || response.status() == reqwest::StatusCode::BAD_REQUEST
        {
            Ok(false)
        } else {
            Err(StoreError(format!(
                "storage existence check returned {}",
                response.status()
            )))
        }
    }

    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &str,
        language: Language,
    ) -> Result<String, StoreError> {
        let client = reqwest::Client::new();
        let upload_url = format!(
            "{}/storage/v1/object/{}/{}",
            self.supabase_url,
            self.bucket,
            self.object_path(key, language)
        );
        let response = client
            .post(&upload_url)
            .header("apikey", &self.service_role_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.service_role_key),
            )
            .header("Content-Type", "audio/mpeg")
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StoreError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError(format!(
                "audio upload returned {}",
                response.status()
            )));
        }
        Ok(self.url_for(key, language))
    }

    fn url_for(&self, key: &str, language: Language) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.supabase_url,
            self.bucket,
            self.object_path(key, language)
        )
    }
}
