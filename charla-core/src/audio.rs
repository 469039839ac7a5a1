//! Content-addressed audio: synthesize once, serve from the object store
//! forever after.

use async_trait::async_trait;

use crate::error::{StoreError, SynthesisError};
use crate::hashing::content_hash;
use crate::{CoreError, Language};

#[async_trait]
pub trait TextToSpeechGateway: Send + Sync {
    async fn synthesize(&self, text: &str, language: Language)
    -> Result<Vec<u8>, SynthesisError>;
}

/// Content-addressed blob storage for synthesized audio, keyed by
/// (hash, language). `put` overwrites; the last writer wins.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str, language: Language) -> Result<bool, StoreError>;
    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &str,
        language: Language,
    ) -> Result<String, StoreError>;
    /// The URL an existing object is served from. Derivable from the key;
    /// performs no I/O.
    fn url_for(&self, key: &str, language: Language) -> String;
}

pub struct AudioCache<T, O> {
    tts: T,
    store: O,
}

impl<T: TextToSpeechGateway, O: ObjectStore> AudioCache<T, O> {
    pub fn new(tts: T, store: O) -> Self {
        Self { tts, store }
    }

    /// Return a playable URL for (text, language), synthesizing and storing
    /// the audio only on a cache miss.
    ///
    /// Idempotent by construction rather than by locking: two concurrent
    /// misses for the same key both synthesize, and the second upload
    /// overwrites the first with semantically identical audio. A synthesis
    /// failure propagates with nothing written, so the store never holds a
    /// partial entry.
    pub async fn get_audio_url(
        &self,
        text: &str,
        language: Language,
    ) -> Result<String, CoreError> {
        let key = content_hash(text, language.as_str());

        match self.store.exists(&key, language).await {
            Ok(true) => return Ok(self.store.url_for(&key, language)),
            Ok(false) => {}
            // Losing playback permanently is worse than a redundant
            // synthesis call, so a failed existence check counts as a miss.
            Err(e) => log::warn!("audio existence check failed for {key}, regenerating: {e}"),
        }

        let bytes = self.tts.synthesize(text, language).await?;
        let url = self.store.put(bytes, &key, language).await?;
        Ok(url)
    }

    /// Warm the cache for a batch of items concurrently. Failures are
    /// logged and counted, never fatal; the duplicate-generation race noted
    /// on [`Self::get_audio_url`] applies.
    pub async fn prewarm<I>(&self, items: I) -> PrewarmOutcome
    where
        I: IntoIterator<Item = (String, Language)>,
    {
        let results = futures::future::join_all(items.into_iter().map(|(text, language)| {
            async move {
                self.get_audio_url(&text, language)
                    .await
                    .map_err(|e| (text, e))
            }
        }))
        .await;

        let mut outcome = PrewarmOutcome::default();
        for result in results {
            match result {
                Ok(_) => outcome.warmed += 1,
                Err((text, e)) => {
                    log::warn!("audio prewarm failed for \"{text}\": {e}");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PrewarmOutcome {
    pub warmed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CountingTts, MemoryObjectStore};

    #[tokio::test]
    async fn second_lookup_skips_synthesis() {
        let cache = AudioCache::new(CountingTts::default(), MemoryObjectStore::default());

        let first = cache
            .get_audio_url("la cuenta", Language::Spanish)
            .await
            .unwrap();
        let second = cache
            .get_audio_url("la cuenta", Language::Spanish)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.tts.calls(), 1);
    }

    #[tokio::test]
    async fn casing_variants_share_one_entry() {
        let cache = AudioCache::new(CountingTts::default(), MemoryObjectStore::default());

        cache
            .get_audio_url(" La Cuenta ", Language::Spanish)
            .await
            .unwrap();
        cache
            .get_audio_url("la cuenta", Language::Spanish)
            .await
            .unwrap();

        assert_eq!(cache.tts.calls(), 1);
    }

    #[tokio::test]
    async fn synthesis_failure_writes_nothing() {
        let cache = AudioCache::new(
            CountingTts::failing(),
            MemoryObjectStore::default(),
        );

        let err = cache
            .get_audio_url("la cuenta", Language::Spanish)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Synthesis(_)));
        assert_eq!(cache.store.len(), 0);
    }

    #[tokio::test]
    async fn failed_existence_check_regenerates() {
        let store = MemoryObjectStore::default();
        store.fail_exists_once();
        let cache = AudioCache::new(CountingTts::default(), store);

        let url = cache
            .get_audio_url("la cuenta", Language::Spanish)
            .await
            .unwrap();
        assert!(!url.is_empty());
        assert_eq!(cache.tts.calls(), 1);
        assert_eq!(cache.store.len(), 1);
    }

    #[tokio::test]
    async fn prewarm_counts_failures_without_aborting() {
        let cache = AudioCache::new(CountingTts::default(), MemoryObjectStore::default());
        let outcome = cache
            .prewarm(vec![
                ("hola".to_string(), Language::Spanish),
                ("adiós".to_string(), Language::Spanish),
            ])
            .await;
        assert_eq!(outcome, PrewarmOutcome { warmed: 2, failed: 0 });
    }
}
