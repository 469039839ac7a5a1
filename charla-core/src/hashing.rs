//! Content addressing for generated curriculum items and cached audio.

use sha2::{Digest, Sha256};

/// Deterministic fingerprint of a (text, language) pair.
///
/// Both inputs are trimmed and lowercased before hashing, so casing and
/// surrounding whitespace variants collapse to the same key. That collapse
/// is intentional content-addressing: "Hola" and " hola " must share one
/// cached pronunciation.
pub fn content_hash(text: &str, language: &str) -> String {
    let combined = format!(
        "{}-{}",
        text.trim().to_lowercase(),
        language.trim().to_lowercase()
    );
    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    hex::encode(hasher.finalize())
}
