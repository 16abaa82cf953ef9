// Static phrasebook and its pre-recorded audio clips

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::PhraseError;

/// Category name -> phrase entries, served exactly as stored on disk
pub type Phrases = Map<String, Value>;

/// Audio clip read from disk
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Reads the phrasebook from disk on every request so edits show up without a restart
#[derive(Debug, Clone)]
pub struct PhraseBook {
    phrases_path: PathBuf,
    audio_dir: PathBuf,
}

impl PhraseBook {
    pub fn new(config: &Config) -> Self {
        Self::with_paths(&config.data.phrases_path, &config.data.audio_dir)
    }

    pub fn with_paths(phrases_path: impl AsRef<Path>, audio_dir: impl AsRef<Path>) -> Self {
        Self {
            phrases_path: phrases_path.as_ref().to_path_buf(),
            audio_dir: audio_dir.as_ref().to_path_buf(),
        }
    }

    #[instrument(skip(self))]
    pub async fn all(&self) -> Result<Phrases, PhraseError> {
        let raw = tokio::fs::read_to_string(&self.phrases_path)
            .await
            .map_err(|source| {
                warn!("Failed to read phrasebook: {}", source);
                PhraseError::ReadFailed {
                    path: self.phrases_path.display().to_string(),
                    source,
                }
            })?;

        let phrases: Phrases = serde_json::from_str(&raw)?;
        debug!("Loaded {} phrase categories", phrases.len());
        Ok(phrases)
    }

    pub async fn category(&self, name: &str) -> Result<Value, PhraseError> {
        let mut phrases = self.all().await?;
        phrases
            .remove(name)
            .ok_or_else(|| PhraseError::CategoryNotFound(name.to_string()))
    }

    /// Load an audio clip. Anything that could leave the audio directory is treated as missing.
    #[instrument(skip(self))]
    pub async fn audio(&self, filename: &str) -> Result<AudioClip, PhraseError> {
        if !is_plain_filename(filename) {
            warn!("Rejected audio path outside the audio directory");
            return Err(PhraseError::AudioNotFound);
        }

        let path = self.audio_dir.join(filename);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| PhraseError::AudioNotFound)?;

        Ok(AudioClip {
            bytes,
            content_type: content_type_for(filename),
        })
    }
}

fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0')
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASES: &str = r#"{
        "greetings": [
            {"en": "Hello", "hi": "नमस्ते", "audio": {"en": "hello_en.mp3"}},
            {"en": "Thank you", "fr": "Merci"}
        ],
        "emergency": [
            {"en": "Call the police", "es": "Llame a la policía"}
        ]
    }"#;

    fn fixture(name: &str) -> (PathBuf, PhraseBook) {
        let dir = std::env::temp_dir().join(format!(
            "phrasebook-{}-{}",
            name,
            uuid::Uuid::new_v4()
        ));
        let audio = dir.join("audio");
        std::fs::create_dir_all(&audio).unwrap();
        std::fs::write(dir.join("phrases.json"), PHRASES).unwrap();
        std::fs::write(audio.join("hello_en.mp3"), b"ID3fake").unwrap();
        let book = PhraseBook::with_paths(dir.join("phrases.json"), &audio);
        (dir, book)
    }

    #[tokio::test]
    async fn test_all_and_category() {
        let (dir, book) = fixture("all");

        let all = book.all().await.unwrap();
        assert_eq!(all.len(), 2);
        let greetings = &all["greetings"];
        assert_eq!(greetings[0]["hi"], "नमस्ते");
        assert_eq!(greetings[0]["audio"]["en"], "hello_en.mp3");
        assert!(greetings[1].get("audio").is_none());

        let emergency = book.category("emergency").await.unwrap();
        assert_eq!(emergency.as_array().map(Vec::len), Some(1));

        let err = book.category("shopping").await.unwrap_err();
        assert_eq!(err.to_string(), "Category 'shopping' not found");

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_audio_lookup() {
        let (dir, book) = fixture("audio");

        let clip = book.audio("hello_en.mp3").await.unwrap();
        assert_eq!(clip.bytes, b"ID3fake");
        assert_eq!(clip.content_type, "audio/mpeg");

        assert!(matches!(
            book.audio("missing.mp3").await,
            Err(PhraseError::AudioNotFound)
        ));
        assert!(matches!(
            book.audio("../phrases.json").await,
            Err(PhraseError::AudioNotFound)
        ));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_read_failure() {
        let book = PhraseBook::with_paths("/nonexistent/phrases.json", "/nonexistent");
        assert!(matches!(
            book.all().await,
            Err(PhraseError::ReadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_free_form_entries_pass_through() {
        let raw = r#"{
            "emergency": [{"english": "Help!", "audio": "help_en.mp3"}],
            "greetings": [{"english": "Hello", "audio": null, "tags": ["polite"]}],
            "notes": {"updated": "2024-01-01"}
        }"#;
        let dir = std::env::temp_dir().join(format!("phrasebook-loose-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("phrases.json"), raw).unwrap();
        let book = PhraseBook::with_paths(dir.join("phrases.json"), &dir);

        let all = book.all().await.unwrap();
        let expected: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(Value::Object(all), expected);

        let emergency = book.category("emergency").await.unwrap();
        assert_eq!(emergency[0]["audio"], "help_en.mp3");
        let notes = book.category("notes").await.unwrap();
        assert_eq!(notes["updated"], "2024-01-01");

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_non_object_file_is_rejected() {
        let dir = std::env::temp_dir().join(format!("phrasebook-array-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("phrases.json"), "[1, 2]").unwrap();
        let book = PhraseBook::with_paths(dir.join("phrases.json"), &dir);

        assert!(matches!(book.all().await, Err(PhraseError::Malformed(_))));

        std::fs::remove_dir_all(dir).ok();
    }
}
