// Text-to-speech via the public Google Translate TTS endpoint

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::SpeechError;
use crate::middleware::CircuitBreaker;
use crate::utils::{Metrics, Upstream};

/// The endpoint rejects longer inputs
const MAX_CHUNK_CHARS: usize = 200;

/// Speech synthesis backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and return base64-encoded MP3
    async fn speak(&self, text: &str, lang: &str) -> Result<String, SpeechError>;
}

pub struct GoogleTtsClient {
    url: String,
    languages: Vec<String>,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Metrics>,
}

impl GoogleTtsClient {
    pub fn new(
        config: &Config,
        circuit_breaker: CircuitBreaker,
        metrics: Option<Metrics>,
    ) -> Result<Self, SpeechError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (tourist-assist)")
            .build()?;

        Ok(Self {
            url: config.upstream.tts_url.clone(),
            languages: config.upstream.tts_languages.clone(),
            http_client,
            circuit_breaker,
            metrics,
        })
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(lang))
    }

    async fn fetch_chunk(&self, chunk: &str, lang: &str, idx: usize, total: usize) -> Result<Vec<u8>, SpeechError> {
        let total_s = total.to_string();
        let idx_s = idx.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .http_client
            .get(&self.url)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", lang),
                ("total", total_s.as_str()),
                ("idx", idx_s.as_str()),
                ("textlen", textlen.as_str()),
                ("client", "tw-ob"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Upstream {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        Ok(bytes.to_vec())
    }

    async fn synthesize(&self, text: &str, lang: &str) -> Result<String, SpeechError> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, lang, idx, chunks.len()).await?);
        }
        // MP3 frames are self-delimiting, so chunk bodies concatenate into one stream
        Ok(general_purpose::STANDARD.encode(audio))
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsClient {
    #[instrument(skip(self, text), fields(chars = text.len(), lang = lang))]
    async fn speak(&self, text: &str, lang: &str) -> Result<String, SpeechError> {
        if text.trim().is_empty() || lang.trim().is_empty() {
            return Err(SpeechError::MissingFields);
        }
        if !self.supports(lang) {
            return Err(SpeechError::UnsupportedLanguage(lang.to_string()));
        }

        let start = Instant::now();
        let result = self.circuit_breaker.run(self.synthesize(text, lang)).await;

        if let Some(ref m) = self.metrics {
            m.record_upstream_call(Upstream::Speech, result.is_ok(), start.elapsed());
        }
        match &result {
            Ok(audio) => debug!("Synthesized {} base64 bytes", audio.len()),
            Err(e) => warn!("TTS error: {}", e),
        }
        result
    }
}

/// Split at whitespace into pieces of at most `max_chars` characters.
///
/// A single word longer than the limit is hard-split on character boundaries.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
