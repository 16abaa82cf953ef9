use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::Translator;
use crate::core::config::Config;
use crate::core::errors::TranslationError;
use crate::core::types::TranslationResult;
use crate::middleware::CircuitBreaker;
use crate::utils::{Metrics, Upstream};

/// LibreTranslate client with circuit breaker, timeouts, and metrics
pub struct LibreTranslateClient {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Metrics>,
}

#[derive(Debug, Serialize)]
struct TranslateBody<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language: String,
}

/// Mirrors have shipped both `translatedText` and `translated_text`
#[derive(Debug, Deserialize)]
struct TranslateReply {
    #[serde(rename = "translatedText", alias = "translated_text")]
    translated_text: Option<String>,
    #[serde(rename = "detectedLanguage")]
    detected_language: Option<DetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
}

impl LibreTranslateClient {
    pub fn new(
        config: &Config,
        circuit_breaker: CircuitBreaker,
        metrics: Option<Metrics>,
    ) -> Result<Self, TranslationError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            base_url: config.upstream.libretranslate_url.trim_end_matches('/').to_string(),
            api_key: config.upstream.libretranslate_api_key.clone(),
            http_client,
            circuit_breaker,
            metrics,
        })
    }

    async fn send(&self, text: &str, from: &str, to: &str) -> Result<TranslationResult, TranslationError> {
        let body = TranslateBody {
            q: text,
            source: from,
            target: to,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .http_client
            .post(format!("{}/translate", self.base_url))
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorReply>(&raw)
                .map(|e| e.error)
                .unwrap_or(raw);

            if status.as_u16() == 400 && message.to_lowercase().contains("not supported") {
                return Err(TranslationError::UnsupportedLanguage {
                    from: from.to_string(),
                    to: to.to_string(),
                    message,
                });
            }
            return Err(TranslationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        parse_reply(&raw)
    }
}

fn parse_reply(raw: &str) -> Result<TranslationResult, TranslationError> {
    let reply: TranslateReply = serde_json::from_str(raw)
        .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

    let translated_text = reply
        .translated_text
        .ok_or_else(|| TranslationError::InvalidResponse("missing translatedText".to_string()))?;

    Ok(TranslationResult {
        translated_text,
        detected_source_language: reply.detected_language.map(|d| d.language),
    })
}

#[async_trait]
impl Translator for LibreTranslateClient {
    #[instrument(skip(self, text), fields(chars = text.len(), from = from, to = to))]
    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslationResult, TranslationError> {
        if text.trim().is_empty() {
            return Err(TranslationError::EmptyText);
        }
        if to.trim().is_empty() {
            return Err(TranslationError::MissingField("toLang"));
        }
        let from = if from.trim().is_empty() { super::AUTO_DETECT } else { from };

        let start = Instant::now();
        let result = self.circuit_breaker.run(self.send(text, from, to)).await;
        let duration = start.elapsed();

        if let Some(ref m) = self.metrics {
            m.record_upstream_call(Upstream::Translation, result.is_ok(), duration);
        }

        match &result {
            Ok(r) => debug!(
                "Translated {} chars in {}ms (detected: {:?})",
                text.len(),
                duration.as_millis(),
                r.detected_source_language
            ),
            Err(e) => warn!("Translation failed: {}", e),
        }
        result
    }
}
