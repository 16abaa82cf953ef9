// Error types for every service the backend talks to, plus the HTTP boundary error.
//
// Service errors stay typed all the way to the handlers; `ApiError` is the only
// type that knows about status codes and the `{error}` response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::core::types::CycleId;

/// Text recognition (OCR) errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Image could not be decoded: {0}")]
    UnreadableImage(String),

    #[error("Failed to launch OCR engine '{program}': {source}")]
    EngineUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR engine exited with status {status}: {stderr}")]
    EngineFailed { status: i32, stderr: String },

    #[error("OCR engine timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed OCR output at line {line}: {reason}")]
    MalformedOutput { line: usize, reason: String },

    #[error("OCR service unavailable (circuit open)")]
    CircuitOpen,
}

/// Translation service errors
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Nothing to translate: text is empty")]
    EmptyText,

    #[error("Unsupported language pair {from} -> {to}: {message}")]
    UnsupportedLanguage {
        from: String,
        to: String,
        message: String,
    },

    #[error("Translation request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Translation upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid translation response: {0}")]
    InvalidResponse(String),

    #[error("Translation service unavailable (circuit open)")]
    CircuitOpen,
}

/// Text-to-speech errors
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Missing required fields: text, lang.")]
    MissingFields,

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Speech request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Speech upstream returned {status}")]
    Upstream { status: u16 },

    #[error("Speech upstream returned no audio")]
    EmptyAudio,

    #[error("Speech service unavailable (circuit open)")]
    CircuitOpen,
}

/// Currency conversion errors
#[derive(Debug, Error)]
pub enum CurrencyError {
    #[error("Missing required fields.")]
    MissingFields,

    #[error("Currency request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Currency upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("No rate for {to} in conversion response")]
    ConversionFailed { to: String },

    #[error("Currency service unavailable (circuit open)")]
    CircuitOpen,
}

/// Phrasebook errors
#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("Failed to read phrasebook from {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Phrasebook is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Category '{0}' not found")]
    CategoryNotFound(String),

    #[error("Audio file not found")]
    AudioNotFound,
}

/// Overlay pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A superseded cycle tried to commit. Internal only, never shown to users.
    #[error("Cycle {cycle} superseded by cycle {latest}; result discarded")]
    StaleCycleDiscarded { cycle: CycleId, latest: CycleId },

    #[error("Sample image unavailable at {path}: {source}")]
    SampleUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid video frame: {0}")]
    InvalidFrame(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server config: {0}")]
    InvalidServerConfig(String),

    #[error("Invalid upstream URL for {name}: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("Invalid OCR config: {0}")]
    InvalidOcrConfig(String),

    #[error("{name} must be > 0, got {value}")]
    NonPositive { name: &'static str, value: u64 },
}

/// Error returned from HTTP handlers
///
/// Serializes as `{"error": ..., "details": ...}` with the matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            details: self.details.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TranslationError> for ApiError {
    fn from(err: TranslationError) -> Self {
        match err {
            TranslationError::MissingField(_) | TranslationError::EmptyText => {
                ApiError::bad_request(err.to_string())
            }
            TranslationError::UnsupportedLanguage { .. } => ApiError::bad_request(err.to_string()),
            TranslationError::CircuitOpen => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Translation failed.")
                    .with_details(err.to_string())
            }
            _ => ApiError::internal("Translation failed.").with_details(err.to_string()),
        }
    }
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::MissingFields => ApiError::bad_request(err.to_string()),
            SpeechError::UnsupportedLanguage(_) => ApiError::bad_request("Unsupported language"),
            SpeechError::CircuitOpen => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "TTS failed.")
                    .with_details(err.to_string())
            }
            _ => ApiError::internal("TTS failed.").with_details(err.to_string()),
        }
    }
}

impl From<CurrencyError> for ApiError {
    fn from(err: CurrencyError) -> Self {
        match err {
            CurrencyError::MissingFields => ApiError::bad_request(err.to_string()),
            CurrencyError::ConversionFailed { .. } => ApiError::internal("Conversion failed."),
            _ => ApiError::internal("Error fetching conversion rate.").with_details(err.to_string()),
        }
    }
}

impl From<PhraseError> for ApiError {
    fn from(err: PhraseError) -> Self {
        match err {
            PhraseError::CategoryNotFound(_) | PhraseError::AudioNotFound => {
                ApiError::not_found(err.to_string())
            }
            PhraseError::ReadFailed { .. } | PhraseError::Malformed(_) => {
                ApiError::internal("Failed to load phrases data").with_details(err.to_string())
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidFrame(_) => ApiError::bad_request(err.to_string()),
            PipelineError::SampleUnavailable { .. } => {
                ApiError::internal("Sample image unavailable").with_details(err.to_string())
            }
            // Never reaches a client; stale results are dropped before responding
            PipelineError::StaleCycleDiscarded { .. } => ApiError::internal(err.to_string()),
        }
    }
}

impl From<RecognitionError> for ApiError {
    fn from(err: RecognitionError) -> Self {
        ApiError::internal("OCR failed").with_details(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_translation_fields_are_client_errors() {
        let api: ApiError = TranslationError::MissingField("text").into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);

        let api: ApiError = TranslationError::Upstream {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message(), "Translation failed.");
    }

    #[test]
    fn test_phrase_errors_map_to_not_found() {
        let api: ApiError = PhraseError::CategoryNotFound("food".into()).into();
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
        assert_eq!(api.message(), "Category 'food' not found");
    }

    #[test]
    fn test_unsupported_speech_language_message() {
        let api: ApiError = SpeechError::UnsupportedLanguage("xx".into()).into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.message(), "Unsupported language");
    }
}
