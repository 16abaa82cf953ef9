// HTTP surface: shared state and the router

pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::config::Config;
use crate::middleware::{CircuitBreaker, CircuitBreakerConfig};
use crate::orchestration::{OverlayPipeline, OverlaySessions};
use crate::services::{
    CachedTranslator, CurrencyConverter, FrankfurterClient, GoogleTtsClient, LibreTranslateClient,
    PhraseBook, SpeechSynthesizer, TesseractRecognizer, TextRecognizer, TranslationCache,
    Translator,
};
use crate::utils::Metrics;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub translator: Arc<dyn Translator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub currency: Arc<dyn CurrencyConverter>,
    pub phrases: PhraseBook,
    pub pipeline: Arc<OverlayPipeline>,
    pub sessions: OverlaySessions,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire up the real upstream clients described by `config`
    pub fn from_config(config: Arc<Config>, metrics: Metrics) -> Result<Self> {
        let breaker = |name: &'static str| {
            CircuitBreaker::new(
                name,
                CircuitBreakerConfig {
                    failure_threshold: config.breaker.failure_threshold,
                    open_timeout: config.breaker_timeout(),
                },
                Some(metrics.clone()),
            )
        };

        let recognizer: Arc<dyn TextRecognizer> = Arc::new(TesseractRecognizer::new(
            &config,
            breaker("ocr"),
            Some(metrics.clone()),
        ));

        let libre = LibreTranslateClient::new(&config, breaker("translation"), Some(metrics.clone()))
            .context("Failed to build translation client")?;
        let translator: Arc<dyn Translator> = match NonZeroUsize::new(config.cache.translation_entries) {
            Some(entries) => {
                info!("Translation cache enabled ({} entries)", entries);
                Arc::new(CachedTranslator::new(
                    Arc::new(libre),
                    TranslationCache::new(entries, Some(metrics.clone())),
                ))
            }
            None => Arc::new(libre),
        };

        let speech = GoogleTtsClient::new(&config, breaker("speech"), Some(metrics.clone()))
            .context("Failed to build speech client")?;
        let currency = FrankfurterClient::new(&config, breaker("currency"), Some(metrics.clone()))
            .context("Failed to build currency client")?;

        Ok(Self::new(
            config.clone(),
            recognizer,
            translator,
            Arc::new(speech),
            Arc::new(currency),
            PhraseBook::new(&config),
            metrics,
        ))
    }

    pub fn new(
        config: Arc<Config>,
        recognizer: Arc<dyn TextRecognizer>,
        translator: Arc<dyn Translator>,
        speech: Arc<dyn SpeechSynthesizer>,
        currency: Arc<dyn CurrencyConverter>,
        phrases: PhraseBook,
        metrics: Metrics,
    ) -> Self {
        let pipeline = Arc::new(OverlayPipeline::new(
            recognizer.clone(),
            translator.clone(),
            config.ocr.language.clone(),
            Some(metrics.clone()),
        ));

        Self {
            sessions: OverlaySessions::new(Some(metrics.clone())),
            config,
            recognizer,
            translator,
            speech,
            currency,
            phrases,
            pipeline,
            metrics,
        }
    }
}

/// Build the full router with CORS, request tracing and the upload limit
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/stats", get(handlers::stats_endpoint))
        .route("/api/translate", post(handlers::translate))
        .route("/api/translate/speak", post(handlers::speak))
        .route("/api/ocr/upload", post(handlers::ocr_upload))
        .route("/api/ocr/overlay", post(handlers::overlay_upload))
        .route("/api/ocr/sample", post(handlers::overlay_sample))
        .route("/api/ocr/overlay/:session", get(handlers::overlay_current))
        .route("/api/phrases", get(handlers::all_phrases))
        .route("/api/phrases/:category", get(handlers::phrase_category))
        .route("/api/phrases/audio/:filename", get(handlers::phrase_audio))
        .route("/api/currency/convert", post(handlers::convert_currency))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
