// Main entry point for the tourist assistance backend

use tourist_assist::{
    api::{self, AppState},
    core::Config,
    utils::Metrics,
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let level = match config.log_level() {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    };
    let filter = EnvFilter::new(format!("tourist_assist={},tower_http={}", level, level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== TOURIST ASSIST BACKEND ===");
    info!(
        "OCR: {} (lang={}) | Translation: {} | Cache: {} entries",
        config.ocr.tesseract_path,
        config.ocr.language,
        config.upstream.libretranslate_url,
        config.cache.translation_entries
    );

    let metrics = Metrics::new();
    let state = AppState::from_config(config.clone(), metrics)?;
    let app = api::router(state);

    let addr = config.server_addr();
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                             - Root endpoint");
    info!("  GET  /health                       - Health check");
    info!("  GET  /metrics                      - Prometheus metrics");
    info!("  GET  /stats                        - Detailed statistics");
    info!("  POST /api/translate                - Translate text");
    info!("  POST /api/translate/speak          - Text to speech");
    info!("  POST /api/ocr/upload               - OCR an uploaded file");
    info!("  POST /api/ocr/overlay              - Overlay translation of an upload");
    info!("  POST /api/ocr/sample               - Overlay translation of the sample image");
    info!("  GET  /api/ocr/overlay/:session     - Last overlay for a session");
    info!("  GET  /api/phrases[/:category]      - Phrasebook");
    info!("  GET  /api/phrases/audio/:filename  - Phrase audio");
    info!("  POST /api/currency/convert         - Currency conversion");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
