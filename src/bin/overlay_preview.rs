//! Run the overlay pipeline once on a local image with the real services
//! Run with: cargo run --release --bin overlay_preview -- <image_path> [target_lang]

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use tourist_assist::{
    api::AppState,
    core::{types::CaptureSource, CapturedImage, Config, PipelineResult},
    utils::Metrics,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("tourist_assist=debug")
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    let image_path = args
        .get(1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| config.data.sample_image_path.display().to_string());
    let to_lang = args.get(2).map(|s| s.as_str()).unwrap_or("en");

    if !Path::new(&image_path).exists() {
        bail!("Image not found: {}", image_path);
    }

    info!("Loading image: {}", image_path);
    let bytes = std::fs::read(&image_path).with_context(|| format!("Failed to read {}", image_path))?;

    let state = AppState::from_config(config, Metrics::new())?;
    let image = CapturedImage::new(bytes, CaptureSource::Upload);
    let result = state.pipeline.process_image(&image, to_lang).await;

    println!("\n=== Result: {} ===", result.label());
    match &result {
        PipelineResult::Success {
            full_text,
            translated_text,
            image_size,
            overlay_words,
            ..
        } => {
            println!("Image: {}x{}", image_size.width, image_size.height);
            println!("Recognized:\n  {}", full_text.replace('\n', "\n  "));
            println!("Translated:\n  {}", translated_text);
            println!("Overlays:");
            for (i, word) in overlay_words.iter().enumerate() {
                println!(
                    "  {:>3}. ({:>4},{:>4})-({:>4},{:>4})  {:.1}%,{:.1}%  {}",
                    i + 1,
                    word.bbox.x0,
                    word.bbox.y0,
                    word.bbox.x1,
                    word.bbox.y1,
                    word.placement.left,
                    word.placement.top,
                    if word.label.is_empty() { "(empty)" } else { &word.label }
                );
            }
        }
        PipelineResult::Empty { .. } => println!("  (no text recognized)"),
        PipelineResult::RecognitionFailed { error } => println!("  {}", error),
        PipelineResult::TranslationFailed {
            full_text, error, ..
        } => {
            println!("  {}", error);
            println!("Recognized:\n  {}", full_text.replace('\n', "\n  "));
        }
    }

    Ok(())
}
