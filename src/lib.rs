// Library exports for the tourist assistance backend
//
// The overlay pipeline (recognize -> translate -> align) lives in `orchestration`
// and `phases`; everything else proxies to external services.

pub mod api;
pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod phases;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{ApiError, PipelineError, RecognitionError, SpeechError, TranslationError},
    types::{
        BoundingBox, CaptureSource, CapturedImage, CycleReport, OverlayWord, PipelineResult,
        PipelineStage, RecognizedDocument, RecognizedWord, TranslationResult,
    },
};

pub use middleware::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use orchestration::{CycleCoordinator, OverlayPipeline, OverlaySessions};

pub use services::{
    CurrencyConverter, PhraseBook, SpeechSynthesizer, TextRecognizer, Translator,
};

pub use utils::{capture_frame, Metrics};
