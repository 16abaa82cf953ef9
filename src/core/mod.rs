pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ApiError, ConfigError, CurrencyError, PhraseError, PipelineError, RecognitionError,
    SpeechError, TranslationError,
};
pub use types::{
    BoundingBox, CaptureSource, CapturedImage, CycleId, ImageSize, OverlayWord, PipelineResult,
    PipelineStage, RecognizedDocument, RecognizedWord, TranslationResult,
};
