pub mod cache;
pub mod libre_translate;

use async_trait::async_trait;

use crate::core::errors::TranslationError;
use crate::core::types::TranslationResult;

pub use cache::{CachedTranslator, TranslationCache};
pub use libre_translate::LibreTranslateClient;

/// Source language value that asks the upstream to detect the language
pub const AUTO_DETECT: &str = "auto";

/// Text translation backend
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslationResult, TranslationError>;
}
