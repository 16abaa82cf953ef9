// Text recognition service
//
// The pipeline only depends on the `TextRecognizer` contract; the Tesseract
// engine is one implementation of it.

pub mod tesseract;

use async_trait::async_trait;

use crate::core::errors::RecognitionError;
use crate::core::types::RecognizedDocument;

pub use tesseract::{parse_tsv, TesseractRecognizer};

/// OCR engine producing text plus word-level bounding boxes
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize text in an encoded image (PNG, JPEG, ...)
    async fn recognize(
        &self,
        image: &[u8],
        language: &str,
    ) -> Result<RecognizedDocument, RecognitionError>;

    /// Engine name for logging
    fn name(&self) -> &str;
}
