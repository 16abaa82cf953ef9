// Domain types for the overlay pipeline and the HTTP request/response shapes

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// Monotonically increasing identifier of one capture cycle
pub type CycleId = u64;

/// Word bounding box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    /// Build a box, swapping corners if needed so that `x0 <= x1` and `y0 <= y1`
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Build from a left/top/width/height rectangle
    pub fn from_rect(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self::new(
            left,
            top,
            left.saturating_add(width),
            top.saturating_add(height),
        )
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

/// One word as produced by the recognizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// Recognizer output for a single capture
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedDocument {
    pub full_text: String,
    /// Reading order as produced by the engine
    pub words: Vec<RecognizedWord>,
}

impl RecognizedDocument {
    pub fn is_blank(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}

/// Translation of one recognized document (or one request)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub translated_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_source_language: Option<String>,
}

/// Native pixel dimensions of a captured image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Box position as percentages of the image, for positional rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A recognized word box paired with its positional translation label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayWord {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub label: String,
    pub placement: Placement,
}

/// Where a capture came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureSource {
    Camera,
    Upload,
    Sample,
}

/// Still raster image handed to the pipeline
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub bytes: Arc<Vec<u8>>,
    pub source: CaptureSource,
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>, source: CaptureSource) -> Self {
        Self {
            bytes: Arc::new(bytes),
            source,
        }
    }
}

/// Raw RGBA video frame at the video's native resolution
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Stage of one capture cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    Idle,
    Capturing,
    Recognizing,
    Translating,
    Ready,
    RecognitionFailed,
    TranslationFailed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStage::Ready | PipelineStage::RecognitionFailed | PipelineStage::TranslationFailed
        )
    }
}

/// Outcome of one pass through the overlay pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PipelineResult {
    Success {
        full_text: String,
        translated_text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detected_source_language: Option<String>,
        image_size: ImageSize,
        overlay_words: Vec<OverlayWord>,
    },
    /// Recognition found no text, so nothing was translated
    Empty { full_text: String },
    RecognitionFailed { error: String },
    /// Recognition output is kept even though translation failed
    TranslationFailed {
        full_text: String,
        words: Vec<RecognizedWord>,
        error: String,
    },
}

impl PipelineResult {
    /// Terminal stage this result leaves the cycle in
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineResult::Success { .. } | PipelineResult::Empty { .. } => PipelineStage::Ready,
            PipelineResult::RecognitionFailed { .. } => PipelineStage::RecognitionFailed,
            PipelineResult::TranslationFailed { .. } => PipelineStage::TranslationFailed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineResult::Success { .. } => "success",
            PipelineResult::Empty { .. } => "empty",
            PipelineResult::RecognitionFailed { .. } => "recognition_failed",
            PipelineResult::TranslationFailed { .. } => "translation_failed",
        }
    }

    pub fn overlay_words(&self) -> &[OverlayWord] {
        match self {
            PipelineResult::Success { overlay_words, .. } => overlay_words,
            _ => &[],
        }
    }
}

/// Pipeline result tagged with the cycle that produced it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub session: String,
    pub cycle: CycleId,
    /// False when a newer cycle had already started, so this result was not applied
    pub applied: bool,
    pub result: PipelineResult,
}

/// `POST /api/translate`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub from_lang: Option<String>,
    pub to_lang: Option<String>,
}

/// `POST /api/translate/speak`
#[derive(Debug, Clone, Deserialize)]
pub struct SpeakRequest {
    pub text: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakResponse {
    /// Base64-encoded MP3
    pub audio: String,
}

/// `POST /api/currency/convert`
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertResponse {
    pub result: f64,
}

/// `POST /api/ocr/upload` response
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Text {
        text: String,
    },
    NotAnImage {
        message: String,
        filename: String,
        originalname: String,
    },
}

/// `POST /api/ocr/sample`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRequest {
    pub to_lang: Option<String>,
    pub session: Option<String>,
}

/// Accept the amount as a JSON number or a numeric string
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}
