use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::time::Instant;
use tracing::{error, info};

use super::AppState;
use crate::core::errors::{ApiError, CurrencyError, PipelineError, SpeechError, TranslationError};
use crate::core::types::{
    CaptureSource, CapturedImage, ConvertRequest, ConvertResponse, CycleReport, PipelineResult,
    SampleRequest, SpeakRequest, SpeakResponse, TranslateRequest, TranslationResult,
    UploadResponse,
};
use crate::services::phrasebook::Phrases;
use crate::services::translation::AUTO_DETECT;
use crate::utils::is_image_filename;

type ApiResult<T> = Result<T, ApiError>;

/// Session used when the client does not name one
const DEFAULT_SESSION: &str = "default";

pub async fn root() -> &'static str {
    "Tourist Translator Backend is running!"
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
pub async fn stats_endpoint(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    serde_json::to_value(state.metrics.snapshot())
        .map(Json)
        .map_err(|e| ApiError::internal(format!("Failed to serialize metrics: {}", e)))
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// `POST /api/translate`
pub async fn translate(
    State(state): State<AppState>,
    Json(req): Json<TranslateRequest>,
) -> ApiResult<Json<TranslationResult>> {
    state.metrics.record_endpoint_request("/api/translate");

    let text = required(req.text).ok_or(TranslationError::MissingField("text"))?;
    let to = required(req.to_lang).ok_or(TranslationError::MissingField("toLang"))?;
    let from = required(req.from_lang).unwrap_or_else(|| AUTO_DETECT.to_string());

    let result = state.translator.translate(&text, &from, &to).await?;
    Ok(Json(result))
}

/// `POST /api/translate/speak`
pub async fn speak(
    State(state): State<AppState>,
    Json(req): Json<SpeakRequest>,
) -> ApiResult<Json<SpeakResponse>> {
    state.metrics.record_endpoint_request("/api/translate/speak");

    let (text, lang) = match (required(req.text), required(req.lang)) {
        (Some(text), Some(lang)) => (text, lang),
        _ => return Err(SpeechError::MissingFields.into()),
    };

    let audio = state.speech.speak(&text, &lang).await?;
    Ok(Json(SpeakResponse { audio }))
}

/// `POST /api/currency/convert`
pub async fn convert_currency(
    State(state): State<AppState>,
    Json(req): Json<ConvertRequest>,
) -> ApiResult<Json<ConvertResponse>> {
    state.metrics.record_endpoint_request("/api/currency/convert");

    let (from, to, amount) = match (required(req.from), required(req.to), req.amount) {
        (Some(from), Some(to), Some(amount)) if amount != 0.0 => (from, to, amount),
        _ => return Err(CurrencyError::MissingFields.into()),
    };

    let result = state.currency.convert(&from, &to, amount).await?;
    Ok(Json(ConvertResponse { result }))
}

pub async fn all_phrases(State(state): State<AppState>) -> ApiResult<Json<Phrases>> {
    state.metrics.record_endpoint_request("/api/phrases");
    Ok(Json(state.phrases.all().await?))
}

pub async fn phrase_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.metrics.record_endpoint_request("/api/phrases/:category");
    Ok(Json(state.phrases.category(&category).await?))
}

pub async fn phrase_audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    state.metrics.record_endpoint_request("/api/phrases/audio/:filename");
    let clip = state.phrases.audio(&filename).await?;
    Ok(([(header::CONTENT_TYPE, clip.content_type)], clip.bytes).into_response())
}

/// Uploaded file pulled out of a multipart form
struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

/// Multipart fields accepted by the OCR endpoints
#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    to_lang: Option<String>,
    session: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Read error: {}", e)))?;
                form.file = Some(UploadedFile {
                    filename,
                    bytes: data.to_vec(),
                });
            }
            "toLang" | "session" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Read error: {}", e)))?;
                if name == "toLang" {
                    form.to_lang = required(Some(value));
                } else {
                    form.session = required(Some(value));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// `POST /api/ocr/upload`: plain text extraction
pub async fn ocr_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    state.metrics.record_endpoint_request("/api/ocr/upload");

    let file = read_upload_form(multipart)
        .await?
        .file
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    if !is_image_filename(&file.filename) {
        return Ok(Json(UploadResponse::NotAnImage {
            message: "File received (not an image, OCR not run)".to_string(),
            filename: uuid::Uuid::new_v4().simple().to_string(),
            originalname: file.filename,
        }));
    }

    let start = Instant::now();
    let document = state
        .recognizer
        .recognize(&file.bytes, &state.config.ocr.language)
        .await
        .map_err(|e| {
            error!("OCR failed for {}: {}", file.filename, e);
            ApiError::from(e)
        })?;

    info!(
        "OCR of {} finished in {:.2}s ({} words)",
        file.filename,
        start.elapsed().as_secs_f64(),
        document.words.len()
    );
    Ok(Json(UploadResponse::Text {
        text: document.full_text,
    }))
}

/// `POST /api/ocr/overlay`: full recognize/translate/align cycle on an upload
pub async fn overlay_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<CycleReport>> {
    state.metrics.record_endpoint_request("/api/ocr/overlay");

    let form = read_upload_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let to_lang = form
        .to_lang
        .ok_or_else(|| ApiError::from(TranslationError::MissingField("toLang")))?;

    let image = CapturedImage::new(file.bytes, CaptureSource::Upload);
    Ok(Json(run_overlay_cycle(&state, form.session, image, &to_lang).await))
}

/// `POST /api/ocr/sample`: same cycle on the bundled sample image
pub async fn overlay_sample(
    State(state): State<AppState>,
    Json(req): Json<SampleRequest>,
) -> ApiResult<Json<CycleReport>> {
    state.metrics.record_endpoint_request("/api/ocr/sample");

    let to_lang =
        required(req.to_lang).ok_or_else(|| ApiError::from(TranslationError::MissingField("toLang")))?;

    let path = &state.config.data.sample_image_path;
    let bytes = tokio::fs::read(path).await.map_err(|source| {
        error!("Sample image unavailable at {}: {}", path.display(), source);
        PipelineError::SampleUnavailable {
            path: path.display().to_string(),
            source,
        }
    })?;

    let image = CapturedImage::new(bytes, CaptureSource::Sample);
    Ok(Json(
        run_overlay_cycle(&state, required(req.session), image, &to_lang).await,
    ))
}

async fn run_overlay_cycle(
    state: &AppState,
    session: Option<String>,
    image: CapturedImage,
    to_lang: &str,
) -> CycleReport {
    let session = session.unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let coordinator = state.sessions.get_or_create(&session);
    state
        .pipeline
        .run_cycle(&session, &coordinator, image, to_lang)
        .await
}

/// `GET /api/ocr/overlay/:session`: the session's last applied result
pub async fn overlay_current(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> ApiResult<Json<CycleReport>> {
    state.metrics.record_endpoint_request("/api/ocr/overlay/:session");

    let (cycle, result): (_, PipelineResult) = state
        .sessions
        .get(&session)
        .and_then(|c| c.current())
        .ok_or_else(|| ApiError::not_found(format!("No overlay for session '{}'", session)))?;

    Ok(Json(CycleReport {
        session,
        cycle,
        applied: true,
        result,
    }))
}
