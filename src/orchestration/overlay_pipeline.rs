// Overlay pipeline: recognize -> translate -> align, one capture at a time

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{
    CapturedImage, CycleReport, PipelineResult, PipelineStage,
};
use crate::orchestration::cycle::CycleCoordinator;
use crate::phases::alignment::align;
use crate::services::ocr::TextRecognizer;
use crate::services::translation::{Translator, AUTO_DETECT};
use crate::utils::{decode_dimensions_async, Metrics};

/// Turns one raw image into positioned translation overlays.
///
/// Each stage that depends on a network call can fail on its own; failures end
/// the cycle with a tagged result instead of an error, and output from earlier
/// stages is kept. Nothing is retried.
pub struct OverlayPipeline {
    recognizer: Arc<dyn TextRecognizer>,
    translator: Arc<dyn Translator>,
    ocr_language: String,
    metrics: Option<Metrics>,
}

impl OverlayPipeline {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        translator: Arc<dyn Translator>,
        ocr_language: impl Into<String>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            recognizer,
            translator,
            ocr_language: ocr_language.into(),
            metrics,
        }
    }

    /// Run the full pipeline on `image`, translating into `to_lang`
    pub async fn process_image(&self, image: &CapturedImage, to_lang: &str) -> PipelineResult {
        self.process_with_progress(image, to_lang, |_| {}).await
    }

    /// Run one cycle for `coordinator` and commit its result.
    ///
    /// The report says whether the result was applied; a cycle superseded while
    /// it was in flight still returns its result, it just never reaches shared state.
    #[instrument(skip(self, coordinator, image), fields(source = ?image.source, to = to_lang))]
    pub async fn run_cycle(
        &self,
        session: &str,
        coordinator: &CycleCoordinator,
        image: CapturedImage,
        to_lang: &str,
    ) -> CycleReport {
        let cycle = coordinator.begin();
        let result = self
            .process_with_progress(&image, to_lang, |stage| {
                coordinator.advance(cycle, stage);
            })
            .await;

        let applied = match coordinator.commit(cycle, result.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!("{}", e);
                false
            }
        };

        CycleReport {
            session: session.to_string(),
            cycle,
            applied,
            result,
        }
    }

    async fn process_with_progress<F>(
        &self,
        image: &CapturedImage,
        to_lang: &str,
        on_stage: F,
    ) -> PipelineResult
    where
        F: Fn(PipelineStage),
    {
        let start = Instant::now();
        on_stage(PipelineStage::Recognizing);

        let result = self.run_stages(image, to_lang, &on_stage).await;
        on_stage(result.stage());

        if let Some(ref m) = self.metrics {
            m.record_cycle_outcome(&result);
        }
        info!(
            "Overlay pipeline finished: {} ({} overlays) in {:.0}ms",
            result.label(),
            result.overlay_words().len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        result
    }

    async fn run_stages<F>(&self, image: &CapturedImage, to_lang: &str, on_stage: &F) -> PipelineResult
    where
        F: Fn(PipelineStage),
    {
        // Step 1: recognition
        let image_size = match decode_dimensions_async(image.bytes.clone()).await {
            Ok(size) => size,
            Err(e) => {
                warn!("Capture is not a readable image: {}", e);
                return PipelineResult::RecognitionFailed {
                    error: e.to_string(),
                };
            }
        };

        let document = match self
            .recognizer
            .recognize(&image.bytes, &self.ocr_language)
            .await
        {
            Ok(doc) => doc,
            Err(e) => {
                return PipelineResult::RecognitionFailed {
                    error: e.to_string(),
                }
            }
        };

        if document.is_blank() {
            debug!("No text recognized, skipping translation");
            return PipelineResult::Empty {
                full_text: document.full_text,
            };
        }

        // Step 2: translation of the whole text
        on_stage(PipelineStage::Translating);
        let translation = match self
            .translator
            .translate(&document.full_text, AUTO_DETECT, to_lang)
            .await
        {
            Ok(t) => t,
            Err(e) => {
                return PipelineResult::TranslationFailed {
                    full_text: document.full_text,
                    words: document.words,
                    error: e.to_string(),
                }
            }
        };

        // Step 3: positional alignment
        let overlay_words = align(&document.words, &translation.translated_text, image_size);

        PipelineResult::Success {
            full_text: document.full_text,
            translated_text: translation.translated_text,
            detected_source_language: translation.detected_source_language,
            image_size,
            overlay_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{RecognitionError, TranslationError};
    use crate::core::types::{
        BoundingBox, CaptureSource, ImageSize, RecognizedDocument, RecognizedWord,
        TranslationResult,
    };
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn png(width: u32, height: u32) -> CapturedImage {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        ));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        CapturedImage::new(bytes, CaptureSource::Upload)
    }

    fn document(texts: &[&str]) -> RecognizedDocument {
        RecognizedDocument {
            full_text: texts.join(" "),
            words: texts
                .iter()
                .enumerate()
                .map(|(i, t)| RecognizedWord {
                    text: t.to_string(),
                    bbox: BoundingBox::new(i as u32 * 20, 10, i as u32 * 20 + 15, 30),
                })
                .collect(),
        }
    }

    struct MockRecognizer {
        document: Option<RecognizedDocument>,
        calls: AtomicUsize,
    }

    impl MockRecognizer {
        fn returning(document: RecognizedDocument) -> Arc<Self> {
            Arc::new(Self {
                document: Some(document),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                document: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextRecognizer for MockRecognizer {
        async fn recognize(
            &self,
            _image: &[u8],
            language: &str,
        ) -> Result<RecognizedDocument, RecognitionError> {
            assert_eq!(language, "eng");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.document.clone().ok_or(RecognitionError::EngineFailed {
                status: 1,
                stderr: "engine crashed".into(),
            })
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct MockTranslator {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl MockTranslator {
        fn returning(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Translator for MockTranslator {
        async fn translate(
            &self,
            _text: &str,
            from: &str,
            _to: &str,
        ) -> Result<TranslationResult, TranslationError> {
            assert_eq!(from, AUTO_DETECT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(text) => Ok(TranslationResult {
                    translated_text: text.clone(),
                    detected_source_language: Some("fr".into()),
                }),
                None => Err(TranslationError::Upstream {
                    status: 502,
                    message: "bad gateway".into(),
                }),
            }
        }
    }

    fn pipeline(recognizer: Arc<MockRecognizer>, translator: Arc<MockTranslator>) -> OverlayPipeline {
        OverlayPipeline::new(recognizer, translator, "eng", None)
    }

    #[tokio::test]
    async fn test_success_aligns_translation_to_boxes() {
        let doc = document(&["Bonjour", "le", "monde"]);
        let pipeline = pipeline(
            MockRecognizer::returning(doc.clone()),
            MockTranslator::returning("Hello the world"),
        );

        let result = pipeline.process_image(&png(100, 50), "en").await;
        match result {
            PipelineResult::Success {
                full_text,
                translated_text,
                detected_source_language,
                image_size,
                overlay_words,
            } => {
                assert_eq!(full_text, "Bonjour le monde");
                assert_eq!(translated_text, "Hello the world");
                assert_eq!(detected_source_language.as_deref(), Some("fr"));
                assert_eq!(image_size, ImageSize { width: 100, height: 50 });
                let pairs: Vec<_> = overlay_words
                    .iter()
                    .map(|o| (o.bbox, o.label.as_str()))
                    .collect();
                assert_eq!(
                    pairs,
                    vec![
                        (doc.words[0].bbox, "Hello"),
                        (doc.words[1].bbox, "the"),
                        (doc.words[2].bbox, "world"),
                    ]
                );
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fewer_tokens_leave_trailing_labels_empty() {
        let pipeline = pipeline(
            MockRecognizer::returning(document(&["a", "b", "c", "d"])),
            MockTranslator::returning("x y"),
        );

        let result = pipeline.process_image(&png(100, 50), "en").await;
        let labels: Vec<_> = result
            .overlay_words()
            .iter()
            .map(|o| o.label.as_str())
            .collect();
        assert_eq!(labels, vec!["x", "y", "", ""]);
    }

    #[tokio::test]
    async fn test_blank_text_never_translates() {
        let translator = MockTranslator::returning("unused");
        let pipeline = pipeline(
            MockRecognizer::returning(RecognizedDocument {
                full_text: " \n\t ".into(),
                words: vec![],
            }),
            translator.clone(),
        );

        let result = pipeline.process_image(&png(10, 10), "en").await;
        assert!(matches!(result, PipelineResult::Empty { .. }));
        assert!(result.overlay_words().is_empty());
        assert_eq!(result.stage(), PipelineStage::Ready);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recognition_failure_skips_translation() {
        let translator = MockTranslator::returning("unused");
        let pipeline = pipeline(MockRecognizer::failing(), translator.clone());

        let result = pipeline.process_image(&png(10, 10), "en").await;
        assert!(matches!(result, PipelineResult::RecognitionFailed { .. }));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreadable_image_fails_before_engine() {
        let recognizer = MockRecognizer::returning(document(&["x"]));
        let pipeline = pipeline(recognizer.clone(), MockTranslator::returning("y"));

        let garbage = CapturedImage::new(b"not an image".to_vec(), CaptureSource::Upload);
        let result = pipeline.process_image(&garbage, "en").await;
        assert!(matches!(result, PipelineResult::RecognitionFailed { .. }));
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_translation_failure_keeps_recognized_text() {
        let doc = document(&["Sortie", "de", "secours"]);
        let pipeline = pipeline(
            MockRecognizer::returning(doc.clone()),
            MockTranslator::failing(),
        );

        let result = pipeline.process_image(&png(100, 50), "en").await;
        match result {
            PipelineResult::TranslationFailed {
                full_text,
                words,
                error,
            } => {
                assert_eq!(full_text, doc.full_text);
                assert_eq!(words, doc.words);
                assert!(error.contains("502"));
            }
            other => panic!("expected translation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_same_inputs_give_identical_results() {
        let pipeline = pipeline(
            MockRecognizer::returning(document(&["Bonjour", "le", "monde"])),
            MockTranslator::returning("Hello the world"),
        );
        let image = png(100, 50);

        let first = pipeline.process_image(&image, "en").await;
        let second = pipeline.process_image(&image, "en").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cycle_outcomes_are_counted() {
        let metrics = Metrics::new();
        let pipeline = OverlayPipeline::new(
            MockRecognizer::returning(document(&["a"])),
            MockTranslator::failing(),
            "eng",
            Some(metrics.clone()),
        );
        pipeline.process_image(&png(10, 10), "en").await;
        assert_eq!(metrics.snapshot().cycles_translation_failed, 1);
    }

    /// Blocks translations into `held_lang` until released
    struct GatedTranslator {
        held_lang: &'static str,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Translator for GatedTranslator {
        async fn translate(
            &self,
            text: &str,
            _from: &str,
            to: &str,
        ) -> Result<TranslationResult, TranslationError> {
            if to == self.held_lang {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(TranslationResult {
                translated_text: format!("{}:{}", to, text),
                detected_source_language: None,
            })
        }
    }

    #[tokio::test]
    async fn test_superseded_cycle_result_is_not_applied() {
        let translator = Arc::new(GatedTranslator {
            held_lang: "es",
            entered: Notify::new(),
            release: Notify::new(),
        });
        let pipeline = Arc::new(OverlayPipeline::new(
            MockRecognizer::returning(document(&["hola"])),
            translator.clone(),
            "eng",
            None,
        ));
        let coordinator = Arc::new(CycleCoordinator::new(None));

        // Cycle A stalls inside translation
        let cycle_a = {
            let pipeline = pipeline.clone();
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                pipeline
                    .run_cycle("tab", &coordinator, png(20, 20), "es")
                    .await
            })
        };
        translator.entered.notified().await;
        assert_eq!(coordinator.stage().1, PipelineStage::Translating);

        // Cycle B starts and finishes while A is still waiting
        let report_b = pipeline
            .run_cycle("tab", &coordinator, png(20, 20), "fr")
            .await;
        assert!(report_b.applied);

        translator.release.notify_one();
        let report_a = cycle_a.await.unwrap();

        assert!(report_a.cycle < report_b.cycle);
        assert!(!report_a.applied);
        let (applied_cycle, applied) = coordinator.current().unwrap();
        assert_eq!(applied_cycle, report_b.cycle);
        assert_eq!(applied, report_b.result);
        assert_eq!(coordinator.stage(), (report_b.cycle, PipelineStage::Ready));
    }
}
