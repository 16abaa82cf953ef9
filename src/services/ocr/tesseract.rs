use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::TextRecognizer;
use crate::core::config::Config;
use crate::core::errors::RecognitionError;
use crate::core::types::{BoundingBox, RecognizedDocument, RecognizedWord};
use crate::middleware::CircuitBreaker;
use crate::utils::{Metrics, Upstream};

/// TSV row level for individual words
const WORD_LEVEL: u32 = 5;
const TSV_COLUMNS: usize = 12;

/// Tesseract CLI backend.
///
/// Streams the image over stdin and reads TSV on stdout, so nothing touches disk.
pub struct TesseractRecognizer {
    program: String,
    timeout: Duration,
    breaker: CircuitBreaker,
    metrics: Option<Metrics>,
}

impl TesseractRecognizer {
    pub fn new(config: &Config, breaker: CircuitBreaker, metrics: Option<Metrics>) -> Self {
        Self {
            program: config.ocr.tesseract_path.clone(),
            timeout: config.ocr_timeout(),
            breaker,
            metrics,
        }
    }

    async fn run_engine(
        &self,
        image: &[u8],
        language: &str,
    ) -> Result<RecognizedDocument, RecognitionError> {
        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", language, "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RecognitionError::EngineUnavailable {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin concurrently so a large image can't deadlock against a full stdout pipe
        if let Some(mut stdin) = child.stdin.take() {
            let data = image.to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&data).await {
                    debug!("Tesseract closed stdin early: {}", e);
                }
            });
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RecognitionError::Timeout(self.timeout.as_secs()))?
            .map_err(|source| RecognitionError::EngineUnavailable {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Tesseract reports undecodable input on stderr with a non-zero exit
            if stderr.contains("Error in pixReadMem") || stderr.contains("Unsupported image") {
                return Err(RecognitionError::UnreadableImage(stderr));
            }
            return Err(RecognitionError::EngineFailed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        parse_tsv(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    #[instrument(skip(self, image), fields(bytes = image.len(), language = language))]
    async fn recognize(
        &self,
        image: &[u8],
        language: &str,
    ) -> Result<RecognizedDocument, RecognitionError> {
        let start = Instant::now();
        let result = self.breaker.run(self.run_engine(image, language)).await;

        if let Some(ref m) = self.metrics {
            m.record_upstream_call(Upstream::Ocr, result.is_ok(), start.elapsed());
        }

        match &result {
            Ok(doc) => debug!(
                "Recognized {} words in {:.0}ms",
                doc.words.len(),
                start.elapsed().as_secs_f64() * 1000.0
            ),
            Err(e) => warn!("Recognition failed: {}", e),
        }
        result
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Parse `tesseract ... tsv` output into a document.
///
/// Only word rows with non-blank text are kept. `full_text` is rebuilt from the
/// layout columns: words on a line are joined by spaces, lines by newlines, and
/// paragraphs are separated by a blank line.
pub fn parse_tsv(tsv: &str) -> Result<RecognizedDocument, RecognitionError> {
    let mut words = Vec::new();
    let mut full_text = String::new();
    let mut last_paragraph: Option<(u32, u32, u32)> = None;
    let mut last_line: Option<u32> = None;

    for (line_no, row) in tsv.lines().enumerate() {
        if line_no == 0 && row.starts_with("level") {
            continue;
        }
        if row.trim().is_empty() {
            continue;
        }

        let cols: Vec<&str> = row.splitn(TSV_COLUMNS, '\t').collect();
        if cols.len() < TSV_COLUMNS - 1 {
            return Err(RecognitionError::MalformedOutput {
                line: line_no + 1,
                reason: format!("expected {} columns, got {}", TSV_COLUMNS, cols.len()),
            });
        }

        let num = |idx: usize, name: &str| -> Result<u32, RecognitionError> {
            cols[idx]
                .trim()
                .parse::<u32>()
                .map_err(|_| RecognitionError::MalformedOutput {
                    line: line_no + 1,
                    reason: format!("bad {} '{}'", name, cols[idx]),
                })
        };

        if num(0, "level")? != WORD_LEVEL {
            continue;
        }

        let text = cols.get(11).map(|t| t.trim()).unwrap_or("");
        if text.is_empty() {
            continue;
        }

        let paragraph = (num(1, "page_num")?, num(2, "block_num")?, num(3, "par_num")?);
        let line = num(4, "line_num")?;
        let bbox = BoundingBox::from_rect(
            num(6, "left")?,
            num(7, "top")?,
            num(8, "width")?,
            num(9, "height")?,
        );

        match last_paragraph {
            None => {}
            Some(p) if p != paragraph => full_text.push_str("\n\n"),
            Some(_) if last_line != Some(line) => full_text.push('\n'),
            Some(_) => full_text.push(' '),
        }
        full_text.push_str(text);
        last_paragraph = Some(paragraph);
        last_line = Some(line);

        words.push(RecognizedWord {
            text: text.to_string(),
            bbox,
        });
    }

    Ok(RecognizedDocument { full_text, words })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_parse_words_and_layout() {
        let input = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t",
            "2\t1\t1\t0\t0\t0\t10\t10\t300\t60\t-1\t",
            "4\t1\t1\t1\t1\t0\t10\t10\t300\t25\t-1\t",
            "5\t1\t1\t1\t1\t1\t10\t10\t90\t25\t96.1\tBonjour",
            "5\t1\t1\t1\t1\t2\t110\t10\t30\t25\t95.0\tle",
            "5\t1\t1\t1\t2\t1\t10\t40\t80\t25\t91.3\tmonde",
            "5\t1\t2\t1\t1\t1\t10\t100\t60\t20\t88.0\tMenu",
        ]);

        let doc = parse_tsv(&input).unwrap();
        assert_eq!(doc.full_text, "Bonjour le\nmonde\n\nMenu");
        assert_eq!(doc.words.len(), 4);
        assert_eq!(doc.words[0].text, "Bonjour");
        assert_eq!(doc.words[0].bbox, BoundingBox::new(10, 10, 100, 35));
        assert_eq!(doc.words[1].bbox, BoundingBox::new(110, 10, 140, 35));
    }

    #[test]
    fn test_blank_word_rows_are_skipped() {
        let input = tsv(&[
            "5\t1\t1\t1\t1\t1\t10\t10\t90\t25\t-1\t ",
            "5\t1\t1\t1\t1\t2\t10\t10\t90\t25\t-1\t",
        ]);
        let doc = parse_tsv(&input).unwrap();
        assert!(doc.words.is_empty());
        assert!(doc.is_blank());
    }

    #[test]
    fn test_empty_output_is_blank_document() {
        let doc = parse_tsv("").unwrap();
        assert_eq!(doc, RecognizedDocument::default());
    }

    #[test]
    fn test_malformed_row_is_reported() {
        let input = tsv(&["5\t1\t1\t1\t1\t1\tten\t10\t90\t25\t90\tword"]);
        let err = parse_tsv(&input).unwrap_err();
        assert!(matches!(err, RecognitionError::MalformedOutput { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_missing_engine_is_unavailable() {
        let mut config = Config::defaults();
        config.ocr.tesseract_path = "/nonexistent/tesseract-binary".to_string();
        let breaker = CircuitBreaker::new("ocr", Default::default(), None);
        let recognizer = TesseractRecognizer::new(&config, breaker, None);

        let err = recognizer.recognize(b"png", "eng").await.unwrap_err();
        assert!(matches!(err, RecognitionError::EngineUnavailable { .. }));
    }
}
