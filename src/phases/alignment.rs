// Alignment: pair translated tokens with recognized word boxes

use crate::core::types::{BoundingBox, ImageSize, OverlayWord, Placement, RecognizedWord};

/// Pair whitespace-separated tokens of `translated_text` with word boxes by index.
///
/// Translation services return one opaque string with no word-level
/// correspondence, so token `i` labels box `i`. The output always has exactly
/// `words.len()` entries: boxes past the last token get an empty label, and
/// tokens past the last box are dropped.
pub fn align(words: &[RecognizedWord], translated_text: &str, size: ImageSize) -> Vec<OverlayWord> {
    let mut tokens = translated_text.split_whitespace();

    words
        .iter()
        .map(|word| OverlayWord {
            bbox: word.bbox,
            label: tokens.next().unwrap_or_default().to_string(),
            placement: placement(&word.bbox, size),
        })
        .collect()
}

/// Box position as percentages of the image. Zero dimensions count as 1.
pub fn placement(bbox: &BoundingBox, size: ImageSize) -> Placement {
    let width = size.width.max(1) as f64;
    let height = size.height.max(1) as f64;

    Placement {
        left: bbox.x0 as f64 / width * 100.0,
        top: bbox.y0 as f64 / height * 100.0,
        width: bbox.width() as f64 / width * 100.0,
        height: bbox.height() as f64 / height * 100.0,
    }
}
