//! OCR text block extraction
//!
//! Word recognition is pluggable through [`WordRecognizer`]; the Tesseract
//! backend is compiled in with the `ocr` feature. Grouping and filtering of
//! recognised words into [`TextBlock`]s is backend independent.
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::deadline::blocking_with_deadline;
use crate::errors::VisualError;
use crate::models::*;

/// Single-word blocks made only of these carry no targeting value.
const STOP_WORDS: &[&str] = &[
    "the", "and", "or", "to", "a", "an", "of", "in", "on", "at", "by", "for", "with", "as", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "can",
];

/// Blocks listed in the prompt listing.
const LISTING_LIMIT: usize = 12;
const LISTING_TEXT_MAX: usize = 40;

/// Word-level recognition backend.
pub trait WordRecognizer: Send + Sync {
    /// Recognise words in an encoded image.
    fn recognize(&self, image: &[u8], options: &OcrOptions) -> Result<Vec<RecognizedWord>, VisualError>;

    fn name(&self) -> &'static str;
}

/// Bounded OCR front-end used by the action loop and the coordinate corrector.
#[derive(Clone)]
pub struct TextExtractor {
    recognizer: Option<Arc<dyn WordRecognizer>>,
    options: OcrOptions,
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor")
            .field("backend", &self.recognizer.as_ref().map(|r| r.name()))
            .field("options", &self.options)
            .finish()
    }
}

impl TextExtractor {
    pub fn new(recognizer: Arc<dyn WordRecognizer>, options: OcrOptions) -> Self {
        Self {
            recognizer: Some(recognizer),
            options,
        }
    }

    /// Extractor that always yields no blocks.
    pub fn disabled() -> Self {
        Self {
            recognizer: None,
            options: OcrOptions::default(),
        }
    }

    /// Tesseract when compiled with `ocr`, disabled otherwise.
    pub fn from_options(options: OcrOptions) -> Self {
        #[cfg(feature = "ocr")]
        {
            Self::new(Arc::new(TesseractRecognizer), options)
        }
        #[cfg(not(feature = "ocr"))]
        {
            Self {
                recognizer: None,
                options,
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn options(&self) -> &OcrOptions {
        &self.options
    }

    /// Extract blocks using the configured timeout.
    pub async fn extract(&self, screenshot: &[u8]) -> Vec<TextBlock> {
        self.extract_within(screenshot, Duration::from_millis(self.options.timeout_ms))
            .await
    }

    /// Extract blocks, giving up with an empty list after `limit`.
    pub async fn extract_within(&self, screenshot: &[u8], limit: Duration) -> Vec<TextBlock> {
        match self.try_extract_within(screenshot, limit).await {
            Ok(blocks) => blocks,
            Err(err) => {
                debug!(error = %err, "skipping OCR extraction");
                Vec::new()
            }
        }
    }

    /// Like [`extract_within`](Self::extract_within), but reports a missing backend.
    pub async fn try_extract_within(&self, screenshot: &[u8], limit: Duration) -> Result<Vec<TextBlock>, VisualError> {
        let recognizer = self.recognizer.clone().ok_or(VisualError::OcrUnavailable)?;
        if screenshot.is_empty() {
            return Ok(Vec::new());
        }

        let bytes = screenshot.to_vec();
        let options = self.options.clone();
        let blocks = blocking_with_deadline("ocr", limit, Vec::new(), move || {
            let words = recognizer.recognize(&bytes, &options)?;
            Ok::<_, VisualError>(group_words(&words, &options))
        })
        .await;
        info!(blocks = blocks.len(), "OCR extraction finished");
        Ok(blocks)
    }
}

/// Merge recognised words into text blocks and drop noise.
///
/// A word opens a new block when its line key changes or its vertical centre
/// drifts more than `line_tolerance_px` from the previous word.
pub fn group_words(words: &[RecognizedWord], options: &OcrOptions) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<&RecognizedWord> = Vec::new();

    for word in words {
        if word.text.trim().is_empty() || word.confidence < options.min_word_confidence {
            continue;
        }
        if let Some(prev) = current.last() {
            let same_line = prev.line_key() == word.line_key();
            let aligned = (prev.center_y() - word.center_y()).abs() <= options.line_tolerance_px;
            if !(same_line && aligned) {
                blocks.extend(build_block(&current));
                current.clear();
            }
        }
        current.push(word);
    }
    blocks.extend(build_block(&current));

    blocks
        .into_iter()
        .filter(|block| keep_block(block, options))
        .collect()
}

fn build_block(words: &[&RecognizedWord]) -> Option<TextBlock> {
    let first = words.first()?;
    let bbox = words
        .iter()
        .skip(1)
        .fold(first.bbox(), |acc, w| acc.union(&w.bbox()));
    let text = words
        .iter()
        .map(|w| w.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let confidence =
        (words.iter().map(|w| w.confidence).sum::<f64>() / words.len() as f64) as i32;
    Some(TextBlock {
        text,
        confidence,
        bbox,
        center: bbox.center(),
        area: bbox.area(),
        word_count: words.len(),
    })
}

fn keep_block(block: &TextBlock, options: &OcrOptions) -> bool {
    let text = block.text.trim();
    if text.chars().count() < 2 {
        return false;
    }
    if block.word_count == 1 && STOP_WORDS.contains(&text.to_lowercase().as_str()) {
        return false;
    }
    block.confidence >= options.min_block_confidence
}

/// Render the OCR listing shown to the model.
pub fn describe_blocks(blocks: &[TextBlock]) -> String {
    if blocks.is_empty() {
        return "No text elements detected.".to_string();
    }
    let weight = |b: &TextBlock| f64::from(b.confidence) * 0.7 + b.text.chars().count() as f64 * 0.3;
    let mut ranked: Vec<&TextBlock> = blocks.iter().collect();
    ranked.sort_by(|a, b| {
        weight(b)
            .partial_cmp(&weight(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut lines = vec!["TEXT BLOCKS FOUND:".to_string()];
    for (i, block) in ranked.into_iter().take(LISTING_LIMIT).enumerate() {
        lines.push(format!(
            "{}. \"{}\" at ({}, {}) [{} words, {}% confident]",
            i + 1,
            truncate_chars(&block.text, LISTING_TEXT_MAX),
            block.center.x,
            block.center.y,
            block.word_count,
            block.confidence
        ));
    }
    lines.join("\n")
}

/// Cut to `max` characters, replacing the tail with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Parse Tesseract TSV output into word rows (level 5).
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedWord> {
    tsv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let num = |i: usize| cols[i].trim().parse::<i64>().ok();
            Some(RecognizedWord {
                block_num: num(2)? as u32,
                par_num: num(3)? as u32,
                line_num: num(4)? as u32,
                left: num(6)? as i32,
                top: num(7)? as i32,
                width: num(8)? as i32,
                height: num(9)? as i32,
                confidence: cols[10].trim().parse::<f64>().ok()?,
                text: cols[11..].join("\t").trim().to_string(),
            })
        })
        .collect()
}

/// Tesseract-backed recogniser (optional feature)
#[cfg(feature = "ocr")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TesseractRecognizer;

#[cfg(feature = "ocr")]
impl WordRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &[u8], options: &OcrOptions) -> Result<Vec<RecognizedWord>, VisualError> {
        use tesseract::Tesseract;

        let mut tess = Tesseract::new(None, Some(&options.language))
            .map_err(|e| VisualError::OcrFailed(format!("Tesseract init failed: {}", e)))?
            .set_variable("tessedit_pageseg_mode", options.psm.as_tesseract())
            .map_err(|e| VisualError::OcrFailed(format!("Failed to set PSM: {}", e)))?
            .set_image_from_mem(image)
            .map_err(|e| VisualError::OcrFailed(format!("Failed to set image: {}", e)))?;
        let tsv = tess
            .get_tsv_text(0)
            .map_err(|e| VisualError::OcrFailed(format!("Text extraction failed: {}", e)))?;
        Ok(parse_tsv(&tsv))
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, conf: f64, line: u32, left: i32, top: i32) -> RecognizedWord {
        RecognizedWord {
            text: text.to_string(),
            confidence: conf,
            block_num: 1,
            par_num: 1,
            line_num: line,
            left,
            top,
            width: 40,
            height: 12,
        }
    }

    struct FixedRecognizer(Vec<RecognizedWord>);

    impl WordRecognizer for FixedRecognizer {
        fn recognize(&self, _: &[u8], _: &OcrOptions) -> Result<Vec<RecognizedWord>, VisualError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct SlowRecognizer;

    impl WordRecognizer for SlowRecognizer {
        fn recognize(&self, _: &[u8], _: &OcrOptions) -> Result<Vec<RecognizedWord>, VisualError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(vec![word("Late", 90.0, 1, 0, 0)])
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[test]
    fn test_words_on_one_line_merge() {
        let words = vec![
            word("Sign", 90.0, 1, 10, 100),
            word("in", 80.0, 1, 55, 101),
            word("Search", 70.0, 2, 10, 140),
        ];
        let blocks = group_words(&words, &OcrOptions::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "Sign in");
        assert_eq!(blocks[0].confidence, 85);
        assert_eq!(blocks[0].word_count, 2);
        assert_eq!(blocks[0].bbox, BoundingBox::new(10, 100, 95, 113));
        assert_eq!(blocks[0].center, Point::new(52, 106));
        assert_eq!(blocks[1].text, "Search");
    }

    #[test]
    fn test_vertical_drift_splits_block() {
        let words = vec![word("Menu", 90.0, 1, 10, 100), word("Items", 90.0, 1, 60, 130)];
        let blocks = group_words(&words, &OcrOptions::default());
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_noise_is_filtered() {
        let words = vec![
            word("x", 95.0, 1, 0, 0),
            word("the", 95.0, 2, 0, 40),
            word("blurry", 30.0, 3, 0, 80),
            word("Checkout", 88.0, 4, 0, 120),
        ];
        let blocks = group_words(&words, &OcrOptions::default());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Checkout");
    }

    #[test]
    fn test_describe_blocks_listing() {
        let words = vec![
            word("Checkout", 88.0, 1, 0, 120),
            word("Continue", 95.0, 2, 0, 200),
        ];
        let listing = describe_blocks(&group_words(&words, &OcrOptions::default()));
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "TEXT BLOCKS FOUND:");
        assert!(lines[1].starts_with("1. \"Continue\""));
        assert!(lines[1].ends_with("[1 words, 95% confident]"));
        assert_eq!(describe_blocks(&[]), "No text elements detected.");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 40), "short");
        let long = "a".repeat(45);
        let cut = truncate_chars(&long, 40);
        assert_eq!(cut.len(), 40);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_parse_tsv_keeps_word_rows() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   4\t1\t1\t1\t1\t0\t10\t10\t200\t20\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t10\t10\t60\t20\t91.5\tLogin\n";
        let words = parse_tsv(tsv);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "Login");
        assert_eq!(words[0].confidence, 91.5);
        assert_eq!(words[0].line_key(), (1, 1, 1));
    }

    #[test]
    fn test_disabled_extractor_returns_empty() {
        let extractor = TextExtractor::disabled();
        let blocks = tokio_test::block_on(extractor.extract(b"anything"));
        assert!(blocks.is_empty());

        let err = tokio_test::block_on(extractor.try_extract_within(b"anything", Duration::from_millis(50)))
            .unwrap_err();
        assert!(matches!(err, VisualError::OcrUnavailable));
    }

    #[tokio::test]
    async fn test_extractor_groups_backend_words() {
        let extractor = TextExtractor::new(
            Arc::new(FixedRecognizer(vec![word("Pricing", 92.0, 1, 300, 20)])),
            OcrOptions::default(),
        );
        let blocks = extractor.extract(b"png").await;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Pricing");
    }

    #[tokio::test]
    async fn test_extractor_times_out_to_empty() {
        let extractor = TextExtractor::new(Arc::new(SlowRecognizer), OcrOptions::default());
        let blocks = extractor
            .extract_within(b"png", Duration::from_millis(20))
            .await;
        assert!(blocks.is_empty());
    }
}
