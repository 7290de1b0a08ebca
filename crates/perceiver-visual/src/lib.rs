//! Visual Perceiver - pixel-level perception for the SoulBrowser recon loop
//!
//! This crate provides the screenshot-only senses of the agent:
//! - Perceptual fingerprints and change distance between screenshots
//! - Synthetic cursor marker detection (red / green / blue dot)
//! - Cursor highlighting for the image sent to the model
//! - OCR text block extraction (Tesseract behind the `ocr` feature)
//! - Deadline helpers so no perception call can stall the loop

pub mod annotate;
pub mod cursor;
pub mod deadline;
pub mod diff;
pub mod errors;
pub mod models;
pub mod ocr;

// Re-exports
pub use annotate::annotate_cursor;
pub use cursor::{ColorBand, CursorLocator, MARKER_BANDS, SEARCH_RADIUS};
pub use deadline::{blocking_with_deadline, with_deadline};
pub use diff::{distance, fingerprint, ScreenshotFingerprint, NO_CHANGE_THRESHOLD};
pub use errors::VisualError;
pub use models::*;
pub use ocr::{describe_blocks, group_words, parse_tsv, truncate_chars, TextExtractor, WordRecognizer};

#[cfg(feature = "ocr")]
pub use ocr::TesseractRecognizer;
