//! Locator & Self-heal - bring a missed cursor back onto its target
//!
//! This crate implements the element-location side of the recon loop:
//! - Clickable filtering and prompt listings over DOM descriptors
//! - Intent matching shared by OCR blocks and DOM nodes
//! - Three-tier coordinate correction (structural, OCR, vision model)
//! - Ports for the command endpoint and the correction model

pub mod corrector;
pub mod dom;
pub mod errors;
pub mod grammar;
pub mod matcher;
pub mod ports;
pub mod types;

pub use corrector::*;
pub use dom::{
    describe_for_correction, filter_clickable, is_clickable, summarize_for_prompt, DEFAULT_PROMPT_LIMIT, NO_DOM_DATA,
};
pub use errors::*;
pub use grammar::{parse_target, TargetAnswer};
pub use matcher::*;
pub use ports::*;
pub use types::*;
