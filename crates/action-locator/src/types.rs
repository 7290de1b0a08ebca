//! Core types for locator system

use std::collections::BTreeMap;

use perceiver_visual::{BoundingBox, CursorColor, Point, TextBlock, CANVAS_HEIGHT, CANVAS_WIDTH};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Locator strategy enumeration
///
/// Defines the three tiers used to relocate a stuck cursor:
/// - Structural: DOM element descriptors supplied by the session
/// - Ocr: text blocks read off the screenshot
/// - Model: a vision model asked for coordinates directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// DOM element strategy
    Structural,

    /// OCR text strategy
    Ocr,

    /// Vision model strategy
    Model,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Structural => "structural",
            LocatorStrategy::Ocr => "ocr",
            LocatorStrategy::Model => "model",
        }
    }

    /// Get all strategies in fallback order
    pub fn fallback_chain() -> Vec<LocatorStrategy> {
        vec![
            LocatorStrategy::Structural,
            LocatorStrategy::Ocr,
            LocatorStrategy::Model,
        ]
    }
}

/// Layout box as reported by the page script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomPosition {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: Option<f64>,
    pub center_y: Option<f64>,
}

impl DomPosition {
    /// Visible and non-degenerate.
    pub fn is_valid(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> Point {
        let cx = self.center_x.unwrap_or(self.x + (self.width / 2.0).floor());
        let cy = self.center_y.unwrap_or(self.y + (self.height / 2.0).floor());
        Point::new(cx.round() as i32, cy.round() as i32)
    }
}

/// Interactive element descriptor supplied by the session backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomElement {
    pub tag_name: String,
    pub text: String,
    pub id: String,
    pub class_names: String,
    pub attributes: BTreeMap<String, Value>,
    pub position: DomPosition,
}

impl DomElement {
    pub fn new(tag_name: impl Into<String>, text: impl Into<String>, position: DomPosition) -> Self {
        Self {
            tag_name: tag_name.into(),
            text: text.into(),
            position,
            ..Default::default()
        }
    }

    /// Builder: add a string attribute.
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .insert(name.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn tag(&self) -> String {
        self.tag_name.to_lowercase()
    }

    /// String-valued attribute; non-string values are ignored.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn role(&self) -> Option<String> {
        self.attr("role").map(str::to_lowercase)
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_xywh(
            self.position.x.round() as i32,
            self.position.y.round() as i32,
            self.position.width.round() as i32,
            self.position.height.round() as i32,
        )
    }
}

/// Viewport reported next to the DOM element list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: f64::from(CANVAS_WIDTH),
            height: f64::from(CANVAS_HEIGHT),
        }
    }
}

impl Viewport {
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// DOM elements captured for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomSnapshot {
    pub elements: Vec<DomElement>,
    pub viewport: Option<Viewport>,
}

impl DomSnapshot {
    pub fn new(elements: Vec<DomElement>) -> Self {
        Self {
            elements,
            viewport: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn viewport_or_default(&self) -> Viewport {
        self.viewport.unwrap_or_default()
    }
}

/// A candidate screen region, read by OCR or reported by the DOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum UiElement {
    OcrBlock(TextBlock),
    DomNode(DomElement),
}

/// Element with its intent match score attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredElement<E> {
    pub element: E,
    pub match_score: f64,
    pub match_reason: String,
}

/// Input for one coordinate correction attempt.
#[derive(Debug, Clone)]
pub struct CorrectionRequest {
    /// Encoded screenshot of the current step
    pub screenshot: Vec<u8>,
    /// What the agent said it was trying to reach
    pub intent: String,
    /// Where the cursor currently is
    pub position: Point,
    pub cursor_color: CursorColor,
    /// DOM descriptors for the current step, if the backend had any
    pub dom: Option<DomSnapshot>,
}

/// Prompt material for the model-assisted tier.
#[derive(Debug, Clone)]
pub struct CorrectionPrompt {
    pub system_instruction: String,
    pub user_prompt: String,
    pub screenshot: Vec<u8>,
}

/// Correction outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    pub success: bool,
    pub position: Point,
    pub explanation: String,
    /// Tier that produced the move, when one did
    pub strategy: Option<LocatorStrategy>,
}

impl CorrectionOutcome {
    pub fn corrected(strategy: LocatorStrategy, position: Point, explanation: String) -> Self {
        Self {
            success: true,
            position,
            explanation,
            strategy: Some(strategy),
        }
    }

    pub fn unchanged(position: Point, explanation: impl Into<String>) -> Self {
        Self {
            success: false,
            position,
            explanation: explanation.into(),
            strategy: None,
        }
    }
}
