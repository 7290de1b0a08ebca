///! Data models for visual perception
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical canvas width the browser session renders at.
pub const CANVAS_WIDTH: i32 = 1920;
/// Logical canvas height the browser session renders at.
pub const CANVAS_HEIGHT: i32 = 1080;

/// Integer screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Centre of the default 1920x1080 canvas.
    pub const fn canvas_center() -> Self {
        Self::new(CANVAS_WIDTH / 2, CANVAS_HEIGHT / 2)
    }

    /// Euclidean distance in pixels.
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Whether the point lies inside `0..=width` x `0..=height`.
    pub fn within(&self, width: i32, height: i32) -> bool {
        (0..=width).contains(&self.x) && (0..=height).contains(&self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle in corner form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from origin plus size.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width()) * i64::from(self.height())
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    /// Smallest box covering both inputs.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }
}

/// Interactivity class signalled by the injected cursor marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorColor {
    /// Pointer sits over a non-interactive area.
    Red,
    /// Pointer sits over a clickable element.
    Green,
    /// Pointer sits over a draggable element.
    Blue,
    /// No marker could be found.
    NotFound,
    /// Marker state is stale, e.g. right after a corrective move.
    Unknown,
}

impl CursorColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorColor::Red => "red",
            CursorColor::Green => "green",
            CursorColor::Blue => "blue",
            CursorColor::NotFound => "not_found",
            CursorColor::Unknown => "unknown",
        }
    }

    /// Human-readable meaning used in prompt feedback.
    pub fn meaning(&self) -> &'static str {
        match self {
            CursorColor::Red => "non-clickable area",
            CursorColor::Green => "clickable element (link, button)",
            CursorColor::Blue => "draggable element",
            CursorColor::NotFound | CursorColor::Unknown => "unknown type",
        }
    }

    /// Red or missing markers mean the last move did not land on a target.
    pub fn needs_correction(&self) -> bool {
        matches!(self, CursorColor::Red | CursorColor::NotFound)
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, CursorColor::NotFound)
    }
}

impl fmt::Display for CursorColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-step result of cursor detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorObservation {
    pub color: CursorColor,
    pub position: Point,
}

impl CursorObservation {
    pub const fn new(color: CursorColor, position: Point) -> Self {
        Self { color, position }
    }

    pub const fn not_found(position: Point) -> Self {
        Self::new(CursorColor::NotFound, position)
    }
}

/// Page segmentation mode for OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    Auto,
    SingleBlock,
    SingleLine,
    SingleWord,
}

impl PageSegMode {
    /// Tesseract `tessedit_pageseg_mode` value.
    pub fn as_tesseract(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
        }
    }
}

/// OCR options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrOptions {
    /// Language code (e.g., "eng", "chi_sim")
    pub language: String,

    /// Page segmentation mode
    pub psm: PageSegMode,

    /// Words below this confidence (0-100) never join a block
    pub min_word_confidence: f64,

    /// Blocks whose mean confidence falls below this are discarded
    pub min_block_confidence: i32,

    /// Maximum vertical centre drift (px) for words in one block
    pub line_tolerance_px: i32,

    /// Upper bound on a single recognition pass
    pub timeout_ms: u64,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            psm: PageSegMode::SingleBlock,
            min_word_confidence: 50.0,
            min_block_confidence: 40,
            line_tolerance_px: 10,
            timeout_ms: 5_000,
        }
    }
}

/// A single word as reported by the recognition backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    /// 0-100, negative when the backend could not score the word
    pub confidence: f64,
    pub block_num: u32,
    pub par_num: u32,
    pub line_num: u32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl RecognizedWord {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_xywh(self.left, self.top, self.width, self.height)
    }

    /// Words sharing this key sit on the same recognised text line.
    pub fn line_key(&self) -> (u32, u32, u32) {
        (self.block_num, self.par_num, self.line_num)
    }

    pub fn center_y(&self) -> i32 {
        self.top + self.height / 2
    }
}

/// Coherent run of on-screen text assembled from neighbouring words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    /// Integer mean of word confidences
    pub confidence: i32,
    pub bbox: BoundingBox,
    pub center: Point,
    pub area: i64,
    pub word_count: usize,
}
