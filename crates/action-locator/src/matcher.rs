//! Intent matching: rank candidate elements against a free-text intent.
//!
//! One scoring pass serves both element kinds. What differs between an OCR
//! block and a DOM node lives in its [`ScoringProfile`] and in the
//! structural hook DOM nodes override.

use perceiver_visual::{BoundingBox, Point, TextBlock};
use tracing::debug;

use crate::types::{DomElement, ScoredElement, UiElement, Viewport};

/// Words ignored when tokenizing an intent for DOM matching.
pub const INTENT_STOP_WORDS: &[&str] = &[
    "the", "to", "on", "a", "an", "want", "would", "like", "try", "i", "will", "need", "should",
    "click", "move", "go", "it", "is", "am", "are", "can", "could",
];

/// Shorter list used for OCR text; pronoun and modal words stay as keywords.
pub const OCR_STOP_WORDS: &[&str] = &[
    "the", "to", "on", "a", "an", "want", "would", "like", "try", "i", "will", "need", "should",
    "click", "move", "go",
];

/// Elements scoring below this are not returned.
pub const MIN_MATCH_SCORE: f64 = 30.0;

const SKIPPED_TAGS: &[&str] = &["script", "style", "meta", "link", "noscript"];
const INTERACTIVE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea", "label"];
const DESCRIPTIVE_ATTRS: &[&str] = &["value", "placeholder", "title", "alt", "aria-label"];

/// Per-kind weights for the shared text rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringProfile {
    pub kind: &'static str,
    /// Full element text appears inside the intent
    pub text_in_intent: f64,
    /// Intent token appears inside the element text
    pub token_in_text: f64,
    /// Element text appears inside an intent token
    pub text_in_token: f64,
    /// Bonus for text shorter than 20 characters, 0 to disable
    pub short_text: f64,
    /// Whether recognition confidence contributes
    pub use_confidence: bool,
    /// Intent words never used as keywords
    pub stop_words: &'static [&'static str],
}

impl ScoringProfile {
    pub const OCR: ScoringProfile = ScoringProfile {
        kind: "ocr",
        text_in_intent: 100.0,
        token_in_text: 30.0,
        text_in_token: 20.0,
        short_text: 15.0,
        use_confidence: true,
        stop_words: OCR_STOP_WORDS,
    };

    pub const DOM: ScoringProfile = ScoringProfile {
        kind: "dom",
        text_in_intent: 100.0,
        token_in_text: 40.0,
        text_in_token: 20.0,
        short_text: 0.0,
        use_confidence: false,
        stop_words: INTENT_STOP_WORDS,
    };
}

/// Intent-side inputs shared by every element in one scoring pass.
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub intent_lower: String,
    /// Keywords under the DOM stop-word list
    pub tokens: Vec<String>,
    /// Keywords under the OCR stop-word list
    pub ocr_tokens: Vec<String>,
    pub viewport: Viewport,
}

impl MatchContext {
    pub fn new(intent: &str, viewport: Viewport) -> Self {
        Self {
            intent_lower: intent.to_lowercase(),
            tokens: tokenize_with(intent, INTENT_STOP_WORDS),
            ocr_tokens: tokenize_with(intent, OCR_STOP_WORDS),
            viewport,
        }
    }

    /// Keywords for elements scored under `profile`.
    pub fn tokens_for(&self, profile: &ScoringProfile) -> &[String] {
        if profile.stop_words == OCR_STOP_WORDS {
            &self.ocr_tokens
        } else {
            &self.tokens
        }
    }
}

/// Running score plus the reasons that produced it.
#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub total: f64,
    reasons: Vec<String>,
}

impl ScoreBreakdown {
    pub fn add(&mut self, points: f64, reason: impl Into<String>) {
        self.total += points;
        self.reasons.push(reason.into());
    }

    pub fn reason(&self) -> String {
        self.reasons.join(", ")
    }
}

/// Anything that can be ranked against an intent.
pub trait Matchable {
    fn text(&self) -> &str;

    fn bbox(&self) -> BoundingBox;

    fn center(&self) -> Point;

    fn profile(&self) -> ScoringProfile;

    /// Whether the element may be scored at all
    fn is_candidate(&self) -> bool {
        true
    }

    /// Recognition confidence in percent, when the source has one
    fn confidence(&self) -> Option<f64> {
        None
    }

    /// Extra rules drawn from element structure
    fn structural_score(&self, _ctx: &MatchContext, _breakdown: &mut ScoreBreakdown) {}
}

impl Matchable for TextBlock {
    fn text(&self) -> &str {
        &self.text
    }

    fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    fn center(&self) -> Point {
        self.center
    }

    fn profile(&self) -> ScoringProfile {
        ScoringProfile::OCR
    }

    fn confidence(&self) -> Option<f64> {
        Some(f64::from(self.confidence))
    }
}

impl Matchable for DomElement {
    fn text(&self) -> &str {
        &self.text
    }

    fn bbox(&self) -> BoundingBox {
        DomElement::bbox(self)
    }

    fn center(&self) -> Point {
        self.position.center()
    }

    fn profile(&self) -> ScoringProfile {
        ScoringProfile::DOM
    }

    fn is_candidate(&self) -> bool {
        self.position.is_valid() && !SKIPPED_TAGS.contains(&self.tag().as_str())
    }

    fn structural_score(&self, ctx: &MatchContext, breakdown: &mut ScoreBreakdown) {
        let tag = self.tag();
        if INTERACTIVE_TAGS.contains(&tag.as_str()) {
            breakdown.add(30.0, format!("interactive <{}>", tag));
        }
        if tag == "input" {
            let kind = self.attr("type").map(str::to_lowercase);
            if matches!(kind.as_deref(), Some("submit") | Some("button")) {
                breakdown.add(15.0, "submit-style input");
            }
        }

        let id = self.id.to_lowercase();
        if !id.is_empty() {
            for token in ctx.tokens.iter().filter(|t| id.contains(t.as_str())) {
                breakdown.add(20.0, format!("'{}' in id", token));
            }
        }
        if tag == "a" {
            if let Some(href) = self.attr("href") {
                let href = href.to_lowercase();
                for token in ctx.tokens.iter().filter(|t| href.contains(t.as_str())) {
                    breakdown.add(15.0, format!("'{}' in href", token));
                }
            }
        }

        for name in DESCRIPTIVE_ATTRS {
            let Some(value) = self.attr(name) else {
                continue;
            };
            let value = value.to_lowercase();
            if value.is_empty() {
                continue;
            }
            if ctx.intent_lower.contains(&value) {
                breakdown.add(25.0, format!("{} in intent", name));
            }
            for token in &ctx.tokens {
                if value.contains(token.as_str()) {
                    breakdown.add(15.0, format!("'{}' in {}", token, name));
                }
            }
        }

        let pos = &self.position;
        if (20.0..=300.0).contains(&pos.width) && (20.0..=100.0).contains(&pos.height) {
            breakdown.add(10.0, "button-sized");
        }
        let center = self.position.center();
        let (vx, vy) = ctx.viewport.center();
        if (f64::from(center.x) - vx).abs() <= 200.0 && (f64::from(center.y) - vy).abs() <= 200.0 {
            breakdown.add(5.0, "near viewport centre");
        }
        if (0..=100).contains(&center.y) {
            breakdown.add(5.0, "top of page");
        }
    }
}

impl Matchable for UiElement {
    fn text(&self) -> &str {
        match self {
            UiElement::OcrBlock(block) => block.text(),
            UiElement::DomNode(node) => Matchable::text(node),
        }
    }

    fn bbox(&self) -> BoundingBox {
        match self {
            UiElement::OcrBlock(block) => Matchable::bbox(block),
            UiElement::DomNode(node) => Matchable::bbox(node),
        }
    }

    fn center(&self) -> Point {
        match self {
            UiElement::OcrBlock(block) => Matchable::center(block),
            UiElement::DomNode(node) => Matchable::center(node),
        }
    }

    fn profile(&self) -> ScoringProfile {
        match self {
            UiElement::OcrBlock(_) => ScoringProfile::OCR,
            UiElement::DomNode(_) => ScoringProfile::DOM,
        }
    }

    fn is_candidate(&self) -> bool {
        match self {
            UiElement::OcrBlock(block) => block.is_candidate(),
            UiElement::DomNode(node) => node.is_candidate(),
        }
    }

    fn confidence(&self) -> Option<f64> {
        match self {
            UiElement::OcrBlock(block) => block.confidence(),
            UiElement::DomNode(node) => node.confidence(),
        }
    }

    fn structural_score(&self, ctx: &MatchContext, breakdown: &mut ScoreBreakdown) {
        if let UiElement::DomNode(node) = self {
            node.structural_score(ctx, breakdown);
        }
    }
}

/// Split an intent into lowercase keywords worth matching.
pub fn tokenize_intent(intent: &str) -> Vec<String> {
    tokenize_with(intent, INTENT_STOP_WORDS)
}

/// Tokenize with an explicit stop-word list.
pub fn tokenize_with(intent: &str, stop_words: &[&str]) -> Vec<String> {
    intent
        .to_lowercase()
        .replace(['"', '\''], "")
        .split_whitespace()
        .map(|word| word.trim_matches(|c| ".,():;!?".contains(c)).to_string())
        .filter(|word| word.chars().count() > 2 && !stop_words.contains(&word.as_str()))
        .collect()
}

/// Ranks elements by how well their text and structure fit an intent.
#[derive(Debug, Clone)]
pub struct IntentMatcher {
    min_score: f64,
}

impl Default for IntentMatcher {
    fn default() -> Self {
        Self {
            min_score: MIN_MATCH_SCORE,
        }
    }
}

impl IntentMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: change the inclusion floor.
    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Score against the default 1920x1080 viewport.
    pub fn score<E: Matchable + Clone>(&self, elements: &[E], intent: &str) -> Vec<ScoredElement<E>> {
        self.score_in(elements, intent, Viewport::default())
    }

    /// Score, filter and sort descending; ties keep input order.
    pub fn score_in<E: Matchable + Clone>(
        &self,
        elements: &[E],
        intent: &str,
        viewport: Viewport,
    ) -> Vec<ScoredElement<E>> {
        let ctx = MatchContext::new(intent, viewport);
        let mut scored: Vec<ScoredElement<E>> = elements
            .iter()
            .filter(|el| el.is_candidate())
            .filter_map(|el| {
                let breakdown = score_one(el, &ctx);
                (breakdown.total >= self.min_score).then(|| ScoredElement {
                    element: el.clone(),
                    match_score: breakdown.total,
                    match_reason: breakdown.reason(),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(
            intent = %ctx.intent_lower,
            candidates = elements.len(),
            matched = scored.len(),
            "scored elements against intent"
        );
        scored
    }
}

fn score_one<E: Matchable>(element: &E, ctx: &MatchContext) -> ScoreBreakdown {
    let profile = element.profile();
    let text = element.text().trim().to_lowercase();
    let mut breakdown = ScoreBreakdown::default();

    if !text.is_empty() {
        if ctx.intent_lower.contains(&text) {
            breakdown.add(profile.text_in_intent, "exact text match");
        }
        for token in ctx.tokens_for(&profile) {
            if text.contains(token.as_str()) {
                breakdown.add(profile.token_in_text, format!("keyword '{}'", token));
            } else if token.contains(&text) {
                breakdown.add(profile.text_in_token, format!("partial '{}'", token));
            }
        }
        if profile.short_text > 0.0 && text.chars().count() < 20 {
            breakdown.add(profile.short_text, "short label");
        }
    }

    if profile.use_confidence {
        if let Some(conf) = element.confidence() {
            breakdown.add((conf / 10.0).min(10.0), "confidence");
        }
    }

    element.structural_score(ctx, &mut breakdown);
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DomPosition;

    fn block(text: &str, confidence: i32, x: i32) -> TextBlock {
        let bbox = BoundingBox::from_xywh(x, 100, 60, 20);
        TextBlock {
            text: text.to_string(),
            confidence,
            bbox,
            center: bbox.center(),
            area: bbox.area(),
            word_count: text.split_whitespace().count(),
        }
    }

    fn node(tag: &str, text: &str, x: f64, y: f64) -> DomElement {
        DomElement::new(
            tag,
            text,
            DomPosition {
                x,
                y,
                width: 100.0,
                height: 40.0,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_punctuation() {
        assert_eq!(
            tokenize_intent("I want to click the \"Sign up\" button, now!"),
            vec!["sign", "button", "now"]
        );
    }

    #[test]
    fn test_submit_outranks_cancel() {
        let blocks = vec![block("Cancel", 90, 100), block("Submit", 90, 300)];
        let ranked = IntentMatcher::new().score(&blocks, "I want to click submit");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].element.text, "Submit");
        assert!(ranked[0].match_score >= 100.0);
        assert!(ranked[0].match_reason.contains("exact text match"));
    }

    #[test]
    fn test_ocr_profile_weights() {
        // keyword 30 + short label 15 + confidence 8
        let ranked = IntentMatcher::new().score(&[block("Checkout now", 80, 0)], "go to checkout");
        assert_eq!(ranked[0].match_score, 53.0);
    }

    #[test]
    fn test_dom_structural_rules() {
        let search = node("input", "", 860.0, 520.0)
            .with_attr("type", "submit")
            .with_attr("value", "Search");
        let ranked = IntentMatcher::new().score(&[search], "search for rust");
        // interactive 30 + submit 15 + value in intent 25 + token in value 15
        // + button-sized 10 + near centre 5
        assert_eq!(ranked[0].match_score, 100.0);
    }

    #[test]
    fn test_dom_skips_non_visual_tags() {
        let elements = vec![node("script", "submit", 0.0, 0.0), node("button", "Submit", 10.0, 500.0)];
        let ranked = IntentMatcher::new().score(&elements, "submit the form");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].element.tag(), "button");
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let elements = vec![
            UiElement::DomNode(node("a", "Pricing", 100.0, 500.0)),
            UiElement::DomNode(node("a", "Pricing", 300.0, 500.0)),
        ];
        let ranked = IntentMatcher::new().score(&elements, "open pricing");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].match_score, ranked[1].match_score);
        assert_eq!(Matchable::center(&ranked[0].element), Point::new(150, 520));
    }

    #[test]
    fn test_mixed_elements_share_one_scorer() {
        let elements = vec![
            UiElement::OcrBlock(block("Login", 95, 50)),
            UiElement::DomNode(node("button", "Login", 1500.0, 900.0)),
        ];
        let ranked = IntentMatcher::new().score(&elements, "login");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].element.profile().kind, "dom");
    }

    fn strip(tag: &str, y: f64, height: f64) -> DomElement {
        DomElement::new(
            tag,
            "",
            DomPosition {
                x: 0.0,
                y,
                width: 400.0,
                height,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_id_and_href_count_each_token() {
        let mut panel = strip("div", 500.0, 10.0);
        panel.id = "search-submit".to_string();
        let ranked = IntentMatcher::new().score(&[panel], "search submit");
        assert_eq!(ranked[0].match_score, 40.0);
        assert!(ranked[0].match_reason.contains("'search' in id"));
        assert!(ranked[0].match_reason.contains("'submit' in id"));

        let link = strip("a", 500.0, 10.0).with_attr("href", "/search/submit");
        let ranked = IntentMatcher::new().score(&[link], "search submit");
        // interactive 30 + two href tokens
        assert_eq!(ranked[0].match_score, 60.0);
    }

    #[test]
    fn test_top_of_page_uses_centre() {
        let matcher = IntentMatcher::new().min_score(0.0);
        // top edge at 90, centre at 110
        let below = matcher.score(&[strip("div", 90.0, 40.0)], "zzz");
        assert_eq!(below[0].match_score, 0.0);
        // centre exactly at 100
        let edge = matcher.score(&[strip("div", 80.0, 40.0)], "zzz");
        assert_eq!(edge[0].match_score, 5.0);
        assert_eq!(edge[0].match_reason, "top of page");
    }

    #[test]
    fn test_ocr_keeps_words_dom_drops() {
        let ctx = MatchContext::new("it can open", Viewport::default());
        assert_eq!(ctx.tokens, vec!["open"]);
        assert_eq!(ctx.ocr_tokens, vec!["can", "open"]);

        // "can" only counts for OCR text
        let ranked = IntentMatcher::new().score(&[block("Can", 0, 0)], "it can");
        assert_eq!(ranked[0].match_score, 145.0);
    }

    #[derive(Debug, Clone)]
    struct Fixed(f64);

    impl Matchable for Fixed {
        fn text(&self) -> &str {
            ""
        }

        fn bbox(&self) -> BoundingBox {
            BoundingBox::from_xywh(0, 0, 10, 10)
        }

        fn center(&self) -> Point {
            Point::new(5, 5)
        }

        fn profile(&self) -> ScoringProfile {
            ScoringProfile::DOM
        }

        fn structural_score(&self, _ctx: &MatchContext, breakdown: &mut ScoreBreakdown) {
            breakdown.add(self.0, "fixed");
        }
    }

    #[test]
    fn test_min_score_is_inclusive() {
        let ranked = IntentMatcher::new().score(&[Fixed(29.0), Fixed(30.0)], "anything");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].match_score, MIN_MATCH_SCORE);
    }
}
