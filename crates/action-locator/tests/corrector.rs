//! Coordinate corrector against scripted collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use action_locator::{
    CommandAck, CommandError, CommandExecutor, CoordinateCorrector, CorrectionModel, CorrectionPrompt,
    CorrectionRequest, CorrectorConfig, DomElement, DomPosition, DomSnapshot, LocatorError,
    LocatorStrategy,
};
use async_trait::async_trait;
use perceiver_visual::{
    CursorColor, OcrOptions, Point, RecognizedWord, TextExtractor, VisualError, WordRecognizer,
};
use serde_json::{Map, Value};

#[derive(Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl RecordingExecutor {
    fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, tool_name: &str, args: &Map<String, Value>) -> Result<CommandAck, CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push((tool_name.to_string(), args.clone()));
        Ok(CommandAck::new(vec![Value::from(":move-mouse")]))
    }
}

struct FailingExecutor;

#[async_trait]
impl CommandExecutor for FailingExecutor {
    async fn execute(&self, tool_name: &str, _args: &Map<String, Value>) -> Result<CommandAck, CommandError> {
        Err(CommandError::rejected(tool_name, "session closed"))
    }
}

struct ScriptedModel {
    reply: String,
    delay: Duration,
    prompts: Mutex<Vec<CorrectionPrompt>>,
}

impl ScriptedModel {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn slow(reply: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(reply)
        }
    }
}

#[async_trait]
impl CorrectionModel for ScriptedModel {
    async fn locate_target(&self, prompt: &CorrectionPrompt) -> Result<String, LocatorError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.reply.clone())
    }
}

struct OneWordRecognizer(&'static str);

impl WordRecognizer for OneWordRecognizer {
    fn recognize(&self, _image: &[u8], _options: &OcrOptions) -> Result<Vec<RecognizedWord>, VisualError> {
        Ok(vec![RecognizedWord {
            text: self.0.to_string(),
            confidence: 90.0,
            block_num: 1,
            par_num: 1,
            line_num: 1,
            left: 1000,
            top: 400,
            width: 100,
            height: 20,
        }])
    }

    fn name(&self) -> &'static str {
        "one-word"
    }
}

fn request(color: CursorColor, intent: &str, dom: Option<DomSnapshot>) -> CorrectionRequest {
    CorrectionRequest {
        screenshot: vec![0xFF, 0xD8, 0xFF],
        intent: intent.to_string(),
        position: Point::new(200, 200),
        cursor_color: color,
        dom,
    }
}

fn submit_page() -> DomSnapshot {
    DomSnapshot::new(vec![
        DomElement::new(
            "div",
            "Welcome",
            DomPosition {
                x: 0.0,
                y: 0.0,
                width: 1920.0,
                height: 200.0,
                ..Default::default()
            },
        ),
        DomElement::new(
            "button",
            "Submit",
            DomPosition {
                x: 400.0,
                y: 300.0,
                width: 100.0,
                height: 40.0,
                ..Default::default()
            },
        ),
    ])
}

#[tokio::test]
async fn green_cursor_short_circuits() {
    let executor = Arc::new(RecordingExecutor::default());
    let corrector = CoordinateCorrector::new(executor.clone(), TextExtractor::disabled());

    let outcome = corrector
        .correct(&request(CursorColor::Green, "submit", Some(submit_page())))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.position, Point::new(200, 200));
    assert_eq!(outcome.explanation, "Cursor is already on a clickable element");
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn structural_tier_moves_to_best_dom_match() {
    let executor = Arc::new(RecordingExecutor::default());
    let corrector = CoordinateCorrector::new(executor.clone(), TextExtractor::disabled());

    let outcome = corrector
        .correct(&request(CursorColor::Red, "I want to click the submit button", Some(submit_page())))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy, Some(LocatorStrategy::Structural));
    assert_eq!(outcome.position, Point::new(450, 320));
    assert!(outcome
        .explanation
        .starts_with("Moved to button 'Submit' at (450, 320) - "));

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "move_mouse");
    assert_eq!(calls[0].1["x"], 450);
    assert_eq!(calls[0].1["y"], 320);
}

#[tokio::test]
async fn ocr_tier_used_without_dom() {
    let executor = Arc::new(RecordingExecutor::default());
    let extractor = TextExtractor::new(Arc::new(OneWordRecognizer("Checkout")), OcrOptions::default());
    let corrector = CoordinateCorrector::new(executor.clone(), extractor);

    let outcome = corrector
        .correct(&request(CursorColor::NotFound, "go to checkout", None))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy, Some(LocatorStrategy::Ocr));
    assert_eq!(outcome.position, Point::new(1050, 410));
    assert_eq!(outcome.explanation, "Moved to 'Checkout' at (1050, 410) (OCR-guided)");
}

#[tokio::test]
async fn model_tier_parses_coordinates() {
    let executor = Arc::new(RecordingExecutor::default());
    let model = Arc::new(ScriptedModel::new(
        "ANALYSIS: The pricing tab in the header.\nCOORDINATES: 700,60",
    ));
    let corrector =
        CoordinateCorrector::new(executor.clone(), TextExtractor::disabled()).with_model(model.clone());

    let outcome = corrector
        .correct(&request(CursorColor::NotFound, "open pricing", None))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy, Some(LocatorStrategy::Model));
    assert_eq!(outcome.position, Point::new(700, 60));
    assert_eq!(outcome.explanation, "Corrected to (700, 60): The pricing tab in the header.");

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].user_prompt.contains("\"open pricing\""));
    assert!(prompts[0].user_prompt.contains("not visible"));
    assert!(prompts[0].user_prompt.contains("No text elements detected."));
    assert_eq!(executor.calls().len(), 1);
}

#[tokio::test]
async fn model_declining_leaves_cursor_in_place() {
    let executor = Arc::new(RecordingExecutor::default());
    let model = Arc::new(ScriptedModel::new(
        "ANALYSIS: Cannot determine target element\nCOORDINATES: NONE",
    ));
    let corrector = CoordinateCorrector::new(executor.clone(), TextExtractor::disabled()).with_model(model);

    let outcome = corrector
        .correct(&request(CursorColor::Red, "open pricing", None))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.position, Point::new(200, 200));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn out_of_bounds_answer_is_rejected() {
    let executor = Arc::new(RecordingExecutor::default());
    let model = Arc::new(ScriptedModel::new("ANALYSIS: off screen\nCOORDINATES: 3000,50"));
    let corrector = CoordinateCorrector::new(executor.clone(), TextExtractor::disabled()).with_model(model);

    let outcome = corrector
        .correct(&request(CursorColor::Red, "open pricing", None))
        .await;

    assert!(!outcome.success);
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn slow_model_times_out() {
    let executor = Arc::new(RecordingExecutor::default());
    let model = Arc::new(ScriptedModel::slow(
        "ANALYSIS: late\nCOORDINATES: 10,10",
        Duration::from_millis(500),
    ));
    let corrector = CoordinateCorrector::new(executor.clone(), TextExtractor::disabled())
        .with_model(model)
        .with_config(CorrectorConfig::default().model_timeout_ms(20));

    let outcome = corrector
        .correct(&request(CursorColor::Red, "open pricing", None))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.explanation, "Analysis timed out");
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn failed_move_is_reported_not_raised() {
    let corrector = CoordinateCorrector::new(Arc::new(FailingExecutor), TextExtractor::disabled());

    let outcome = corrector
        .correct(&request(CursorColor::Red, "submit", Some(submit_page())))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.position, Point::new(200, 200));
    assert_eq!(
        outcome.explanation,
        "Failed to execute move: command 'move_mouse' failed: session closed"
    );
}

#[test]
fn config_builder_overrides_defaults() {
    let config = CorrectorConfig::default().bounds(1280, 720).model_timeout_ms(2_000);
    assert_eq!(config.bounds_width, 1280);
    assert_eq!(config.bounds_height, 720);
    assert_eq!(config.model_timeout_ms, 2_000);
    assert_eq!(config.dom_listing_limit, 15);

    // Blocking entry point works outside an async test too
    let executor = Arc::new(RecordingExecutor::default());
    let corrector = CoordinateCorrector::new(executor, TextExtractor::disabled()).with_config(config);
    let outcome = tokio_test::block_on(corrector.correct(&request(CursorColor::Blue, "drag", None)));
    assert!(!outcome.success);
}
