//! Coordinate self-correction after a move lands on nothing clickable.
//!
//! The corrector walks [`LocatorStrategy::fallback_chain`] and stops at the
//! first tier that yields a target and a successful `move_mouse`. A failed
//! move ends the attempt; it is reported, never propagated.

use std::sync::Arc;
use std::time::Duration;

use perceiver_visual::{
    describe_blocks, with_deadline, Point, TextBlock, TextExtractor, CANVAS_HEIGHT, CANVAS_WIDTH,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dom::{describe_for_correction, filter_clickable};
use crate::errors::LocatorError;
use crate::grammar::parse_target;
use crate::matcher::IntentMatcher;
use crate::ports::{move_args, CommandExecutor, CorrectionModel};
use crate::types::{CorrectionOutcome, CorrectionPrompt, CorrectionRequest, DomElement, LocatorStrategy};

const ALREADY_CLICKABLE: &str = "Cursor is already on a clickable element";
const NO_TARGET: &str = "No suitable correction target found";

const CORRECTION_SYSTEM_PROMPT: &str = "You look at a browser screenshot on behalf of an automation agent. \
The agent moved the mouse to reach an element, but the cursor marker is red (not clickable) or missing. \
Find the element that matches the agent's intent and give the centre of it in screen pixels. \
Only clickable things qualify: buttons, links, tabs, inputs. Answer briefly and precisely.";

/// Tunables for [`CoordinateCorrector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectorConfig {
    /// Accepted x range for model answers is `0..=bounds_width`
    pub bounds_width: i32,
    pub bounds_height: i32,
    /// Deadline for the model tier
    pub model_timeout_ms: u64,
    /// DOM lines included in the model prompt
    pub dom_listing_limit: usize,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            bounds_width: CANVAS_WIDTH,
            bounds_height: CANVAS_HEIGHT,
            model_timeout_ms: 10_000,
            dom_listing_limit: 15,
        }
    }
}

impl CorrectorConfig {
    /// Builder: set model deadline
    pub fn model_timeout_ms(mut self, ms: u64) -> Self {
        self.model_timeout_ms = ms;
        self
    }

    /// Builder: set accepted coordinate bounds
    pub fn bounds(mut self, width: i32, height: i32) -> Self {
        self.bounds_width = width;
        self.bounds_height = height;
        self
    }
}

/// A tier's pick, before the move is issued.
struct Target {
    position: Point,
    explanation: String,
}

/// Relocates a cursor that missed its target.
pub struct CoordinateCorrector {
    executor: Arc<dyn CommandExecutor>,
    extractor: TextExtractor,
    model: Option<Arc<dyn CorrectionModel>>,
    matcher: IntentMatcher,
    config: CorrectorConfig,
}

impl CoordinateCorrector {
    pub fn new(executor: Arc<dyn CommandExecutor>, extractor: TextExtractor) -> Self {
        Self {
            executor,
            extractor,
            model: None,
            matcher: IntentMatcher::default(),
            config: CorrectorConfig::default(),
        }
    }

    /// Builder: enable the model tier
    pub fn with_model(mut self, model: Arc<dyn CorrectionModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_config(mut self, config: CorrectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CorrectorConfig {
        &self.config
    }

    /// Try each tier in order and move the mouse to the first target found.
    pub async fn correct(&self, request: &CorrectionRequest) -> CorrectionOutcome {
        if !request.cursor_color.needs_correction() {
            debug!(color = %request.cursor_color, "no correction needed");
            return CorrectionOutcome::unchanged(request.position, ALREADY_CLICKABLE);
        }

        info!(
            intent = %request.intent,
            position = %request.position,
            color = %request.cursor_color,
            "Attempting coordinate correction"
        );

        // OCR output is shared between the OCR and model tiers
        let mut ocr_blocks: Option<Vec<TextBlock>> = None;
        let mut last_failure = NO_TARGET.to_string();

        for strategy in LocatorStrategy::fallback_chain() {
            let attempt = match strategy {
                LocatorStrategy::Structural => self.structural_target(request),
                LocatorStrategy::Ocr => {
                    let blocks = self.ocr_blocks(&mut ocr_blocks, &request.screenshot).await;
                    self.ocr_target(blocks, &request.intent)
                }
                LocatorStrategy::Model => {
                    let blocks = self.ocr_blocks(&mut ocr_blocks, &request.screenshot).await;
                    self.model_target(request, blocks).await
                }
            };

            match attempt {
                Ok(target) => {
                    debug!(
                        strategy = strategy.name(),
                        target = %target.position,
                        "tier produced a target"
                    );
                    return self.move_to(strategy, target, request.position).await;
                }
                Err(err) => {
                    debug!(strategy = strategy.name(), error = %err, "tier failed");
                    last_failure = match err {
                        LocatorError::Timeout(reason) => reason,
                        _ => NO_TARGET.to_string(),
                    };
                }
            }
        }

        warn!(intent = %request.intent, "All correction tiers exhausted");
        CorrectionOutcome::unchanged(request.position, last_failure)
    }

    fn structural_target(&self, request: &CorrectionRequest) -> Result<Target, LocatorError> {
        let snapshot = request
            .dom
            .as_ref()
            .filter(|dom| !dom.is_empty())
            .ok_or_else(|| LocatorError::StrategyFailed {
                strategy: LocatorStrategy::Structural.name().to_string(),
                reason: "no DOM snapshot".to_string(),
            })?;

        let clickable: Vec<DomElement> = filter_clickable(&snapshot.elements)
            .into_iter()
            .cloned()
            .collect();
        let ranked = self
            .matcher
            .score_in(&clickable, &request.intent, snapshot.viewport_or_default());
        let best = ranked
            .into_iter()
            .next()
            .ok_or_else(|| LocatorError::TargetNotFound("no DOM element matches intent".into()))?;

        let position = best.element.position.center();
        Ok(Target {
            position,
            explanation: format!(
                "Moved to {} '{}' at {} - {}",
                best.element.tag(),
                best.element.text.trim(),
                position,
                best.match_reason
            ),
        })
    }

    fn ocr_target(&self, blocks: &[TextBlock], intent: &str) -> Result<Target, LocatorError> {
        if blocks.is_empty() {
            return Err(LocatorError::StrategyFailed {
                strategy: LocatorStrategy::Ocr.name().to_string(),
                reason: "no text blocks".to_string(),
            });
        }
        let best = self
            .matcher
            .score(blocks, intent)
            .into_iter()
            .next()
            .ok_or_else(|| LocatorError::TargetNotFound("no text block matches intent".into()))?;

        Ok(Target {
            position: best.element.center,
            explanation: format!(
                "Moved to '{}' at {} (OCR-guided)",
                best.element.text, best.element.center
            ),
        })
    }

    async fn model_target(
        &self,
        request: &CorrectionRequest,
        blocks: &[TextBlock],
    ) -> Result<Target, LocatorError> {
        let Some(model) = self.model.as_ref() else {
            return Err(LocatorError::StrategyFailed {
                strategy: LocatorStrategy::Model.name().to_string(),
                reason: "no correction model configured".to_string(),
            });
        };

        let prompt = self.build_prompt(request, blocks);
        let limit = Duration::from_millis(self.config.model_timeout_ms);
        let response = with_deadline(
            "correction_model",
            limit,
            Err(LocatorError::Timeout("Analysis timed out".to_string())),
            model.locate_target(&prompt),
        )
        .await?;

        let answer = parse_target(&response, self.config.bounds_width, self.config.bounds_height)?;
        let position = answer
            .target
            .ok_or_else(|| LocatorError::TargetNotFound("model found no target".into()))?;
        let analysis = if answer.analysis.is_empty() {
            "No analysis provided".to_string()
        } else {
            answer.analysis
        };

        Ok(Target {
            position,
            explanation: format!("Corrected to {}: {}", position, analysis),
        })
    }

    /// Prompt for the model tier.
    pub fn build_prompt(&self, request: &CorrectionRequest, blocks: &[TextBlock]) -> CorrectionPrompt {
        let cursor_state = if request.cursor_color.is_visible() {
            "RED (non-clickable)"
        } else {
            "not visible"
        };
        let dom_listing = request
            .dom
            .as_ref()
            .map(|dom| describe_for_correction(&dom.elements, self.config.dom_listing_limit))
            .unwrap_or_default();

        let user_prompt = format!(
            "The agent wanted to: \"{intent}\"\n\n\
             The cursor is at {position} and shows as {cursor_state}.\n\n\
             Text found on the page:\n{ocr}\n\n\
             {dom}\n\
             Pick the element the agent is after and reply in exactly this form:\n\n\
             ANALYSIS: [one line on which element you chose]\n\
             COORDINATES: [x],[y]\n\n\
             If no element fits, reply:\n\
             ANALYSIS: Cannot determine target element\n\
             COORDINATES: NONE",
            intent = request.intent,
            position = request.position,
            cursor_state = cursor_state,
            ocr = describe_blocks(blocks),
            dom = dom_listing,
        );

        CorrectionPrompt {
            system_instruction: CORRECTION_SYSTEM_PROMPT.to_string(),
            user_prompt,
            screenshot: request.screenshot.clone(),
        }
    }

    async fn ocr_blocks<'a>(
        &self,
        cache: &'a mut Option<Vec<TextBlock>>,
        screenshot: &[u8],
    ) -> &'a [TextBlock] {
        if cache.is_none() {
            *cache = Some(self.extractor.extract(screenshot).await);
        }
        cache.as_deref().unwrap_or_default()
    }

    async fn move_to(&self, strategy: LocatorStrategy, target: Target, original: Point) -> CorrectionOutcome {
        let args = move_args(target.position.x, target.position.y);
        match self.executor.execute("move_mouse", &args).await {
            Ok(_) => {
                info!(
                    strategy = strategy.name(),
                    from = %original,
                    to = %target.position,
                    "Coordinate correction applied"
                );
                CorrectionOutcome::corrected(strategy, target.position, target.explanation)
            }
            Err(e) => {
                warn!(strategy = strategy.name(), error = %e, "Corrective move failed");
                CorrectionOutcome::unchanged(original, format!("Failed to execute move: {}", e))
            }
        }
    }
}

impl std::fmt::Debug for CoordinateCorrector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateCorrector")
            .field("extractor", &self.extractor)
            .field("model", &self.model.is_some())
            .field("config", &self.config)
            .finish()
    }
}
