//! Agent Loop Controller - orchestration of the screenshot-driven loop.
//!
//! Each step perceives the page (screenshot, DOM, cursor, optional OCR),
//! repairs a missed mouse move, updates progress bookkeeping, asks the
//! vision model for one action and executes it.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_locator::{
    filter_clickable, summarize_for_prompt, CommandExecutor, CoordinateCorrector, CorrectionModel,
    CorrectionRequest, CorrectorConfig, DomSnapshot, DEFAULT_PROMPT_LIMIT, NO_DOM_DATA,
};
use perceiver_visual::{
    annotate_cursor, blocking_with_deadline, describe_blocks, distance, fingerprint, with_deadline, CursorColor,
    CursorLocator, CursorObservation, Point, ScreenshotFingerprint, TextExtractor, NO_CHANGE_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::AgentLoopConfig;
use super::fallback::{augment_explanation, fallback_action};
use super::progress::{
    action_diversity, detect_progress, diversity_hint, dynamic_temperature, format_changes, next_stuck_counter,
    retry_temperature, split_alignment, ProgressAssessment,
};
use super::prompt::{build_prompt, wants_ocr, PromptContext, StepView};
use super::summary::summarize_timeout;
use super::types::{CorrectionApplied, HistoryEntry, SessionState};
use crate::action::Action;
use crate::errors::AgentError;
use crate::llm_provider::{ActionModel, ChangeRequest, SessionBackend};

/// Change text used when the comparison is skipped for a stuck session.
pub const SKIPPED_COMPARISON: &str = "No significant visual changes detected.";

/// Change text used when the comparison overruns its deadline.
pub const COMPARISON_TIMED_OUT: &str = "Screenshot comparison timed out.";

/// Result of an agent loop execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopResult {
    /// Final status of the loop.
    pub status: AgentLoopStatus,
    /// Completion feedback, failure reason or timeout summary.
    pub message: String,
    /// Total steps taken.
    pub steps_taken: u32,
    /// Feedback passed to `report_done`.
    pub final_output: Option<String>,
    /// Session state at termination.
    pub session: SessionState,
    /// Total execution time in milliseconds.
    pub total_time_ms: u64,
}

impl AgentLoopResult {
    /// Create a completed result.
    pub fn completed(feedback: String, steps: u32, session: SessionState, time_ms: u64) -> Self {
        Self {
            status: AgentLoopStatus::Completed,
            final_output: Some(feedback.clone()),
            message: feedback,
            steps_taken: steps,
            session,
            total_time_ms: time_ms,
        }
    }

    /// Create a failed result.
    pub fn failed(message: String, steps: u32, session: SessionState, time_ms: u64) -> Self {
        Self {
            status: AgentLoopStatus::Failed,
            message,
            steps_taken: steps,
            final_output: None,
            session,
            total_time_ms: time_ms,
        }
    }

    /// Create a result for an exhausted step budget.
    pub fn timed_out(summary: String, steps: u32, session: SessionState, time_ms: u64) -> Self {
        Self {
            status: AgentLoopStatus::TimedOut,
            message: summary,
            steps_taken: steps,
            final_output: None,
            session,
            total_time_ms: time_ms,
        }
    }

    /// Check if the loop completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self.status, AgentLoopStatus::Completed)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.session.history
    }
}

/// Status of the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLoopStatus {
    /// The model reported the objective done.
    Completed,
    /// Screenshots or command execution failed.
    Failed,
    /// Step budget exhausted.
    TimedOut,
}

/// Outcome of one step.
#[derive(Debug)]
enum StepOutcome {
    Continue,
    Done(String),
}

/// Action chosen for a step.
#[derive(Debug)]
struct Decision {
    action: Action,
    explanation: String,
    fallback: bool,
}

/// Controller for the action loop.
///
/// Steps run sequentially; the session state is owned by `run` and never
/// shared, so no locks are involved.
pub struct AgentLoopController {
    backend: Arc<dyn SessionBackend>,
    model: Arc<dyn ActionModel>,
    corrector: CoordinateCorrector,
    extractor: TextExtractor,
    locator: CursorLocator,
    config: AgentLoopConfig,
}

impl std::fmt::Debug for AgentLoopController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoopController")
            .field("corrector", &self.corrector)
            .field("extractor", &self.extractor)
            .field("config", &self.config)
            .finish()
    }
}

impl AgentLoopController {
    /// Create a controller; the backend doubles as the corrector's executor.
    pub fn new<B>(backend: Arc<B>, model: Arc<dyn ActionModel>, extractor: TextExtractor, config: AgentLoopConfig) -> Self
    where
        B: SessionBackend + 'static,
    {
        let executor: Arc<dyn CommandExecutor> = backend.clone();
        let corrector = CoordinateCorrector::new(executor, extractor.clone());
        Self {
            backend,
            model,
            corrector,
            extractor,
            locator: CursorLocator::new(),
            config,
        }
    }

    /// Builder: enable the vision tier of coordinate correction.
    pub fn with_correction_model(mut self, model: Arc<dyn CorrectionModel>) -> Self {
        self.corrector = self.corrector.with_model(model);
        self
    }

    /// Builder: override corrector bounds and deadlines.
    pub fn with_corrector_config(mut self, config: CorrectorConfig) -> Self {
        self.corrector = self.corrector.with_config(config);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    /// Drive the session until `report_done`, a fatal error or the step budget.
    pub async fn run(&self, objective: &str) -> AgentLoopResult {
        let started = Instant::now();
        let mut session = SessionState::new(objective);
        info!(
            session_id = %session.session_id,
            objective,
            max_steps = self.config.max_steps,
            "starting action loop"
        );

        for step in 0..self.config.max_steps {
            match self.step(&mut session, step).await {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Done(feedback)) => {
                    info!(step, feedback = %feedback, "objective reported done");
                    return AgentLoopResult::completed(feedback, step + 1, session, elapsed_ms(started));
                }
                Err(err) => {
                    warn!(step, error = %err, "action loop failed");
                    let steps = session.history.len() as u32;
                    return AgentLoopResult::failed(err.to_string(), steps, session, elapsed_ms(started));
                }
            }
        }

        info!(steps = self.config.max_steps, "step budget exhausted");
        let summary = summarize_timeout(
            self.model.as_ref(),
            &session.objective,
            &session.history,
            self.config.summary_window,
            self.config.summary_deadline(),
        )
        .await;
        AgentLoopResult::timed_out(summary, self.config.max_steps, session, elapsed_ms(started))
    }

    async fn step(&self, session: &mut SessionState, step: u32) -> Result<StepOutcome, AgentError> {
        let screenshot = self.acquire_screenshot(step).await?;

        let dom = self.backend.fetch_dom_elements(step).await.unwrap_or_else(|err| {
            warn!(step, error = %err, "DOM snapshot unavailable");
            None
        });
        let markdown = self.backend.fetch_dom_text(step).await.unwrap_or_else(|err| {
            warn!(step, error = %err, "page text unavailable");
            None
        });

        let current_fp = self.fingerprint(&screenshot).await;
        let mut expected = session.expected_cursor();
        let mut cursor = self.locate_cursor(&screenshot, expected).await;
        debug!(step, cursor = %cursor.color, position = %cursor.position, "cursor located");

        if let Some(corrected) = self.maybe_correct(session, &screenshot, cursor, dom.as_ref()).await {
            cursor = corrected;
            expected = Some(corrected.position);
        }

        // progress bookkeeping against the previous step
        let mut changes = None;
        let mut screen_distance = None;
        let mut temperature = dynamic_temperature(session.stuck_counter, false, 0, 1.0);
        if session.last().is_some() {
            let diversity = action_diversity(&session.history, self.config.diversity_window);
            session.last_diversity = diversity;

            let (dist, raw) = self.compare_with_previous(session, &screenshot, &current_fp).await;
            let assessment = ProgressAssessment {
                distance: dist,
                visual_change: dist >= NO_CHANGE_THRESHOLD,
                making_progress: split_alignment(&raw).1.is_some_and(|a| detect_progress(&a)),
                diversity,
            };
            let formatted = format_changes(&raw);
            if let Some(last) = session.last_mut() {
                last.changes_description = Some(formatted.clone());
            }
            session.stuck_counter = next_stuck_counter(
                session.stuck_counter,
                assessment.visual_change,
                assessment.making_progress,
            );
            temperature = dynamic_temperature(
                session.stuck_counter,
                assessment.making_progress,
                assessment.distance,
                assessment.diversity,
            );

            info!(
                step,
                distance = assessment.distance,
                visual_change = assessment.visual_change,
                making_progress = assessment.making_progress,
                diversity = assessment.diversity,
                stuck = session.stuck_counter,
                "progress assessed"
            );
            changes = Some(formatted);
            screen_distance = Some(assessment.distance);
        }
        let stuck = session.stuck_counter;

        let elements = dom.as_ref().map(|d| d.elements.as_slice()).unwrap_or(&[]);
        let clickable_count = filter_clickable(elements).len();
        let dom_listing = match summarize_for_prompt(elements, DEFAULT_PROMPT_LIMIT) {
            listing if listing == NO_DOM_DATA => String::new(),
            listing => listing,
        };
        let ocr_listing = if wants_ocr(&dom_listing, clickable_count, stuck) && self.extractor.is_available() {
            let blocks = self
                .extractor
                .extract_within(&screenshot, self.config.ocr_deadline())
                .await;
            describe_blocks(&blocks)
        } else {
            String::new()
        };

        let view = StepView {
            stuck_counter: stuck,
            cursor: Some(cursor),
            expected_cursor: expected,
            diversity_hint: diversity_hint(session.last_diversity, session.history.len()).map(str::to_string),
            changes,
            dom_listing,
            clickable_count,
            ocr_listing,
            markdown,
            screen_distance,
            screenshot: self.annotated(&screenshot, cursor).await,
        };
        let prompt = build_prompt(
            &session.objective,
            &session.history,
            &view,
            self.config.history_image_turns,
            self.config.markdown_limit,
        );

        let decision = self.decide(&prompt, temperature, session).await;
        info!(
            step,
            tool = decision.action.tool_name(),
            fallback = decision.fallback,
            temperature,
            "action chosen"
        );

        if let Action::ReportDone { feedback } = &decision.action {
            return Ok(StepOutcome::Done(feedback.clone()));
        }

        let ack = self
            .backend
            .execute(decision.action.tool_name(), &decision.action.args())
            .await?;
        session.push(HistoryEntry::new(
            decision.action,
            ack,
            screenshot,
            current_fp,
            decision.explanation,
            stuck,
        ));
        let pruned = session.prune(self.config.prune_after, self.config.retain_screenshots);
        if pruned > 0 {
            debug!(step, pruned, "dropped old screenshots");
        }
        Ok(StepOutcome::Continue)
    }

    /// Fetch a non-empty screenshot with fixed-delay retries.
    async fn acquire_screenshot(&self, step: u32) -> Result<Vec<u8>, AgentError> {
        let attempts = self.config.screenshot_attempts.max(1);
        let delay = Duration::from_millis(self.config.screenshot_retry_delay_ms);
        let mut last_error = String::from("empty screenshot");

        for attempt in 1..=attempts {
            match self.backend.fetch_screenshot(step).await {
                Ok(bytes) if !bytes.is_empty() => return Ok(bytes),
                Ok(_) => {
                    warn!(step, attempt, "screenshot empty");
                    last_error = String::from("empty screenshot");
                }
                Err(err) => {
                    warn!(step, attempt, error = %err, "screenshot fetch failed");
                    last_error = err.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        Err(AgentError::ScreenshotUnavailable(format!(
            "step {}: {} attempts failed, last error: {}",
            step, attempts, last_error
        )))
    }

    async fn fingerprint(&self, screenshot: &[u8]) -> ScreenshotFingerprint {
        let bytes = screenshot.to_vec();
        blocking_with_deadline(
            "fingerprint",
            self.config.cursor_deadline(),
            ScreenshotFingerprint::default(),
            move || Ok::<_, Infallible>(fingerprint(&bytes)),
        )
        .await
    }

    async fn locate_cursor(&self, screenshot: &[u8], expected: Option<Point>) -> CursorObservation {
        let bytes = screenshot.to_vec();
        let locator = self.locator;
        blocking_with_deadline(
            "cursor",
            self.config.cursor_deadline(),
            CursorObservation::not_found(expected.unwrap_or_else(Point::canvas_center)),
            move || Ok::<_, Infallible>(locator.locate(&bytes, expected)),
        )
        .await
    }

    /// Screenshot sent to the model; highlighted when the cursor was found.
    async fn annotated(&self, screenshot: &[u8], cursor: CursorObservation) -> Vec<u8> {
        if !cursor.color.is_visible() {
            return screenshot.to_vec();
        }
        let bytes = screenshot.to_vec();
        blocking_with_deadline(
            "annotate",
            self.config.cursor_deadline(),
            screenshot.to_vec(),
            move || annotate_cursor(&bytes, &cursor),
        )
        .await
    }

    /// Repair the previous move when the cursor missed and the session stalls.
    async fn maybe_correct(
        &self,
        session: &mut SessionState,
        screenshot: &[u8],
        cursor: CursorObservation,
        dom: Option<&DomSnapshot>,
    ) -> Option<CursorObservation> {
        let last = session.last()?;
        let (x, y) = last.action.target()?;
        if !cursor.color.needs_correction() || session.stuck_counter == 0 || last.explanation.trim().is_empty() {
            return None;
        }

        let original = Point::new(x, y);
        let request = CorrectionRequest {
            screenshot: screenshot.to_vec(),
            intent: last.explanation.clone(),
            position: cursor.position,
            cursor_color: cursor.color,
            dom: dom.cloned(),
        };
        let outcome = self.corrector.correct(&request).await;
        if !outcome.success {
            debug!(reason = %outcome.explanation, "no correction applied");
            return None;
        }

        info!(
            strategy = outcome.strategy.map(|s| s.name()).unwrap_or("none"),
            from = %original,
            to = %outcome.position,
            "corrected cursor position"
        );
        let corrected = outcome.position;
        if let Some(entry) = session.last_mut() {
            entry.apply_correction(CorrectionApplied {
                original,
                corrected,
                reason: outcome.explanation,
                strategy: outcome.strategy,
            });
        }
        Some(CursorObservation::new(CursorColor::Unknown, corrected))
    }

    /// Fingerprint distance and change description for the previous step.
    async fn compare_with_previous(
        &self,
        session: &SessionState,
        screenshot: &[u8],
        current_fp: &ScreenshotFingerprint,
    ) -> (u32, String) {
        let Some(previous) = session.last() else {
            return (0, SKIPPED_COMPARISON.to_string());
        };
        let dist = distance(&previous.fingerprint, current_fp);

        if session.stuck_counter >= 3 || !previous.has_screenshot() {
            return (dist, SKIPPED_COMPARISON.to_string());
        }

        let request = ChangeRequest {
            before: previous.screenshot.clone(),
            after: screenshot.to_vec(),
            last_command: previous.action.call_text(),
            intent: previous.explanation.clone(),
        };
        let described = with_deadline(
            "describe_changes",
            self.config.compare_deadline(),
            Ok(COMPARISON_TIMED_OUT.to_string()),
            self.model.describe_changes(&request),
        )
        .await;
        let raw = described.unwrap_or_else(|err| {
            warn!(error = %err, "screenshot comparison failed");
            format!("Screenshot comparison failed: {}", err)
        });
        (dist, raw)
    }

    /// Ask the model for a usable tool call, falling back after the last attempt.
    async fn decide(&self, prompt: &PromptContext, base_temperature: f64, session: &SessionState) -> Decision {
        let attempts = self.config.model_attempts.max(1);
        for attempt in 0..attempts {
            let temperature = retry_temperature(base_temperature, attempt);
            let reply = with_deadline(
                "next_action",
                self.config.model_deadline(),
                Err(AgentError::timeout("action model call timed out")),
                self.model.next_action(prompt, temperature),
            )
            .await;

            let reply = match reply {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(attempt, temperature, error = %err, "action model failed");
                    continue;
                }
            };
            let Some(call) = reply.call else {
                warn!(attempt, temperature, "model answered without a function call");
                continue;
            };
            match Action::from_call(&call.name, &call.args) {
                Ok(action) => {
                    let explanation = augment_explanation(&reply.explanation, &action);
                    return Decision {
                        action,
                        explanation,
                        fallback: false,
                    };
                }
                Err(err) => {
                    warn!(attempt, tool = %call.name, error = %err, "rejected function call");
                }
            }
        }

        let action = fallback_action(&session.history, session.stuck_counter, self.config.fallback_scroll_ticks);
        warn!(tool = action.tool_name(), "using fallback action");
        Decision {
            explanation: augment_explanation("", &action),
            action,
            fallback: true,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_constructors() {
        let session = SessionState::new("goal");
        let done = AgentLoopResult::completed("found it".into(), 2, session.clone(), 10);
        assert!(done.is_success());
        assert_eq!(done.final_output.as_deref(), Some("found it"));

        let failed = AgentLoopResult::failed("no screenshot".into(), 0, session.clone(), 10);
        assert_eq!(failed.status, AgentLoopStatus::Failed);
        assert!(failed.final_output.is_none());

        let timed_out = AgentLoopResult::timed_out("summary".into(), 3, session, 10);
        assert_eq!(timed_out.status, AgentLoopStatus::TimedOut);
        assert_eq!(timed_out.steps_taken, 3);
        assert!(timed_out.history().is_empty());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&AgentLoopStatus::TimedOut).unwrap(), "\"timed_out\"");
    }
}
