//! Session bookkeeping for the action loop.

use action_locator::{CommandAck, LocatorStrategy};
use chrono::{DateTime, Utc};
use perceiver_visual::{Point, ScreenshotFingerprint};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;

/// A coordinate correction applied to a recorded move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionApplied {
    pub original: Point,
    pub corrected: Point,
    pub reason: String,
    pub strategy: Option<LocatorStrategy>,
}

/// One executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: Action,
    /// Backend acknowledgement for the executed command.
    pub command: CommandAck,
    /// Screenshot the decision was made on; emptied by pruning.
    #[serde(skip)]
    pub screenshot: Vec<u8>,
    #[serde(skip)]
    pub fingerprint: ScreenshotFingerprint,
    pub explanation: String,
    /// What changed after this step, filled in on the next step.
    #[serde(default)]
    pub changes_description: Option<String>,
    /// Stuck counter when the step was taken.
    pub stuck_counter: u32,
    #[serde(default)]
    pub corrections: Vec<CorrectionApplied>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        action: Action,
        command: CommandAck,
        screenshot: Vec<u8>,
        fingerprint: ScreenshotFingerprint,
        explanation: impl Into<String>,
        stuck_counter: u32,
    ) -> Self {
        Self {
            action,
            command,
            screenshot,
            fingerprint,
            explanation: explanation.into(),
            changes_description: None,
            stuck_counter,
            corrections: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn tool_name(&self) -> &'static str {
        self.action.tool_name()
    }

    pub fn has_screenshot(&self) -> bool {
        !self.screenshot.is_empty()
    }

    /// Record a correction and retarget the move so later prompts see it.
    pub fn apply_correction(&mut self, event: CorrectionApplied) {
        if let Action::MoveMouse { x, y } = &mut self.action {
            *x = event.corrected.x;
            *y = event.corrected.y;
        }
        self.corrections.push(event);
    }
}

/// Everything the loop carries between steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub objective: String,
    pub history: Vec<HistoryEntry>,
    pub stuck_counter: u32,
    pub last_diversity: f64,
    pub started_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            objective: objective.into(),
            history: Vec::new(),
            stuck_counter: 0,
            last_diversity: 1.0,
            started_at: Utc::now(),
        }
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut HistoryEntry> {
        self.history.last_mut()
    }

    /// Target of the last entry when it was a `move_mouse`.
    pub fn last_move_target(&self) -> Option<Point> {
        self.last()
            .and_then(|entry| entry.action.target())
            .map(|(x, y)| Point::new(x, y))
    }

    /// Where the cursor should be before this step's capture. The canvas
    /// centre on the first step, nothing when the last action was not a move.
    pub fn expected_cursor(&self) -> Option<Point> {
        if self.history.is_empty() {
            Some(Point::canvas_center())
        } else {
            self.last_move_target()
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Drop screenshot bytes once history exceeds `after` entries,
    /// keeping them on the most recent `keep`.
    pub fn prune(&mut self, after: usize, keep: usize) -> usize {
        if self.history.len() <= after {
            return 0;
        }
        let cutoff = self.history.len().saturating_sub(keep);
        let mut pruned = 0;
        for entry in &mut self.history[..cutoff] {
            if entry.has_screenshot() {
                entry.screenshot = Vec::new();
                pruned += 1;
            }
        }
        pruned
    }
}
