//! Scripted actions for when the model gives nothing usable.

use perceiver_visual::{CANVAS_HEIGHT, CANVAS_WIDTH};

use super::types::HistoryEntry;
use crate::action::Action;

/// Explanations shorter than this get a tool-specific sentence appended.
pub const MIN_EXPLANATION_WORDS: usize = 10;

/// Deterministic next action after every model attempt failed.
pub fn fallback_action(history: &[HistoryEntry], stuck: u32, scroll_ticks: u32) -> Action {
    let Some(last) = history.last() else {
        return centre();
    };

    if stuck >= 2 {
        return match last.action.target() {
            Some((x, y)) => {
                let (x, y) = opposite_quadrant(x, y);
                Action::MoveMouse { x, y }
            }
            None => Action::MoveMouse { x: 800, y: 400 },
        };
    }

    if history.iter().any(|entry| entry.action.target().is_some()) {
        return Action::ScrollDown { ticks: scroll_ticks };
    }
    centre()
}

fn centre() -> Action {
    Action::MoveMouse {
        x: CANVAS_WIDTH / 2,
        y: CANVAS_HEIGHT / 2,
    }
}

/// Jump to the diagonally opposite quadrant.
fn opposite_quadrant(x: i32, y: i32) -> (i32, i32) {
    let left = x < CANVAS_WIDTH / 2;
    let top = y < CANVAS_HEIGHT / 2;
    match (left, top) {
        (true, true) => (1400, 800),
        (false, true) => (400, 800),
        (true, false) => (1400, 200),
        (false, false) => (400, 200),
    }
}

/// Fill in or extend a thin explanation so history stays readable.
pub fn augment_explanation(explanation: &str, action: &Action) -> String {
    let explanation = explanation.trim();
    if explanation.is_empty() {
        return action.default_explanation();
    }
    if explanation.split_whitespace().count() >= MIN_EXPLANATION_WORDS {
        return explanation.to_string();
    }
    match action {
        Action::MoveMouse { x, y } => format!(
            "{} I'm moving the mouse to coordinates ({}, {}) to position over what appears to be an important element.",
            explanation, x, y
        ),
        Action::Click => format!(
            "{} I'm clicking to interact with the element where the cursor is currently positioned.",
            explanation
        ),
        _ => explanation.to_string(),
    }
}
