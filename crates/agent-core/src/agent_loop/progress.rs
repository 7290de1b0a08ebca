//! Progress tracking: action diversity, intent alignment and temperature.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::HistoryEntry;
use crate::action::Action;

const POSITIVE_MARKERS: &[&str] = &[
    "successful", "success", "progress", "aligned", "intended", "achieved", "moved", "changed",
    "clicked", "loaded", "appeared", "correctly", "as expected", "visible", "displayed",
];

const NEGATIVE_MARKERS: &[&str] = &[
    "not aligned", "unsuccessful", "failed", "no change", "same", "stuck", "did not", "didn't",
    "hasn't", "no progress", "not as intended", "not working", "unintended", "incorrect", "error",
    "missing",
];

/// Phrases that decide a tie in favour of "no progress".
const TIE_BREAKERS: &[&str] = &["no change", "did not", "didn't", "hasn't", "same"];

pub const MIN_TEMPERATURE: f64 = 0.1;
pub const MAX_TEMPERATURE: f64 = 0.9;

/// Diversity below this triggers the prompt hint.
pub const DIVERSITY_HINT_THRESHOLD: f64 = 0.3;
/// Diversity below this raises temperature.
pub const DIVERSITY_BOOST_THRESHOLD: f64 = 0.4;

pub const LOW_DIVERSITY_HINT: &str = "Your recent actions have been very similar. Try a COMPLETELY \
different approach: move to a different area of the screen or use a different kind of interaction.";

/// Per-step progress figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressAssessment {
    /// Fingerprint distance to the previous screenshot
    pub distance: u32,
    pub visual_change: bool,
    pub making_progress: bool,
    pub diversity: f64,
}

/// Coarse identity of an action; moves collapse onto a 3x3 screen grid.
pub fn action_signature(action: &Action) -> String {
    match action {
        Action::MoveMouse { x, y } => {
            format!("move_mouse:{}:{}", (x / 640).min(2), (y / 360).min(2))
        }
        other => format!("{}:{}", other.tool_name(), Value::Object(other.args())),
    }
}

/// Share of distinct signatures among the last `window` actions.
pub fn action_diversity(history: &[HistoryEntry], window: usize) -> f64 {
    if history.is_empty() || window == 0 {
        return 1.0;
    }
    let recent = &history[history.len().saturating_sub(window)..];
    let mut signatures: Vec<String> = recent.iter().map(|e| action_signature(&e.action)).collect();
    signatures.sort();
    signatures.dedup();
    signatures.len() as f64 / recent.len() as f64
}

pub fn diversity_hint(diversity: f64, history_len: usize) -> Option<&'static str> {
    (diversity < DIVERSITY_HINT_THRESHOLD && history_len >= 3).then_some(LOW_DIVERSITY_HINT)
}

/// Judge an intent-alignment sentence by counting progress markers.
pub fn detect_progress(alignment: &str) -> bool {
    let text = alignment.trim().to_lowercase();
    if text.is_empty() {
        return false;
    }
    let positive = POSITIVE_MARKERS.iter().filter(|m| text.contains(*m)).count();
    let negative = NEGATIVE_MARKERS.iter().filter(|m| text.contains(*m)).count();

    if negative > positive {
        return false;
    }
    if positive > negative {
        return true;
    }
    !TIE_BREAKERS.iter().any(|p| text.contains(p))
}

/// Sampling temperature before diversity and retry adjustments.
pub fn base_temperature(stuck: u32, making_progress: bool, distance: u32) -> f64 {
    if making_progress && distance > 10 {
        return 0.2;
    }
    if stuck > 1 {
        return 0.3 + (0.1 * f64::from(stuck)).min(0.4);
    }
    0.3
}

/// Temperature for the first attempt of a step.
pub fn dynamic_temperature(stuck: u32, making_progress: bool, distance: u32, diversity: f64) -> f64 {
    let mut temperature = base_temperature(stuck, making_progress, distance);
    if diversity < DIVERSITY_BOOST_THRESHOLD {
        temperature += 0.2 * (1.0 - diversity);
    }
    clamp_temperature(temperature)
}

/// Temperature for retry `attempt` (0 for the first call).
pub fn retry_temperature(base: f64, attempt: u32) -> f64 {
    clamp_temperature(base + 0.1 * f64::from(attempt))
}

pub fn clamp_temperature(temperature: f64) -> f64 {
    temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}

/// Stuck counter after a step: grows only when nothing moved and nothing progressed.
pub fn next_stuck_counter(current: u32, visual_change: bool, making_progress: bool) -> u32 {
    if !visual_change && !making_progress {
        current + 1
    } else {
        0
    }
}

/// Split a change description into observation and intent alignment.
pub fn split_alignment(raw: &str) -> (String, Option<String>) {
    match raw.split_once("INTENT ALIGNMENT:") {
        Some((observed, alignment)) => (
            observed.replace("OBSERVED:", "").trim().to_string(),
            Some(alignment.trim().to_string()),
        ),
        None => (raw.trim().to_string(), None),
    }
}

/// Description stored on the history entry.
pub fn format_changes(raw: &str) -> String {
    if !raw.contains("OBSERVED:") {
        return raw.trim().to_string();
    }
    match split_alignment(raw) {
        (observed, Some(alignment)) => format!("{} Intent alignment: {}", observed, alignment),
        (observed, None) => observed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::CommandAck;
    use perceiver_visual::ScreenshotFingerprint;

    fn entries(actions: Vec<Action>) -> Vec<HistoryEntry> {
        actions
            .into_iter()
            .map(|a| {
                HistoryEntry::new(a, CommandAck::default(), Vec::new(), ScreenshotFingerprint::default(), "", 0)
            })
            .collect()
    }

    #[test]
    fn test_diversity_identical_moves() {
        let history = entries(vec![
            Action::MoveMouse { x: 100, y: 100 },
            Action::MoveMouse { x: 110, y: 90 },
            Action::MoveMouse { x: 120, y: 80 },
            Action::MoveMouse { x: 130, y: 70 },
            Action::MoveMouse { x: 140, y: 60 },
        ]);
        assert!((action_diversity(&history, 5) - 0.2).abs() < 1e-9);
        assert!(diversity_hint(0.2, history.len()).is_some());
    }

    #[test]
    fn test_diversity_distinct_tools() {
        let history = entries(vec![
            Action::Click,
            Action::RightClick,
            Action::MoveMouse { x: 10, y: 10 },
            Action::ScrollDown { ticks: 3 },
            Action::Keypress { key: "a".into() },
        ]);
        assert_eq!(action_diversity(&history, 5), 1.0);
        assert_eq!(action_diversity(&[], 5), 1.0);
    }

    #[test]
    fn test_diversity_uses_window() {
        let mut actions = vec![Action::Click, Action::RightClick, Action::MiddleClick];
        actions.extend(std::iter::repeat(Action::ClickHold).take(5));
        assert!((action_diversity(&entries(actions), 5) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_progress_detection() {
        assert!(!detect_progress("Not aligned, no change observed"));
        assert!(detect_progress("Successfully clicked, new panel appeared"));
        assert!(!detect_progress(""));
        assert!(!detect_progress("   "));
        // tie settled by a tie-breaker phrase
        assert!(!detect_progress("Moved, but the page looks the same"));
        // no markers at all
        assert!(detect_progress("Hard to say"));
    }

    #[test]
    fn test_temperature_rules() {
        assert_eq!(base_temperature(0, true, 25), 0.2);
        assert_eq!(base_temperature(0, true, 4), 0.3);
        assert!((base_temperature(3, false, 0) - 0.6).abs() < 1e-9);
        assert!((base_temperature(9, false, 0) - 0.7).abs() < 1e-9);
        // low diversity boost
        assert!((dynamic_temperature(0, false, 0, 0.2) - 0.46).abs() < 1e-9);
        // clamped
        assert_eq!(retry_temperature(0.85, 2), MAX_TEMPERATURE);
        assert_eq!(clamp_temperature(0.0), MIN_TEMPERATURE);
    }

    #[test]
    fn test_stuck_counter() {
        assert_eq!(next_stuck_counter(2, false, false), 3);
        assert_eq!(next_stuck_counter(2, true, false), 0);
        assert_eq!(next_stuck_counter(2, false, true), 0);
    }

    #[test]
    fn test_format_changes() {
        let raw = "OBSERVED: A menu opened. INTENT ALIGNMENT: Aligned with the plan.";
        assert_eq!(format_changes(raw), "A menu opened. Intent alignment: Aligned with the plan.");
        let (_, alignment) = split_alignment(raw);
        assert_eq!(alignment.as_deref(), Some("Aligned with the plan."));
        assert_eq!(format_changes("Screenshot comparison timed out."), "Screenshot comparison timed out.");
        assert_eq!(split_alignment("no markers").1, None);
    }
}
