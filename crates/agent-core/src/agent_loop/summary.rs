//! Narrative summary produced when the step budget runs out.

use std::time::Duration;

use perceiver_visual::with_deadline;
use tracing::warn;

use super::types::HistoryEntry;
use crate::errors::AgentError;
use crate::llm_provider::ActionModel;

pub const NO_ACTIONS_SUMMARY: &str = "No actions were taken before the task timed out.";

pub const SUMMARY_UNAVAILABLE: &str =
    "The task timed out before the objective was reached, and a summary of the attempted steps could not be generated.";

/// Step-by-step narrative over the last `window` entries.
pub fn narrative(history: &[HistoryEntry], window: usize) -> String {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .enumerate()
        .map(|(offset, entry)| {
            let observed = entry
                .changes_description
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or("nothing recorded");
            format!(
                "Step {}: Agent planned: \"{}\". Action: {}. Observed: \"{}\".",
                start + offset + 1,
                entry.explanation.trim(),
                entry.action.call_text(),
                observed.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summary_prompt(objective: &str, narrative: &str) -> String {
    format!(
        "An agent controlling a web browser ran out of steps while working on this objective: \"{}\".\n\
         Here is what it did:\n{}\n\n\
         Summarise in a few sentences what was accomplished, where it got stuck, and what should be tried next.",
        objective, narrative
    )
}

/// Ask the model for a timeout summary, never failing.
pub async fn summarize_timeout(
    model: &dyn ActionModel,
    objective: &str,
    history: &[HistoryEntry],
    window: usize,
    limit: Duration,
) -> String {
    if history.is_empty() {
        return NO_ACTIONS_SUMMARY.to_string();
    }
    let prompt = summary_prompt(objective, &narrative(history, window));
    let result = with_deadline(
        "timeout_summary",
        limit,
        Err(AgentError::timeout("summary timed out")),
        model.summarize(&prompt),
    )
    .await;
    match result {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => SUMMARY_UNAVAILABLE.to_string(),
        Err(err) => {
            warn!(error = %err, "timeout summary failed");
            SUMMARY_UNAVAILABLE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::llm_provider::{ChangeRequest, MockActionModel, ModelReply};
    use crate::agent_loop::prompt::PromptContext;
    use action_locator::CommandAck;
    use async_trait::async_trait;
    use perceiver_visual::ScreenshotFingerprint;

    fn entry(action: Action, explanation: &str, observed: Option<&str>) -> HistoryEntry {
        let mut e = HistoryEntry::new(action, CommandAck::default(), vec![], ScreenshotFingerprint::default(), explanation, 0);
        e.changes_description = observed.map(str::to_string);
        e
    }

    struct SilentModel;

    #[async_trait]
    impl ActionModel for SilentModel {
        async fn next_action(&self, _prompt: &PromptContext, _t: f64) -> Result<ModelReply, AgentError> {
            Ok(ModelReply::default())
        }

        async fn describe_changes(&self, _request: &ChangeRequest) -> Result<String, AgentError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_narrative_window_numbering() {
        let history: Vec<HistoryEntry> = (0..4)
            .map(|i| entry(Action::MoveMouse { x: i, y: 0 }, "look", None))
            .collect();
        let text = narrative(&history, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "Step 3: Agent planned: \"look\". Action: move_mouse(x=2, y=0). Observed: \"nothing recorded\"."
        );
    }

    #[tokio::test]
    async fn test_summary_paths() {
        let model = MockActionModel::new();
        let empty = summarize_timeout(&model, "x", &[], 15, Duration::from_secs(1)).await;
        assert_eq!(empty, NO_ACTIONS_SUMMARY);

        let history = vec![entry(Action::Click, "press", Some("Menu opened."))];
        let text = summarize_timeout(&model, "x", &history, 15, Duration::from_secs(1)).await;
        assert!(text.starts_with("Mock summary of"));

        // default trait method refuses
        let text = summarize_timeout(&SilentModel, "x", &history, 15, Duration::from_secs(1)).await;
        assert_eq!(text, SUMMARY_UNAVAILABLE);
    }
}
