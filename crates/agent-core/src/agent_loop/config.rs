//! Configuration for the visual action loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the screenshot-driven action loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Step budget before the loop reports a timeout.
    /// Default: 20
    pub max_steps: u32,

    /// Screenshot fetch attempts per step.
    /// Default: 3
    pub screenshot_attempts: u32,

    /// Fixed delay between screenshot attempts in milliseconds.
    /// Default: 2000
    pub screenshot_retry_delay_ms: u64,

    /// Model attempts per step before falling back to a scripted action.
    /// Default: 3
    pub model_attempts: u32,

    /// Most recent history turns sent with their screenshot.
    /// Default: 3
    pub history_image_turns: usize,

    /// History length above which old screenshot bytes are dropped.
    /// Default: 10
    pub prune_after: usize,

    /// Entries that keep their screenshot bytes after pruning.
    /// Default: 5
    pub retain_screenshots: usize,

    /// Actions considered by the diversity score.
    /// Default: 5
    pub diversity_window: usize,

    /// Entries narrated in the timeout summary.
    /// Default: 15
    pub summary_window: usize,

    /// Cursor detection deadline.
    /// Default: 5000
    pub cursor_timeout_ms: u64,

    /// Screenshot comparison deadline.
    /// Default: 8000
    pub compare_timeout_ms: u64,

    /// OCR deadline inside the loop.
    /// Default: 3000
    pub ocr_timeout_ms: u64,

    /// Action model deadline per attempt.
    /// Default: 20000
    pub model_timeout_ms: u64,

    /// Timeout summary deadline.
    /// Default: 15000
    pub summary_timeout_ms: u64,

    /// Page markdown characters included in the prompt.
    /// Default: 10000
    pub markdown_limit: usize,

    /// Wheel ticks used by the scroll fallback.
    /// Default: 100
    pub fallback_scroll_ticks: u32,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            screenshot_attempts: 3,
            screenshot_retry_delay_ms: 2_000,
            model_attempts: 3,
            history_image_turns: 3,
            prune_after: 10,
            retain_screenshots: 5,
            diversity_window: 5,
            summary_window: 15,
            cursor_timeout_ms: 5_000,
            compare_timeout_ms: 8_000,
            ocr_timeout_ms: 3_000,
            model_timeout_ms: 20_000,
            summary_timeout_ms: 15_000,
            markdown_limit: 10_000,
            fallback_scroll_ticks: 100,
        }
    }
}

impl AgentLoopConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a minimal config for testing.
    pub fn minimal() -> Self {
        Self {
            max_steps: 5,
            screenshot_attempts: 2,
            screenshot_retry_delay_ms: 10,
            model_attempts: 2,
            cursor_timeout_ms: 1_000,
            compare_timeout_ms: 1_000,
            ocr_timeout_ms: 500,
            model_timeout_ms: 1_000,
            summary_timeout_ms: 1_000,
            ..Self::default()
        }
    }

    /// Create a config with short deadlines for quick sessions.
    pub fn fast() -> Self {
        Self {
            max_steps: 10,
            screenshot_retry_delay_ms: 500,
            cursor_timeout_ms: 2_000,
            compare_timeout_ms: 4_000,
            ocr_timeout_ms: 1_500,
            model_timeout_ms: 10_000,
            summary_timeout_ms: 8_000,
            ..Self::default()
        }
    }

    /// Builder: set max steps.
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: set model attempts per step.
    pub fn model_attempts(mut self, attempts: u32) -> Self {
        self.model_attempts = attempts.max(1);
        self
    }

    /// Builder: set screenshot retry delay.
    pub fn screenshot_retry_delay(mut self, ms: u64) -> Self {
        self.screenshot_retry_delay_ms = ms;
        self
    }

    /// Builder: set model timeout.
    pub fn model_timeout(mut self, ms: u64) -> Self {
        self.model_timeout_ms = ms;
        self
    }

    pub fn cursor_deadline(&self) -> Duration {
        Duration::from_millis(self.cursor_timeout_ms)
    }

    pub fn compare_deadline(&self) -> Duration {
        Duration::from_millis(self.compare_timeout_ms)
    }

    pub fn ocr_deadline(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }

    pub fn model_deadline(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    pub fn summary_deadline(&self) -> Duration {
        Duration::from_millis(self.summary_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentLoopConfig::default();
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.model_attempts, 3);
        assert_eq!(config.prune_after, 10);
        assert_eq!(config.retain_screenshots, 5);
        assert_eq!(config.compare_deadline(), Duration::from_secs(8));
    }

    #[test]
    fn test_builder() {
        let config = AgentLoopConfig::new()
            .max_steps(3)
            .model_attempts(0)
            .screenshot_retry_delay(0);

        assert_eq!(config.max_steps, 3);
        assert_eq!(config.model_attempts, 1);
        assert_eq!(config.screenshot_retry_delay_ms, 0);
    }

    #[test]
    fn test_minimal_config() {
        let config = AgentLoopConfig::minimal();
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.history_image_turns, 3);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: AgentLoopConfig = serde_json::from_str(r#"{"max_steps": 7}"#).unwrap();
        assert_eq!(config.max_steps, 7);
        assert_eq!(config.fallback_scroll_ticks, 100);
    }
}
