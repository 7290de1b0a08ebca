//! Observe-decide-act loop over screenshots.
//!
//! # Architecture
//!
//! ```text
//! for step in 0..max_steps:
//!     shot   = screenshot()            // retried, fatal when exhausted
//!     cursor = locate(shot)            // repaired by the corrector when it missed
//!     assess(previous, shot)           // diversity, change description, stuck counter
//!     action = model.decide(prompt)    // retried with rising temperature, then fallback
//!     if action is report_done: break
//!     execute(action)
//! ```
//!
//! # Key Components
//!
//! - [`AgentLoopConfig`]: Configuration for the loop
//! - [`SessionState`]: History and counters carried between steps
//! - [`PromptContext`]: Everything sent to the model for one step
//! - [`AgentLoopController`]: Main loop orchestrator

pub mod config;
pub mod controller;
pub mod fallback;
pub mod progress;
pub mod prompt;
pub mod summary;
pub mod types;

pub use config::AgentLoopConfig;
pub use controller::{AgentLoopController, AgentLoopResult, AgentLoopStatus};
pub use fallback::{augment_explanation, fallback_action};
pub use progress::{action_diversity, detect_progress, dynamic_temperature, ProgressAssessment};
pub use prompt::{build_prompt, change_prompt, PromptContext, PromptPart, PromptTurn, StepView, TurnRole};
pub use summary::summarize_timeout;
pub use types::{CorrectionApplied, HistoryEntry, SessionState};
