//! Screenshot-driven browser reconnaissance.
//!
//! Ties the action loop in `agent-core` to layered configuration, tracing
//! and a Gemini model client.

pub mod config;
pub mod llm;
pub mod session;
pub mod telemetry;

pub use agent_core::{AgentLoopController, AgentLoopResult, AgentLoopStatus, SessionBackend};
pub use config::{GeminiSettings, LoggingSettings, ReconConfig};
pub use llm::GeminiClient;
pub use session::{controller_with, gemini_controller, run_objective};
pub use telemetry::init_tracing;
