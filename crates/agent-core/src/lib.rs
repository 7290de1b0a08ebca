//! Agent Core - the screenshot-driven action loop.
//!
//! Provides the session model, prompt assembly, progress tracking and the
//! loop controller that drives a browser session through a vision model.

pub mod action;
pub mod agent_loop;
pub mod errors;
pub mod llm_provider;

pub use action::{tool_declarations, Action, ToolDeclaration};
pub use agent_loop::{
    AgentLoopConfig, AgentLoopController, AgentLoopResult, AgentLoopStatus, CorrectionApplied, HistoryEntry,
    PromptContext, PromptPart, PromptTurn, SessionState, TurnRole,
};
pub use errors::AgentError;
pub use llm_provider::{
    ActionModel, ChangeRequest, FunctionCall, MockActionModel, MockSessionBackend, ModelReply, SessionBackend,
};
