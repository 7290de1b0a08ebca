use std::collections::VecDeque;
use std::sync::Mutex;

use action_locator::{CommandAck, CommandError, CommandExecutor, DomSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent_loop::prompt::PromptContext;
use crate::errors::AgentError;

/// Function call emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// One model turn: free text plus at most one tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub call: Option<FunctionCall>,
}

impl ModelReply {
    pub fn new(explanation: impl Into<String>, call: Option<FunctionCall>) -> Self {
        Self {
            explanation: explanation.into(),
            call,
        }
    }
}

/// Input for describing what changed between two screenshots.
#[derive(Debug, Clone)]
pub struct ChangeRequest {
    pub before: Vec<u8>,
    pub after: Vec<u8>,
    /// `name(args)` of the command executed between the two captures
    pub last_command: String,
    /// What the agent said that command was meant to do
    pub intent: String,
}

/// Vision model consulted by the action loop.
#[async_trait]
pub trait ActionModel: Send + Sync {
    /// Choose the next action for the assembled prompt.
    async fn next_action(&self, prompt: &PromptContext, temperature: f64) -> Result<ModelReply, AgentError>;

    /// Describe visual changes, answering `OBSERVED: ... INTENT ALIGNMENT: ...`.
    async fn describe_changes(&self, request: &ChangeRequest) -> Result<String, AgentError> {
        let _ = request;
        Err(AgentError::invalid_request(
            "This model does not support screenshot comparison",
        ))
    }

    /// Free-text completion used for the timeout narrative.
    async fn summarize(&self, prompt: &str) -> Result<String, AgentError> {
        let _ = prompt;
        Err(AgentError::invalid_request("This model does not support summaries"))
    }
}

/// Live browser session as seen by the loop.
#[async_trait]
pub trait SessionBackend: CommandExecutor {
    /// Encoded JPEG for the given step; empty bytes mean "not ready".
    async fn fetch_screenshot(&self, step: u32) -> Result<Vec<u8>, AgentError>;

    async fn fetch_dom_elements(&self, step: u32) -> Result<Option<DomSnapshot>, AgentError>;

    /// Markdown rendering of the page text.
    async fn fetch_dom_text(&self, step: u32) -> Result<Option<String>, AgentError>;
}

/// Deterministic model used for tests and offline development.
///
/// Replies are served in order; once the script runs out every call
/// answers `report_done`.
#[derive(Debug, Default)]
pub struct MockActionModel {
    replies: Mutex<VecDeque<Result<ModelReply, AgentError>>>,
    changes: Mutex<VecDeque<String>>,
    temperatures: Mutex<Vec<f64>>,
    prompts: Mutex<Vec<PromptContext>>,
}

impl MockActionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: queue a reply.
    pub fn reply(self, reply: ModelReply) -> Self {
        self.push(Ok(reply));
        self
    }

    /// Builder: queue a tool call with an explanation.
    pub fn call(self, explanation: &str, name: &str, args: Value) -> Self {
        self.reply(ModelReply::new(explanation, Some(FunctionCall::new(name, args))))
    }

    /// Builder: queue a failure.
    pub fn error(self, error: AgentError) -> Self {
        self.push(Err(error));
        self
    }

    /// Builder: queue a change description.
    pub fn change(self, description: &str) -> Self {
        if let Ok(mut changes) = self.changes.lock() {
            changes.push_back(description.to_string());
        }
        self
    }

    /// Builder: repeat the same call `times` times.
    pub fn repeat_call(mut self, times: usize, explanation: &str, name: &str, args: Value) -> Self {
        for _ in 0..times {
            self = self.call(explanation, name, args.clone());
        }
        self
    }

    /// Temperatures seen by `next_action`, in call order.
    pub fn temperatures(&self) -> Vec<f64> {
        self.temperatures.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Prompts seen by `next_action`, in call order.
    pub fn prompts(&self) -> Vec<PromptContext> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn push(&self, reply: Result<ModelReply, AgentError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl ActionModel for MockActionModel {
    async fn next_action(&self, prompt: &PromptContext, temperature: f64) -> Result<ModelReply, AgentError> {
        if let Ok(mut seen) = self.temperatures.lock() {
            seen.push(temperature);
        }
        if let Ok(mut seen) = self.prompts.lock() {
            seen.push(prompt.clone());
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        next.unwrap_or_else(|| {
            Ok(ModelReply::new(
                "Mock script exhausted, reporting completion.",
                Some(FunctionCall::new(
                    "report_done",
                    serde_json::json!({"feedback": "mock finished"}),
                )),
            ))
        })
    }

    async fn describe_changes(&self, _request: &ChangeRequest) -> Result<String, AgentError> {
        let next = self.changes.lock().ok().and_then(|mut c| c.pop_front());
        Ok(next.unwrap_or_else(|| {
            "OBSERVED: Nothing changed. INTENT ALIGNMENT: No change, not aligned.".to_string()
        }))
    }

    async fn summarize(&self, prompt: &str) -> Result<String, AgentError> {
        Ok(format!("Mock summary of {} lines.", prompt.lines().count()))
    }
}

/// Backend that serves fixed screenshots and records commands.
#[derive(Debug, Default)]
pub struct MockSessionBackend {
    screenshots: Mutex<VecDeque<Vec<u8>>>,
    fallback_screenshot: Vec<u8>,
    dom: Option<DomSnapshot>,
    commands: Mutex<Vec<(String, Map<String, Value>)>>,
    fail_commands: bool,
}

impl MockSessionBackend {
    /// Serve `screenshot` for every step.
    pub fn new(screenshot: Vec<u8>) -> Self {
        Self {
            fallback_screenshot: screenshot,
            ..Default::default()
        }
    }

    /// Builder: serve these screenshots first, in order.
    pub fn screenshots(self, shots: Vec<Vec<u8>>) -> Self {
        if let Ok(mut queue) = self.screenshots.lock() {
            queue.extend(shots);
        }
        self
    }

    pub fn with_dom(mut self, dom: DomSnapshot) -> Self {
        self.dom = Some(dom);
        self
    }

    /// Builder: reject every command.
    pub fn failing_commands(mut self) -> Self {
        self.fail_commands = true;
        self
    }

    /// Commands executed so far.
    pub fn commands(&self) -> Vec<(String, Map<String, Value>)> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandExecutor for MockSessionBackend {
    async fn execute(&self, tool_name: &str, args: &Map<String, Value>) -> Result<CommandAck, CommandError> {
        if self.fail_commands {
            return Err(CommandError::rejected(tool_name, "mock backend rejects commands"));
        }
        if let Ok(mut seen) = self.commands.lock() {
            seen.push((tool_name.to_string(), args.clone()));
        }
        let action = crate::action::Action::from_call(tool_name, &Value::Object(args.clone()))
            .map_err(|e| CommandError::invalid(tool_name, e.to_string()))?;
        Ok(CommandAck::new(action.command_vector()))
    }
}

#[async_trait]
impl SessionBackend for MockSessionBackend {
    async fn fetch_screenshot(&self, _step: u32) -> Result<Vec<u8>, AgentError> {
        let queued = self.screenshots.lock().ok().and_then(|mut q| q.pop_front());
        Ok(queued.unwrap_or_else(|| self.fallback_screenshot.clone()))
    }

    async fn fetch_dom_elements(&self, _step: u32) -> Result<Option<DomSnapshot>, AgentError> {
        Ok(self.dom.clone())
    }

    async fn fetch_dom_text(&self, _step: u32) -> Result<Option<String>, AgentError> {
        Ok(None)
    }
}
