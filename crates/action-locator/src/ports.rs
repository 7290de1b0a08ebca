//! Boundaries towards the session backend and the vision model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CommandError, LocatorError};
use crate::types::CorrectionPrompt;

/// Acknowledgement of an executed command.
///
/// `command` echoes the wire form the endpoint ran, e.g.
/// `[":move-mouse", ":to", 500, 300]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub command: Vec<Value>,
}

impl CommandAck {
    pub fn new(command: Vec<Value>) -> Self {
        Self { command }
    }
}

/// Executes named input actions against the live browser session.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, tool_name: &str, args: &Map<String, Value>) -> Result<CommandAck, CommandError>;
}

/// Vision model consulted as the last correction tier.
#[async_trait]
pub trait CorrectionModel: Send + Sync {
    /// Return the raw text answer; the caller parses the grammar.
    async fn locate_target(&self, prompt: &CorrectionPrompt) -> Result<String, LocatorError>;
}

/// `{"x": x, "y": y}` argument map for `move_mouse`.
pub fn move_args(x: i32, y: i32) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert("x".to_string(), Value::from(x));
    args.insert("y".to_string(), Value::from(y));
    args
}
