//! Input actions the model may choose, and their wire forms.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::AgentError;

/// One low-level input action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Action {
    Click,
    RightClick,
    MiddleClick,
    MoveMouse { x: i32, y: i32 },
    ClickHold,
    ClickRelease,
    #[serde(rename = "scroll_wheel_up")]
    ScrollUp { ticks: u32 },
    #[serde(rename = "scroll_wheel_down")]
    ScrollDown { ticks: u32 },
    Keypress { key: String },
    ReportDone { feedback: String },
}

/// Function schema entry offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDeclaration {
    fn bare(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: None,
        }
    }

    fn with_params(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Some(parameters),
        }
    }
}

/// Every tool the model may call, in the order they are offered.
pub fn tool_declarations() -> Vec<ToolDeclaration> {
    let scroll_params = json!({
        "type": "object",
        "properties": {"x": {"type": "integer", "description": "Number of wheel ticks"}},
        "required": ["x"]
    });
    vec![
        ToolDeclaration::bare("click", "Left click at the current mouse position"),
        ToolDeclaration::bare("right_click", "Right click at the current mouse position"),
        ToolDeclaration::bare("middle_click", "Middle click at the current mouse position"),
        ToolDeclaration::with_params(
            "move_mouse",
            "Move the mouse to absolute pixel coordinates",
            json!({
                "type": "object",
                "properties": {
                    "x": {"type": "integer", "description": "X coordinate"},
                    "y": {"type": "integer", "description": "Y coordinate"}
                },
                "required": ["x", "y"]
            }),
        ),
        ToolDeclaration::bare("click_hold", "Press and hold the left button at the current position"),
        ToolDeclaration::bare("click_release", "Release the held mouse button at the current position"),
        ToolDeclaration::with_params("scroll_wheel_up", "Scroll the page up", scroll_params.clone()),
        ToolDeclaration::with_params(
            "keypress",
            "Type into the focused element, ideally one key at a time",
            json!({
                "type": "object",
                "properties": {"x": {"type": "string", "description": "Character(s) to type"}},
                "required": ["x"]
            }),
        ),
        ToolDeclaration::with_params("scroll_wheel_down", "Scroll the page down", scroll_params),
        ToolDeclaration::with_params(
            "report_done",
            "Declare the objective complete, with feedback",
            json!({
                "type": "object",
                "properties": {"feedback": {"type": "string", "description": "What was achieved"}},
                "required": ["feedback"]
            }),
        ),
    ]
}

impl Action {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::RightClick => "right_click",
            Action::MiddleClick => "middle_click",
            Action::MoveMouse { .. } => "move_mouse",
            Action::ClickHold => "click_hold",
            Action::ClickRelease => "click_release",
            Action::ScrollUp { .. } => "scroll_wheel_up",
            Action::ScrollDown { .. } => "scroll_wheel_down",
            Action::Keypress { .. } => "keypress",
            Action::ReportDone { .. } => "report_done",
        }
    }

    /// Arguments in the shape the model and the backend use.
    pub fn args(&self) -> Map<String, Value> {
        let mut args = Map::new();
        match self {
            Action::MoveMouse { x, y } => {
                args.insert("x".into(), Value::from(*x));
                args.insert("y".into(), Value::from(*y));
            }
            Action::ScrollUp { ticks } | Action::ScrollDown { ticks } => {
                args.insert("x".into(), Value::from(*ticks));
            }
            Action::Keypress { key } => {
                args.insert("x".into(), Value::from(key.clone()));
            }
            Action::ReportDone { feedback } => {
                args.insert("feedback".into(), Value::from(feedback.clone()));
            }
            _ => {}
        }
        args
    }

    /// Validate a model function call.
    pub fn from_call(name: &str, args: &Value) -> Result<Self, AgentError> {
        let action = match name {
            "click" => Action::Click,
            "right_click" => Action::RightClick,
            "middle_click" => Action::MiddleClick,
            "click_hold" => Action::ClickHold,
            "click_release" => Action::ClickRelease,
            "move_mouse" => {
                let x = coordinate(name, args, "x")?;
                let y = coordinate(name, args, "y")?;
                Action::MoveMouse { x, y }
            }
            "scroll_wheel_up" => Action::ScrollUp {
                ticks: ticks(name, args)?,
            },
            "scroll_wheel_down" => Action::ScrollDown {
                ticks: ticks(name, args)?,
            },
            "keypress" => {
                let key = args
                    .get("x")
                    .and_then(Value::as_str)
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| AgentError::invalid_tool_call("keypress needs a non-empty string 'x'"))?;
                Action::Keypress { key: key.to_string() }
            }
            "report_done" => Action::ReportDone {
                feedback: args
                    .get("feedback")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            other => return Err(AgentError::invalid_tool_call(format!("unknown tool '{}'", other))),
        };
        Ok(action)
    }

    /// Command vector understood by the session's execute endpoint.
    pub fn command_vector(&self) -> Vec<Value> {
        match self {
            Action::Click => vec![json!(":click")],
            Action::RightClick => vec![json!(":right-click")],
            Action::MiddleClick => vec![json!(":middle-click")],
            Action::MoveMouse { x, y } => vec![json!(":move-mouse"), json!(":to"), json!(x), json!(y)],
            Action::ClickHold => vec![json!(":click-hold")],
            Action::ClickRelease => vec![json!(":click-release")],
            Action::ScrollUp { ticks } => vec![json!(":scroll-wheel-up"), json!(ticks)],
            Action::ScrollDown { ticks } => vec![json!(":scroll-wheel-down"), json!(ticks)],
            Action::Keypress { key } => vec![json!(":keypress"), json!(key)],
            Action::ReportDone { .. } => vec![json!("report_done")],
        }
    }

    /// `name(k=v, ...)` rendering used in prompts and history text.
    pub fn call_text(&self) -> String {
        let args: Vec<String> = self
            .args()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}({})", self.tool_name(), args.join(", "))
    }

    /// Explanation used when the model called a tool without saying why.
    pub fn default_explanation(&self) -> String {
        match self {
            Action::MoveMouse { x, y } => format!(
                "I need to interact with an element. Moving to coordinates ({}, {}).",
                x, y
            ),
            Action::Click => "I see a clickable element at the cursor position and will click it.".to_string(),
            Action::ScrollUp { .. } => "Scrolling up to see more content.".to_string(),
            Action::ScrollDown { .. } => "Scrolling down to see more content.".to_string(),
            Action::ReportDone { .. } => "I've completed the objective.".to_string(),
            other => format!("Using {} to interact with the page.", other.tool_name()),
        }
    }

    pub fn target(&self) -> Option<(i32, i32)> {
        match self {
            Action::MoveMouse { x, y } => Some((*x, *y)),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Action::ReportDone { .. })
    }
}

fn number(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

// Integer arguments frequently arrive as JSON floats.
fn coordinate(tool: &str, args: &Value, key: &str) -> Result<i32, AgentError> {
    let value = number(args, key)
        .ok_or_else(|| AgentError::invalid_tool_call(format!("{} needs numeric '{}'", tool, key)))?;
    if !value.is_finite() || value < 0.0 || value > f64::from(i32::MAX) {
        return Err(AgentError::invalid_tool_call(format!(
            "{} '{}' out of range: {}",
            tool, key, value
        )));
    }
    Ok(value.round() as i32)
}

fn ticks(tool: &str, args: &Value) -> Result<u32, AgentError> {
    let value = number(args, "x")
        .ok_or_else(|| AgentError::invalid_tool_call(format!("{} needs numeric 'x'", tool)))?;
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(AgentError::invalid_tool_call(format!("{} 'x' out of range: {}", tool, value)));
    }
    Ok(value.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_call_accepts_float_coordinates() {
        let action = Action::from_call("move_mouse", &json!({"x": 500.0, "y": 299.6})).unwrap();
        assert_eq!(action, Action::MoveMouse { x: 500, y: 300 });
        assert_eq!(
            action.command_vector(),
            vec![json!(":move-mouse"), json!(":to"), json!(500), json!(300)]
        );
    }

    #[test]
    fn test_from_call_rejects_bad_calls() {
        assert!(Action::from_call("move_mouse", &json!({"x": 10})).is_err());
        assert!(Action::from_call("move_mouse", &json!({"x": "a", "y": 1})).is_err());
        assert!(Action::from_call("keypress", &json!({})).is_err());
        assert!(matches!(
            Action::from_call("navigate", &json!({})),
            Err(AgentError::InvalidToolCall(_))
        ));
    }

    #[test]
    fn test_every_declared_tool_parses() {
        let sample = json!({"x": 2, "y": 3, "feedback": "done"});
        for decl in tool_declarations() {
            let args = if decl.name == "keypress" { json!({"x": "a"}) } else { sample.clone() };
            let action = Action::from_call(&decl.name, &args).unwrap();
            assert_eq!(action.tool_name(), decl.name);
        }
        assert_eq!(tool_declarations().len(), 10);
    }

    #[test]
    fn test_command_vectors() {
        assert_eq!(Action::Click.command_vector(), vec![json!(":click")]);
        assert_eq!(
            Action::ScrollDown { ticks: 100 }.command_vector(),
            vec![json!(":scroll-wheel-down"), json!(100)]
        );
        assert_eq!(
            Action::Keypress { key: "Enter".into() }.command_vector(),
            vec![json!(":keypress"), json!("Enter")]
        );
        assert_eq!(
            Action::ReportDone { feedback: "ok".into() }.command_vector(),
            vec![json!("report_done")]
        );
    }

    #[test]
    fn test_call_text_and_defaults() {
        let action = Action::MoveMouse { x: 10, y: 20 };
        assert_eq!(action.call_text(), "move_mouse(x=10, y=20)");
        assert_eq!(
            action.default_explanation(),
            "I need to interact with an element. Moving to coordinates (10, 20)."
        );
        assert_eq!(Action::Click.call_text(), "click()");
        assert_eq!(
            Action::Keypress { key: "a".into() }.call_text(),
            "keypress(x=\"a\")"
        );
    }
}
