//! Wire types for the Gemini `generateContent` endpoint.

use agent_core::{AgentError, FunctionCall, ModelReply, PromptContext, PromptPart, PromptTurn, ToolDeclaration, TurnRole};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<GeminiToolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    pub fn user(parts: Vec<GeminiPart>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    pub fn model(parts: Vec<GeminiPart>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts,
        }
    }

    /// Role-less content, as used for the system instruction.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![GeminiPart::Text(text.into())],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeminiPart {
    #[serde(rename = "text")]
    Text(String),
    InlineData(GeminiBlob),
    FunctionCall(GeminiFunctionCall),
}

impl GeminiPart {
    pub fn jpeg(bytes: &[u8]) -> Self {
        GeminiPart::InlineData(GeminiBlob {
            mime_type: JPEG_MIME.to_string(),
            data: STANDARD.encode(bytes),
        })
    }
}

/// Base64 payload with its MIME type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiBlob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    pub function_declarations: Vec<ToolDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiToolConfig {
    pub function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallingConfig {
    pub mode: String,
}

impl GeminiToolConfig {
    pub fn auto() -> Self {
        Self {
            function_calling_config: FunctionCallingConfig {
                mode: "AUTO".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiResponseContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiResponseContent {
    #[serde(default)]
    pub parts: Vec<GeminiResponsePart>,
}

/// Response parts are read leniently; unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(default)]
    pub thought: bool,
}

impl GeminiRequest {
    /// Translate a loop prompt into a function-calling request.
    pub fn from_prompt(prompt: &PromptContext, tools: Vec<ToolDeclaration>, generation: GeminiGenerationConfig) -> Self {
        let mut contents: Vec<GeminiContent> = prompt.turns.iter().map(content_from_turn).collect();
        contents.push(GeminiContent::user(prompt.current.iter().map(part_from_prompt).collect()));
        Self {
            contents,
            system_instruction: Some(GeminiContent::text(prompt.system_instruction.clone())),
            generation_config: Some(generation),
            tools: Some(vec![GeminiTool {
                function_declarations: tools,
            }]),
            tool_config: Some(GeminiToolConfig::auto()),
        }
    }

    /// Plain request: one user turn, no tools.
    pub fn simple(system: Option<&str>, parts: Vec<GeminiPart>, generation: GeminiGenerationConfig) -> Self {
        Self {
            contents: vec![GeminiContent::user(parts)],
            system_instruction: system.map(GeminiContent::text),
            generation_config: Some(generation),
            tools: None,
            tool_config: None,
        }
    }
}

fn content_from_turn(turn: &PromptTurn) -> GeminiContent {
    let parts = turn.parts.iter().map(part_from_prompt).collect();
    match turn.role {
        TurnRole::User => GeminiContent::user(parts),
        TurnRole::Model => GeminiContent::model(parts),
    }
}

fn part_from_prompt(part: &PromptPart) -> GeminiPart {
    match part {
        PromptPart::Text(text) => GeminiPart::Text(text.clone()),
        PromptPart::Image(bytes) => GeminiPart::jpeg(bytes),
        PromptPart::Call(call) => GeminiPart::FunctionCall(GeminiFunctionCall {
            name: call.name.clone(),
            args: call.args.clone(),
        }),
    }
}

impl GeminiResponse {
    fn first_parts(&self) -> Result<&[GeminiResponsePart], AgentError> {
        let candidate = self.candidates.first().ok_or_else(|| {
            let reason = self
                .prompt_feedback
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no candidates".to_string());
            AgentError::model(format!("gemini returned no candidates: {}", reason))
        })?;
        Ok(candidate
            .content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or_default())
    }

    /// Visible text of the first candidate, joined across parts.
    pub fn text(&self) -> Result<String, AgentError> {
        let text = self
            .first_parts()?
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(AgentError::model("gemini response has no text"));
        }
        Ok(text.trim().to_string())
    }

    /// Explanation text plus the first function call, if any.
    pub fn into_reply(self) -> Result<ModelReply, AgentError> {
        let parts = self.first_parts()?;
        let explanation = parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join(" ");
        let call = parts
            .iter()
            .find_map(|p| p.function_call.as_ref())
            .map(|c| FunctionCall::new(c.name.clone(), c.args.clone()));
        Ok(ModelReply::new(explanation.trim(), call))
    }
}
