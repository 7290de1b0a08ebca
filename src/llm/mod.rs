//! Gemini-backed model ports for the action loop and the corrector.

mod gemini;
mod schema;

pub use gemini::GeminiClient;
pub use schema::{
    GeminiBlob, GeminiCandidate, GeminiContent, GeminiFunctionCall, GeminiGenerationConfig, GeminiPart,
    GeminiRequest, GeminiResponse, GeminiResponsePart, GeminiTool, GeminiToolConfig,
};
