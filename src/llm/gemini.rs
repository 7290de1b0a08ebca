use std::time::Duration;

use action_locator::{CorrectionModel, CorrectionPrompt, LocatorError};
use agent_core::agent_loop::change_prompt;
use agent_core::{tool_declarations, ActionModel, AgentError, ChangeRequest, ModelReply, PromptContext};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::schema::{GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse};
use crate::config::GeminiSettings;

/// Vision model backed by the Gemini REST API.
pub struct GeminiClient {
    client: Client,
    settings: GeminiSettings,
    api_keys: Vec<String>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("settings", &self.settings)
            .field("keys", &self.api_keys.len())
            .finish()
    }
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, AgentError> {
        let api_keys = settings.resolve_api_keys();
        if api_keys.is_empty() {
            return Err(AgentError::invalid_request(format!(
                "missing Gemini API key: set gemini.api_keys or {}",
                settings.api_key_env
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|err| AgentError::invalid_request(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            settings,
            api_keys,
        })
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            model
        )
    }

    pub fn generation(&self, temperature: f64) -> GeminiGenerationConfig {
        GeminiGenerationConfig {
            temperature,
            top_p: self.settings.top_p,
            top_k: self.settings.top_k,
            max_output_tokens: self.settings.max_output_tokens,
        }
    }

    /// POST a request, rotating to the next key when one is rate limited.
    async fn generate(&self, model: &str, body: &GeminiRequest) -> Result<GeminiResponse, AgentError> {
        let url = self.url(model);
        let mut last_error: Option<AgentError> = None;

        for (index, key) in self.api_keys.iter().enumerate() {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) if err.is_timeout() => {
                    return Err(AgentError::timeout(format!("gemini request timed out: {err}")));
                }
                Err(err) => {
                    last_error = Some(AgentError::model(format!("gemini request failed: {err}")));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                if status.as_u16() == 429 && index + 1 < self.api_keys.len() {
                    warn!(
                        target: "gemini",
                        attempt = index + 1,
                        remaining = self.api_keys.len() - index - 1,
                        "Gemini rate limited request; switching API key"
                    );
                    last_error = Some(AgentError::model(format!("gemini rate limited: {text}")));
                    continue;
                }
                return Err(AgentError::model(format!("gemini returned {}: {}", status, text)));
            }

            debug!(target: "gemini", model, "generateContent succeeded");
            return response
                .json::<GeminiResponse>()
                .await
                .map_err(|err| AgentError::model(format!("gemini response invalid: {err}")));
        }

        Err(last_error.unwrap_or_else(|| AgentError::model("Gemini request exhausted all API keys")))
    }
}

#[async_trait]
impl ActionModel for GeminiClient {
    async fn next_action(&self, prompt: &PromptContext, temperature: f64) -> Result<ModelReply, AgentError> {
        let body = GeminiRequest::from_prompt(prompt, tool_declarations(), self.generation(temperature));
        self.generate(&self.settings.model, &body).await?.into_reply()
    }

    async fn describe_changes(&self, request: &ChangeRequest) -> Result<String, AgentError> {
        let (system, user) = change_prompt(request);
        let body = GeminiRequest::simple(
            Some(&system),
            vec![
                GeminiPart::Text(user),
                GeminiPart::jpeg(&request.before),
                GeminiPart::jpeg(&request.after),
            ],
            self.generation(self.settings.analysis_temperature),
        );
        self.generate(&self.settings.flash_model, &body).await?.text()
    }

    async fn summarize(&self, prompt: &str) -> Result<String, AgentError> {
        let body = GeminiRequest::simple(
            None,
            vec![GeminiPart::Text(prompt.to_string())],
            self.generation(self.settings.analysis_temperature),
        );
        self.generate(&self.settings.flash_model, &body).await?.text()
    }
}

#[async_trait]
impl CorrectionModel for GeminiClient {
    async fn locate_target(&self, prompt: &CorrectionPrompt) -> Result<String, LocatorError> {
        let body = GeminiRequest::simple(
            Some(&prompt.system_instruction),
            vec![GeminiPart::Text(prompt.user_prompt.clone()), GeminiPart::jpeg(&prompt.screenshot)],
            self.generation(self.settings.analysis_temperature),
        );
        let response = self
            .generate(&self.settings.flash_model, &body)
            .await
            .map_err(|err| match err {
                AgentError::Timeout(reason) => LocatorError::Timeout(reason),
                other => LocatorError::Model(other.to_string()),
            })?;
        response.text().map_err(|err| LocatorError::MalformedResponse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_rejected() {
        let settings = GeminiSettings {
            api_key_env: "RECON_TEST_UNSET_GEMINI_KEY".to_string(),
            ..Default::default()
        };
        let err = GeminiClient::new(settings).unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(ref m) if m.contains("RECON_TEST_UNSET_GEMINI_KEY")));
    }

    #[test]
    fn url_and_generation_follow_settings() {
        let settings = GeminiSettings {
            api_keys: vec!["k".to_string()],
            endpoint: "https://example.test/v1beta/".to_string(),
            model: "gemini-x".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::new(settings).unwrap();
        assert_eq!(
            client.url("gemini-x"),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
        let generation = client.generation(0.4);
        assert_eq!(generation.temperature, 0.4);
        assert_eq!(generation.max_output_tokens, 10_150);
    }
}
