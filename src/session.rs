//! Wiring from configuration to a running action loop.

use std::sync::Arc;

use action_locator::CorrectionModel;
use agent_core::{ActionModel, AgentLoopController, AgentLoopResult, SessionBackend};
use anyhow::{Context, Result};
use perceiver_visual::TextExtractor;
use tracing::info;

use crate::config::ReconConfig;
use crate::llm::GeminiClient;

/// Build a controller around `backend` using the Gemini models from `config`.
pub fn gemini_controller<B>(config: &ReconConfig, backend: Arc<B>) -> Result<AgentLoopController>
where
    B: SessionBackend + 'static,
{
    let client = Arc::new(GeminiClient::new(config.gemini.clone()).context("Failed to create Gemini client")?);
    info!(model = %config.gemini.model, flash_model = %config.gemini.flash_model, "Gemini client ready");
    Ok(controller_with(config, backend, client.clone(), Some(client)))
}

/// Build a controller from explicit model ports.
pub fn controller_with<B>(
    config: &ReconConfig,
    backend: Arc<B>,
    model: Arc<dyn ActionModel>,
    correction: Option<Arc<dyn CorrectionModel>>,
) -> AgentLoopController
where
    B: SessionBackend + 'static,
{
    let extractor = TextExtractor::from_options(config.ocr.clone());
    let controller = AgentLoopController::new(backend, model, extractor, config.agent.clone())
        .with_corrector_config(config.corrector.clone());
    match correction {
        Some(correction) => controller.with_correction_model(correction),
        None => controller,
    }
}

/// Run one objective against `backend` with the Gemini models.
pub async fn run_objective<B>(config: &ReconConfig, backend: Arc<B>, objective: &str) -> Result<AgentLoopResult>
where
    B: SessionBackend + 'static,
{
    let controller = gemini_controller(config, backend)?;
    let result = controller.run(objective).await;
    info!(
        status = ?result.status,
        steps = result.steps_taken,
        elapsed_ms = result.total_time_ms,
        "Objective finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{AgentLoopStatus, MockActionModel, MockSessionBackend};
    use serde_json::json;

    #[tokio::test]
    async fn config_flows_into_controller() {
        let mut config = ReconConfig::default();
        config.agent = agent_core::AgentLoopConfig::minimal().max_steps(4);
        let backend = Arc::new(MockSessionBackend::new(Vec::new()));
        let model = Arc::new(MockActionModel::new().call("done", "report_done", json!({"feedback": "ok"})));

        let controller = controller_with(&config, backend, model, None);
        assert_eq!(controller.config().max_steps, 4);

        // no screenshot is available, so the first step fails
        let result = controller.run("anything").await;
        assert_eq!(result.status, AgentLoopStatus::Failed);
    }

    #[test]
    fn gemini_controller_requires_a_key() {
        let mut config = ReconConfig::default();
        config.gemini.api_key_env = "RECON_TEST_UNSET_SESSION_KEY".to_string();
        let backend = Arc::new(MockSessionBackend::new(Vec::new()));
        assert!(gemini_controller(&config, backend).is_err());
    }
}
