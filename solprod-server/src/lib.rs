pub mod config;
pub mod error;
pub mod gemini;
pub mod openai_compat;
pub mod provider;
pub mod relay;
pub mod routes;

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use config::{ProviderApi, RelayConfig};
use gemini::GeminiClient;
use openai_compat::OpenAiCompatClient;
use provider::ModelClient;

/// Construct the model client selected by `config.provider_api`.
pub fn model_client(config: &RelayConfig) -> anyhow::Result<Arc<dyn ModelClient>> {
    let client: Arc<dyn ModelClient> = match config.provider_api {
        ProviderApi::Gemini => {
            let client = GeminiClient::new(
                config.api_key.clone(),
                config.model.clone(),
                &config.api_base,
                config.system_instruction.clone(),
                config.provider_timeout,
            )
            .context("failed to build Gemini HTTP client")?;
            info!("Gemini endpoint: {}", client.url());
            Arc::new(client)
        }
        ProviderApi::OpenAi => Arc::new(OpenAiCompatClient::new(
            config.api_key.clone(),
            config.model.clone(),
            &config.api_base,
            config.system_instruction.clone(),
        )),
    };
    Ok(client)
}
