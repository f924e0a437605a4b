use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::ProviderError;
use crate::provider::{ChatSession, ModelClient, ProviderRole, ProviderTurn};

const OPENAI_COMPAT_PATH: &str = "/v1beta/openai";

/// Talks to Gemini through its OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client<OpenAIConfig>,
    model: String,
    system_instruction: String,
}

impl OpenAiCompatClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: &str,
        system_instruction: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let api_base = format!("{}{}", api_base.trim_end_matches('/'), OPENAI_COMPAT_PATH);
        info!("Initializing OpenAI-compatible client with model: {} at {}", model, api_base);
        let config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(api_base);
        // Failures surface on the first attempt; the client retries 429/5xx by default.
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            inner: Arc::new(Inner {
                client: Client::with_config(config).with_backoff(no_retry),
                model,
                system_instruction: system_instruction.into(),
            }),
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn start_session(
        &self,
        history: Vec<ProviderTurn>,
    ) -> Result<Box<dyn ChatSession>, ProviderError> {
        Ok(Box::new(OpenAiCompatSession {
            inner: self.inner.clone(),
            history,
        }))
    }

    fn model(&self) -> &str {
        &self.inner.model
    }
}

pub struct OpenAiCompatSession {
    inner: Arc<Inner>,
    history: Vec<ProviderTurn>,
}

#[async_trait]
impl ChatSession for OpenAiCompatSession {
    async fn send(&mut self, text: &str) -> Result<String, ProviderError> {
        let user_turn = ProviderTurn::new(ProviderRole::User, text);
        let messages = build_messages(&self.inner.system_instruction, &self.history, &user_turn)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.inner.model)
            .messages(messages)
            .build()
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let response = self
            .inner
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| {
                error!("OpenAI-compatible request failed: {:?}", e);
                match e {
                    OpenAIError::ApiError(api_err) => ProviderError::Transport(format!(
                        "API error: {} (code: {:?}, type: {:?})",
                        api_err.message, api_err.code, api_err.r#type
                    )),
                    OpenAIError::JSONDeserialize(err) => ProviderError::Malformed(err.to_string()),
                    other => ProviderError::Transport(other.to_string()),
                }
            })?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ProviderError::EmptyReply)?;

        self.history.push(user_turn);
        self.history
            .push(ProviderTurn::new(ProviderRole::Model, reply.clone()));
        Ok(reply)
    }

    fn history(&self) -> &[ProviderTurn] {
        &self.history
    }
}

fn build_messages(
    system_instruction: &str,
    history: &[ProviderTurn],
    message: &ProviderTurn,
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatCompletionRequestMessage::System(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_instruction.to_string())
            .build()?,
    ));
    for turn in history.iter().chain(std::iter::once(message)) {
        messages.push(convert_to_openai_message(turn)?);
    }
    Ok(messages)
}

fn convert_to_openai_message(
    turn: &ProviderTurn,
) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let message = match turn.role {
        ProviderRole::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(turn.text())
                .build()?,
        ),
        ProviderRole::Model => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text())
                .build()?,
        ),
    };
    Ok(message)
}
