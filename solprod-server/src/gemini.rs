use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::provider::{ChatSession, ModelClient, ProviderRole, ProviderTurn};

const GENERATE_PATH: &str = "/v1beta/models";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<ProviderRole>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Client for Gemini's native `generateContent` API.
pub struct GeminiClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    system_instruction: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: &str,
        system_instruction: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let model = model.into();
        let url = format!(
            "{}{}/{}:generateContent",
            api_base.trim_end_matches('/'),
            GENERATE_PATH,
            model
        );
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                api_key: api_key.into(),
                model,
                url,
                system_instruction: system_instruction.into(),
            }),
        })
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn start_session(
        &self,
        history: Vec<ProviderTurn>,
    ) -> Result<Box<dyn ChatSession>, ProviderError> {
        Ok(Box::new(GeminiSession {
            inner: self.inner.clone(),
            history,
        }))
    }

    fn model(&self) -> &str {
        &self.inner.model
    }
}

pub struct GeminiSession {
    inner: Arc<Inner>,
    history: Vec<ProviderTurn>,
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send(&mut self, text: &str) -> Result<String, ProviderError> {
        let user_turn = ProviderTurn::new(ProviderRole::User, text);
        let body = build_request(&self.inner.system_instruction, &self.history, &user_turn);
        debug!(
            "Sending {} history turns to {}",
            self.history.len(),
            self.inner.model
        );

        let response = self
            .inner
            .client
            .post(&self.inner.url)
            .header("x-goog-api-key", &self.inner.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        if !status.is_success() {
            warn!("Gemini API returned {}: {}", status, raw);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: raw,
            });
        }

        let reply = parse_reply(&raw)?;
        self.history.push(user_turn);
        self.history
            .push(ProviderTurn::new(ProviderRole::Model, reply.clone()));
        Ok(reply)
    }

    fn history(&self) -> &[ProviderTurn] {
        &self.history
    }
}

fn build_request<'a>(
    system_instruction: &'a str,
    history: &'a [ProviderTurn],
    message: &'a ProviderTurn,
) -> GenerateRequest<'a> {
    let contents = history
        .iter()
        .chain(std::iter::once(message))
        .map(|turn| Content {
            role: Some(turn.role),
            parts: turn.parts.iter().map(|p| Part { text: p }).collect(),
        })
        .collect();

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: system_instruction,
            }],
        },
        contents,
    }
}

fn parse_reply(raw: &str) -> Result<String, ProviderError> {
    let response: GenerateResponse =
        serde_json::from_str(raw).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => ProviderError::Blocked(reason),
            None => ProviderError::EmptyReply,
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::EmptyReply);
    }
    Ok(text)
}
