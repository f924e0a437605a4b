use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    User,
    Model,
}

/// One history entry in the provider's own format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTurn {
    pub role: ProviderRole,
    pub parts: Vec<String>,
}

impl ProviderTurn {
    pub fn new(role: ProviderRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![text.into()],
        }
    }

    /// All parts joined, as sent to providers that take a single string.
    pub fn text(&self) -> String {
        self.parts.concat()
    }
}

/// Entry point to a hosted model. Each call to `start_session` returns a new,
/// independent session.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn start_session(
        &self,
        history: Vec<ProviderTurn>,
    ) -> Result<Box<dyn ChatSession>, ProviderError>;

    fn model(&self) -> &str;
}

/// A conversation seeded with prior turns.
#[async_trait]
pub trait ChatSession: Send {
    /// Send one user message and wait for the model's reply text.
    async fn send(&mut self, text: &str) -> Result<String, ProviderError>;

    fn history(&self) -> &[ProviderTurn];
}
