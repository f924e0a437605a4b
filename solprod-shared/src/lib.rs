use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use thiserror::Error;

/// One entry of a caller's conversation history.
///
/// Entries are kept as the raw JSON the caller sent, so history echoed back
/// in a response is identical to what came in (including any extra keys).
/// The shape is only checked when the turn is read through
/// [`ChatTurn::parsed_role`] and [`ChatTurn::text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatTurn(Value);

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        let content: String = content.into();
        Self(json!({ "role": role.as_str(), "content": content }))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn role(&self) -> Option<&str> {
        self.0.get("role").and_then(Value::as_str)
    }

    pub fn content(&self) -> Option<&str> {
        self.0.get("content").and_then(Value::as_str)
    }

    pub fn parsed_role(&self) -> Result<TurnRole, TurnError> {
        self.field("role")?.parse()
    }

    pub fn text(&self) -> Result<&str, TurnError> {
        self.field("content")
    }

    fn field(&self, name: &'static str) -> Result<&str, TurnError> {
        let object = self.0.as_object().ok_or(TurnError::NotAnObject)?;
        match object.get(name) {
            None => Err(TurnError::Missing(name)),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(TurnError::NotAString(name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl FromStr for TurnRole {
    type Err = TurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(TurnError::UnknownRole(other.to_string())),
        }
    }
}

/// Why a history entry could not be read as a turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("turn is not a JSON object")]
    NotAnObject,
    #[error("turn has no '{0}' field")]
    Missing(&'static str),
    #[error("turn field '{0}' is not a string")]
    NotAString(&'static str),
    #[error("unrecognized conversation role '{0}'")]
    UnknownRole(String),
}

/// Request from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub conversation_history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub status: String,
    pub message: String,
}

/// Body returned with every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
