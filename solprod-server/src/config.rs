use anyhow::{bail, Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_SERVICE_NAME: &str = "SolProd AI Assistant";
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://solprod.agency",
    "https://solprod-ai.onrender.com",
    "http://localhost:3000",
    "http://localhost:3001",
];
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant for SolProd agency. \
SolProd is a full-cycle team that unites experts in design, development, and production. \
Help users with their questions about services, portfolio, and projects. \
Be professional and friendly.";

const DEFAULT_HOST: [u8; 4] = [0, 0, 0, 0];
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which wire protocol the relay speaks to Gemini.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderApi {
    /// Native `generateContent` endpoint.
    Gemini,
    /// Gemini's OpenAI-compatible chat completions endpoint.
    OpenAi,
}

impl ProviderApi {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderApi::Gemini),
            "openai" => Ok(ProviderApi::OpenAi),
            other => bail!("PROVIDER_API must be 'gemini' or 'openai', got '{}'", other),
        }
    }
}

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub provider_api: ProviderApi,
    pub system_instruction: String,
    pub allowed_origins: Vec<String>,
    pub bind_addr: SocketAddr,
    pub provider_timeout: Duration,
    pub service_name: String,
}

impl RelayConfig {
    /// Build the config from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Missing or blank values fall back
    /// to defaults, except the API key which is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = match get("GEMINI_API_KEY") {
            Some(key) => {
                info!("Gemini API key loaded successfully");
                key.trim().to_string()
            }
            None => {
                error!("GEMINI_API_KEY not found. Please set it in your .env file");
                bail!("GEMINI_API_KEY must be set");
            }
        };

        let provider_api = match get("PROVIDER_API") {
            Some(value) => ProviderApi::parse(&value)?,
            None => ProviderApi::Gemini,
        };

        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        let host: IpAddr = match get("HOST") {
            Some(host) => host
                .trim()
                .parse()
                .with_context(|| format!("HOST is not a valid IP address: {}", host))?,
            None => IpAddr::from(DEFAULT_HOST),
        };
        let port: u16 = match get("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", port))?,
            None => DEFAULT_PORT,
        };

        let timeout_secs: u64 = match get("PROVIDER_TIMEOUT_SECS") {
            Some(secs) => secs
                .trim()
                .parse()
                .with_context(|| format!("PROVIDER_TIMEOUT_SECS is not a number: {}", secs))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            bail!("PROVIDER_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Self {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: get("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            provider_api,
            system_instruction: get("SYSTEM_INSTRUCTION")
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            allowed_origins,
            bind_addr: SocketAddr::new(host, port),
            provider_timeout: Duration::from_secs(timeout_secs),
            service_name: get("SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
        })
    }
}
