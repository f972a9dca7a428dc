//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::notify::SmtpConfig;

/// OAuth client credentials for the tool gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// JSON-RPC endpoint.
    pub url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
}

/// Process-wide engine configuration. Built once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    /// Directory holding `<role>.txt` prompt overrides.
    pub prompts_dir: PathBuf,
    pub port: u16,
    /// Per sub-agent call.
    pub agent_timeout: Duration,
    /// Per tool-gateway call.
    pub tool_timeout: Duration,
    /// Whole-run bound, if any.
    pub run_deadline: Option<Duration>,
    /// Outbound email; `None` disables sending.
    pub smtp: Option<SmtpConfig>,
}

impl EngineConfig {
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-20250514";
    pub const DEFAULT_PORT: u16 = 8088;

    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let gateway = GatewayConfig {
            url: require("GATEWAY_URL")?,
            client_id: require("CLIENT_ID")?,
            client_secret: SecretString::from(require("CLIENT_SECRET")?),
            token_url: require("TOKEN_URL")?,
        };

        let backend = get("SUPERAGENT_LLM_BACKEND")
            .map(|raw| raw.parse::<LlmBackend>())
            .transpose()?
            .unwrap_or(LlmBackend::Anthropic);
        let llm = LlmConfig {
            backend,
            api_key: SecretString::from(require(backend.api_key_var())?),
            model: get("SUPERAGENT_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587)?,
                username: get("SMTP_USERNAME").unwrap_or_default(),
                password: SecretString::from(get("SMTP_PASSWORD").unwrap_or_default()),
            }),
            None => None,
        };

        Ok(Self {
            gateway,
            llm,
            prompts_dir: get("SUPERAGENT_PROMPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./prompts")),
            port: parse_or("SUPERAGENT_PORT", get("SUPERAGENT_PORT"), Self::DEFAULT_PORT)?,
            agent_timeout: Duration::from_secs(parse_or(
                "SUPERAGENT_AGENT_TIMEOUT_SECS",
                get("SUPERAGENT_AGENT_TIMEOUT_SECS"),
                60,
            )?),
            tool_timeout: Duration::from_secs(parse_or(
                "SUPERAGENT_TOOL_TIMEOUT_SECS",
                get("SUPERAGENT_TOOL_TIMEOUT_SECS"),
                30,
            )?),
            run_deadline: get("SUPERAGENT_RUN_DEADLINE_SECS")
                .map(|raw| parse_value("SUPERAGENT_RUN_DEADLINE_SECS", &raw))
                .transpose()?
                .map(Duration::from_secs),
            smtp,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        })
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}
