//! Configuration for the response pipeline, read from environment
//! variables (§6). Every field has the documented default so a bare
//! `sentinel start` with no environment runs memory-only, template
//! explanations, and a simulated orchestrator.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// `DATABASE_URL`: durable backing connection string. Absent means
    /// memory-only.
    pub database_url: Option<String>,

    /// `LLM_PROVIDER`: `openai` | `anthropic` | `ollama`.
    pub llm_provider: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub ollama_url: String,

    /// `USE_RL_AGENT` / `RL_MODEL_PATH`: read and logged, no bundled
    /// learned policy selects anything but the table policy today.
    pub use_rl_agent: bool,
    pub rl_model_path: String,

    /// `ORCHESTRATOR_URL`: base URL of the container-orchestration API.
    /// Absent means the actuator runs in simulated mode.
    pub orchestrator_url: Option<String>,

    pub log_level: String,
    pub json_logs: bool,

    pub bind_addr: SocketAddr,
    pub shutdown_grace_secs: u64,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        SentinelConfig {
            database_url: None,
            llm_provider: "openai".to_string(),
            openai_api_key: None,
            anthropic_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            use_rl_agent: false,
            rl_model_path: "models/rl_agent.zip".to_string(),
            orchestrator_url: None,
            log_level: "info".to_string(),
            json_logs: false,
            bind_addr: "0.0.0.0:8000".parse().expect("valid default bind address"),
            shutdown_grace_secs: 30,
        }
    }
}

impl SentinelConfig {
    /// Reads configuration from environment, falling back to the
    /// documented default for anything unset. A malformed
    /// `SENTINEL_BIND_ADDR` is the one genuinely fatal start-up error
    /// the pipeline can raise (§7: "the only fatal errors are
    /// Supervisor-level failures during start-up configuration
    /// parsing").
    pub fn from_env() -> Result<Self, crate::SentinelError> {
        let defaults = SentinelConfig::default();

        let bind_addr = match std::env::var("SENTINEL_BIND_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| crate::SentinelError::Config(format!("invalid SENTINEL_BIND_ADDR {raw:?}: {e}")))?,
            Err(_) => defaults.bind_addr,
        };

        let shutdown_grace_secs = match std::env::var("SENTINEL_SHUTDOWN_GRACE_SECS") {
            Ok(raw) => raw.parse().map_err(|e| {
                crate::SentinelError::Config(format!("invalid SENTINEL_SHUTDOWN_GRACE_SECS {raw:?}: {e}"))
            })?,
            Err(_) => defaults.shutdown_grace_secs,
        };

        Ok(SentinelConfig {
            database_url: non_empty_env("DATABASE_URL"),
            llm_provider: std::env::var("LLM_PROVIDER").unwrap_or(defaults.llm_provider),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
            ollama_url: std::env::var("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            use_rl_agent: bool_env("USE_RL_AGENT"),
            rl_model_path: std::env::var("RL_MODEL_PATH").unwrap_or(defaults.rl_model_path),
            orchestrator_url: non_empty_env("ORCHESTRATOR_URL"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: bool_env("JSON_LOGS"),
            bind_addr,
            shutdown_grace_secs,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn bool_env(key: &str) -> bool {
    std::env::var(key).map(|v| v.eq_ignore_ascii_case("true") || v == "1").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_memory_only_and_template_explained() {
        let config = SentinelConfig::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.llm_provider, "openai");
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8000");
        assert_eq!(config.shutdown_grace_secs, 30);
    }

    #[test]
    fn config_serializes_round_trip() {
        let config = SentinelConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SentinelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bind_addr, config.bind_addr);
    }
}
