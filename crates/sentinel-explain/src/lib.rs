//! Turns a [`Threat`] into a human-readable explanation.
//!
//! The template path is a pure function and always available. An
//! optional LLM backend (`openai`, `anthropic`, `ollama`, selected by
//! `LLM_PROVIDER`) replaces it when configured and reachable; any
//! error, non-200, or timeout falls back to the template.

mod template;

pub use template::template_explanation;

use async_trait::async_trait;
use sentinel_model::Threat;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Seam for an external text generator. Each implementation sends the
/// same fixed prompt shape; the trait itself carries no fallback
/// logic, that lives in [`Explainer::explain`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, String>;
}

fn prompt_for(threat: &Threat) -> String {
    format!(
        "You are a security assistant. Explain this security threat in a concise, \
         technical summary.\n\nThreat Type: {}\nSeverity: {}\nPod: {}\nDescription: {}\n\n\
         Respond with a single short paragraph.",
        threat.threat_type,
        threat.severity,
        threat.source.pod.as_deref().unwrap_or("unknown pod"),
        &threat.description.chars().take(200).collect::<String>(),
    )
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiClient {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, String> {
        let body = serde_json::json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 150,
        });
        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("openai status {}", resp.status()));
        }
        let value: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .map(str::to_string)
            .ok_or_else(|| "openai: missing choices[0].message.content".to_string())
    }
}

pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        AnthropicClient {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, String> {
        let body = serde_json::json!({
            "model": "claude-3-haiku-20240307",
            "max_tokens": 150,
            "messages": [{"role": "user", "content": prompt}],
        });
        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("anthropic status {}", resp.status()));
        }
        let value: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        value["content"][0]["text"]
            .as_str()
            .map(str::trim)
            .map(str::to_string)
            .ok_or_else(|| "anthropic: missing content[0].text".to_string())
    }
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        OllamaClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, String> {
        let body = serde_json::json!({
            "model": "llama2",
            "prompt": prompt,
            "stream": false,
        });
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("ollama status {}", resp.status()));
        }
        let value: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        value["response"]
            .as_str()
            .map(str::trim)
            .map(str::to_string)
            .ok_or_else(|| "ollama: missing response field".to_string())
    }
}

/// Template-first explainer with an optional LLM backend.
pub struct Explainer {
    llm: Option<Box<dyn LlmClient>>,
}

impl Explainer {
    pub fn template_only() -> Self {
        Explainer { llm: None }
    }

    pub fn with_llm(llm: Box<dyn LlmClient>) -> Self {
        Explainer { llm: Some(llm) }
    }

    /// Builds an explainer from `LLM_PROVIDER` / `OPENAI_API_KEY` /
    /// `ANTHROPIC_API_KEY` / `OLLAMA_URL`. Missing credentials for the
    /// selected provider fall back to the template-only explainer.
    pub fn from_env() -> Self {
        let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        match provider.as_str() {
            "openai" => match std::env::var("OPENAI_API_KEY") {
                Ok(key) if !key.is_empty() => Explainer::with_llm(Box::new(OpenAiClient::new(key))),
                _ => {
                    tracing::info!("explain: OPENAI_API_KEY not set, using template explanations");
                    Explainer::template_only()
                }
            },
            "anthropic" => match std::env::var("ANTHROPIC_API_KEY") {
                Ok(key) if !key.is_empty() => Explainer::with_llm(Box::new(AnthropicClient::new(key))),
                _ => {
                    tracing::info!("explain: ANTHROPIC_API_KEY not set, using template explanations");
                    Explainer::template_only()
                }
            },
            "ollama" => {
                let url = std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
                Explainer::with_llm(Box::new(OllamaClient::new(url)))
            }
            other => {
                tracing::warn!(provider = other, "explain: unknown LLM_PROVIDER, using template explanations");
                Explainer::template_only()
            }
        }
    }

    /// Whether an LLM backend is wired in; surfaced by `/health`.
    pub fn uses_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Returns a human-readable explanation for `threat`. Falls back
    /// to the template on any LLM error.
    pub async fn explain(&self, threat: &Threat) -> String {
        let Some(llm) = &self.llm else {
            return template_explanation(threat);
        };
        match llm.complete(&prompt_for(threat)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("explain: LLM returned empty response, using template");
                template_explanation(threat)
            }
            Err(err) => {
                tracing::warn!(error = %err, "explain: LLM call failed, using template");
                template_explanation(threat)
            }
        }
    }
}

impl Default for Explainer {
    fn default() -> Self {
        Self::template_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentinel_model::{Id, Severity, ThreatSource, ThreatType};
    use serde_json::Value as Json;

    fn threat(severity: Severity) -> Threat {
        Threat {
            id: Id::new(),
            detected_at: Utc::now(),
            severity,
            threat_type: ThreatType::ReverseShell,
            source: ThreatSource {
                pod: Some("evil-pod".into()),
                namespace: None,
                container: None,
                user: None,
            },
            description: "spawned a reverse shell".into(),
            detector_output: "spawned a reverse shell".into(),
            detector_rule: None,
            detector_priority: None,
            ml_score: None,
            confidence: 0.7,
            raw_event: Json::Null,
            resolved: false,
            resolved_at: None,
        }
    }

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn complete(&self, _prompt: &str) -> Result<String, String> {
            Err("connection refused".to_string())
        }
    }

    #[tokio::test]
    async fn template_only_explainer_uses_template() {
        let explainer = Explainer::template_only();
        let text = explainer.explain(&threat(Severity::Critical)).await;
        assert!(text.contains("evil-pod"));
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_template() {
        let explainer = Explainer::with_llm(Box::new(FailingClient));
        let text = explainer.explain(&threat(Severity::High)).await;
        assert_eq!(text, template_explanation(&threat(Severity::High)));
    }
}
