//! Client seam for the container-orchestration control plane.
//!
//! The pipeline only ever needs two operations from the orchestrator:
//! deleting a pod and isolating one behind a deny-all network policy.
//! Everything else (how the orchestrator authenticates, what cluster
//! it targets) is out of scope here.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator request failed: {0}")]
    Request(String),
    #[error("orchestrator unavailable")]
    Unavailable,
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn delete_pod(&self, namespace: &str, pod: &str, grace_period_seconds: u32) -> Result<(), OrchestratorError>;
    async fn isolate_pod(&self, namespace: &str, pod: &str) -> Result<(), OrchestratorError>;
    /// Cheap liveness probe used at start-up to decide whether to run
    /// against the real orchestrator or fall back to simulation.
    async fn ping(&self) -> bool;
}

/// Talks to a Kubernetes-API-shaped HTTP endpoint. The exact auth
/// scheme and base URL are an external concern; this client only
/// knows the two verbs it needs.
pub struct HttpOrchestrator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrchestrator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client builds with default TLS backend");
        HttpOrchestrator {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Orchestrator for HttpOrchestrator {
    async fn delete_pod(&self, namespace: &str, pod: &str, grace_period_seconds: u32) -> Result<(), OrchestratorError> {
        let url = format!(
            "{}/api/v1/namespaces/{namespace}/pods/{pod}?gracePeriodSeconds={grace_period_seconds}",
            self.base_url
        );
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| OrchestratorError::Request(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(OrchestratorError::Request(format!("status {}", resp.status())))
        }
    }

    async fn isolate_pod(&self, namespace: &str, pod: &str) -> Result<(), OrchestratorError> {
        let url = format!(
            "{}/apis/networking.k8s.io/v1/namespaces/{namespace}/networkpolicies",
            self.base_url
        );
        let body = serde_json::json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "NetworkPolicy",
            "metadata": { "name": format!("{pod}-isolate"), "namespace": namespace },
            "spec": {
                "podSelector": { "matchLabels": { "pod-name": pod } },
                "policyTypes": ["Ingress", "Egress"],
                "ingress": [],
                "egress": []
            }
        });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::Request(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(OrchestratorError::Request(format!("status {}", resp.status())))
        }
    }

    async fn ping(&self) -> bool {
        self.client
            .get(format!("{}/healthz", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Always succeeds without touching any real infrastructure. Used
/// when the real orchestrator isn't reachable, or none is configured.
#[derive(Debug, Default)]
pub struct SimulatedOrchestrator;

#[async_trait]
impl Orchestrator for SimulatedOrchestrator {
    async fn delete_pod(&self, namespace: &str, pod: &str, _grace_period_seconds: u32) -> Result<(), OrchestratorError> {
        tracing::info!(namespace, pod, "[SIMULATED] would terminate pod");
        Ok(())
    }

    async fn isolate_pod(&self, namespace: &str, pod: &str) -> Result<(), OrchestratorError> {
        tracing::info!(namespace, pod, "[SIMULATED] would isolate pod");
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}
