//! The `Sentinel` facade: wires the Normalizer, Store, Broadcast hub,
//! Scorer, Decider, Actuator and Explainer into the single `ingest()`
//! call the ingestion front-end drives per request.
//!
//! Ordering matches §5: Normalizer -> Store -> Broadcast -> Scorer ->
//! Decider -> Actuator is sequential within one call, and the Threat
//! is durably visible via the Store before it is broadcast.

use crate::config::SentinelConfig;
use crate::error::SentinelError;
use futures::FutureExt;
use sentinel_broadcast::BroadcastHub;
use sentinel_model::{Action, Id, Threat};
use sentinel_response::{Actuator, Decider, HttpOrchestrator};
use sentinel_scoring::Scorer;
use sentinel_store::Store;
use serde_json::Value as Json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Outcome of one `ingest`/`simulate` call, mirroring the webhook's
/// `{status, threat_id?, severity?, action?}` response shape.
pub enum IngestOutcome {
    /// The envelope failed the structural validity check (§4.2); no
    /// Threat was created, nothing was stored or broadcast.
    Dropped,
    /// A Threat was normalized and stored; `action` is `None` for
    /// `/api/v1/simulate`, which never scores, decides, or actuates.
    Processed { threat: Threat, action: Option<Action> },
}

/// Payload shape delivered to dashboard subscribers on every
/// successful ingestion (§4.2, §8 P8).
#[derive(serde::Serialize)]
struct DetectionEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    threat_id: Id,
    severity: &'a sentinel_model::Severity,
    threat_type: &'a sentinel_model::ThreatType,
    pod: Option<&'a str>,
    description: String,
}

/// One service's contribution to `/health` (spec.md §6).
#[derive(serde::Serialize)]
pub struct ServiceStatus {
    pub healthy: bool,
    pub detail: String,
}

/// Full `/health` snapshot, aggregated by the Supervisor (C11).
#[derive(serde::Serialize)]
pub struct SentinelHealth {
    pub ml: ServiceStatus,
    pub rl: ServiceStatus,
    pub llm: ServiceStatus,
    pub remediation: ServiceStatus,
    pub store: sentinel_store::StoreHealth,
}

pub struct Sentinel {
    store: Arc<Store>,
    scorer: Scorer,
    decider: Decider,
    actuator: Actuator,
    broadcast: Arc<BroadcastHub>,
    explainer: sentinel_explain::Explainer,
}

impl Sentinel {
    /// Assembles every component from `config`, probing the
    /// orchestrator once (§4.5/§5) and falling back to simulation when
    /// it isn't configured or isn't reachable within the 5s budget.
    pub async fn new(config: &SentinelConfig) -> Self {
        let store = Arc::new(Store::from_env().await);
        let scorer = Scorer::new();
        let decider = Decider::from_env();
        let actuator = match &config.orchestrator_url {
            Some(url) => Actuator::discover(Box::new(HttpOrchestrator::new(url.clone()))).await,
            None => {
                tracing::info!("no ORCHESTRATOR_URL configured, actuator running in simulated mode");
                Actuator::simulated()
            }
        };
        let broadcast = Arc::new(BroadcastHub::new());
        let explainer = sentinel_explain::Explainer::from_env();

        Sentinel {
            store,
            scorer,
            decider,
            actuator,
            broadcast,
            explainer,
        }
    }

    /// Builds a fully in-process `Sentinel` (memory store, simulated
    /// orchestrator, template-only explainer) for tests.
    pub fn for_tests() -> Self {
        Self::for_tests_with_decider(Decider::new(Box::new(sentinel_response::TablePolicy)))
    }

    /// Same as [`Self::for_tests`] but with a caller-supplied `Decider`,
    /// so a test can swap in an alternate `Policy` (e.g. to force
    /// `requires_confirmation` off) without touching anything else.
    pub fn for_tests_with_decider(decider: Decider) -> Self {
        Sentinel {
            store: Arc::new(Store::memory()),
            scorer: Scorer::new(),
            decider,
            actuator: Actuator::simulated(),
            broadcast: Arc::new(BroadcastHub::new()),
            explainer: sentinel_explain::Explainer::template_only(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn broadcast_hub(&self) -> &Arc<BroadcastHub> {
        &self.broadcast
    }

    /// Per-service status for `/health` (spec.md §6): `ml` reflects the
    /// Store's durable backing (the Scorer itself has no external
    /// dependency to degrade), `rl` is always `healthy` since no
    /// learned policy is bundled, `llm` reflects whether an LLM backend
    /// is wired in, and `remediation` reflects whether the Actuator is
    /// running against a real orchestrator or simulation.
    pub fn health(&self) -> SentinelHealth {
        let store_health = self.store.health();
        SentinelHealth {
            ml: ServiceStatus {
                healthy: store_health.backing == "durable" || store_health.degraded_reads == 0,
                detail: format!("store backing: {}", store_health.backing),
            },
            rl: ServiceStatus {
                healthy: true,
                detail: "table policy".to_string(),
            },
            llm: ServiceStatus {
                healthy: true,
                detail: if self.explainer.uses_llm() { "llm backend configured" } else { "template-only" }.to_string(),
            },
            remediation: ServiceStatus {
                healthy: true,
                detail: if self.actuator.is_simulated() { "simulated orchestrator" } else { "live orchestrator" }.to_string(),
            },
            store: store_health,
        }
    }

    /// Runs the full pipeline: Normalizer -> Store -> Broadcast ->
    /// Scorer -> Decider -> Actuator -> Store. Every stage boundary
    /// catches internally (§7), so the only failure this can still
    /// surface is a genuine bug - an unexpected panic somewhere in the
    /// pipeline. That's caught here and turned into `SentinelError::Internal`,
    /// which `sentinel-server` maps to an opaque HTTP 500 instead of
    /// taking the whole process down.
    pub async fn ingest(&self, event: &Json) -> Result<IngestOutcome, SentinelError> {
        AssertUnwindSafe(self.ingest_inner(event)).catch_unwind().await.map_err(|payload| {
            let message = panic_message(&payload);
            tracing::error!(error = %message, "unexpected panic in ingestion pipeline");
            SentinelError::Internal(message)
        })
    }

    async fn ingest_inner(&self, event: &Json) -> IngestOutcome {
        let Some(mut threat) = self.normalize(event) else {
            return IngestOutcome::Dropped;
        };

        self.store.add_threat(threat.clone()).await;
        self.publish_detection(&threat);

        let ml_score = self.scorer.score(&threat);
        threat.ml_score = Some(ml_score);
        // add_threat is upsert-on-identity (§4.1), so re-storing after
        // scoring persists the one-time ml_score mutation (§3 I6).
        self.store.add_threat(threat.clone()).await;

        let mut action = self.decider.decide(&threat);
        self.actuator.execute(&mut action, &threat).await;
        self.store.add_action(action.clone()).await;

        IngestOutcome::Processed {
            threat,
            action: Some(action),
        }
    }

    /// Identical front door to `ingest` but never runs Scorer/Decider/
    /// Actuator; used to seed test data (`POST /api/v1/simulate`).
    pub async fn simulate(&self, event: &Json) -> IngestOutcome {
        let Some(threat) = self.normalize(event) else {
            return IngestOutcome::Dropped;
        };
        self.store.add_threat(threat.clone()).await;
        self.publish_detection(&threat);
        IngestOutcome::Processed { threat, action: None }
    }

    fn normalize(&self, event: &Json) -> Option<Threat> {
        if !sentinel_detect::is_valid_envelope(event) {
            return None;
        }
        Some(sentinel_detect::normalize(event))
    }

    fn publish_detection(&self, threat: &Threat) {
        self.broadcast.broadcast(&DetectionEvent {
            kind: "threat_detected",
            threat_id: threat.id,
            severity: &threat.severity,
            threat_type: &threat.threat_type,
            pod: threat.source.pod.as_deref(),
            description: threat.broadcast_summary(),
        });
    }

    /// Resolves a Threat by id, returning it updated on success.
    pub async fn resolve_threat(&self, id: Id) -> Option<Threat> {
        let existing = self.store.find_threat(id).await?;
        if existing.resolved {
            return Some(existing);
        }
        self.store.mark_resolved(id, chrono::Utc::now()).await;
        self.store.find_threat(id).await
    }

    /// Calls the Explanation hook for a stored Threat.
    pub async fn explain(&self, id: Id) -> Option<(Threat, String)> {
        let threat = self.store.find_threat(id).await?;
        let explanation = self.explainer.explain(&threat).await;
        Some((threat, explanation))
    }
}

/// Best-effort extraction of a human-readable message from a caught
/// panic payload; panics carry either a `&str` or `String` in the
/// overwhelming majority of cases.
fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic in ingestion pipeline".to_string()
    }
}
