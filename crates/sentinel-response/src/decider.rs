//! Turns a scored [`Threat`] into a proposed [`Action`], before any
//! execution happens.

use sentinel_model::{Action, ActionType, RiskLevel, Severity, Threat, ThreatType};

/// A pluggable remediation policy. [`TablePolicy`] is the only
/// implementation shipped; the seam exists so a learned policy can be
/// dropped in later without touching the Decider.
pub trait Policy: Send + Sync {
    fn decide(&self, threat: &Threat, ml_score: Option<f64>) -> (ActionType, RiskLevel, f64);
}

/// Severity/threat-type lookup table mirroring the rule-based policy
/// this pipeline was distilled from: moderate response posture, where
/// low-risk actions auto-execute and medium/high-risk ones wait for
/// confirmation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TablePolicy;

impl Policy for TablePolicy {
    fn decide(&self, threat: &Threat, ml_score: Option<f64>) -> (ActionType, RiskLevel, f64) {
        let (action_type, risk_level, base_confidence) = match threat.severity {
            Severity::Critical => {
                if threat.threat_type == ThreatType::ReverseShell {
                    (ActionType::TerminatePod, RiskLevel::High, 0.9)
                } else {
                    (ActionType::IsolatePod, RiskLevel::Medium, 0.8)
                }
            }
            Severity::High => {
                if matches!(threat.threat_type, ThreatType::ReverseShell | ThreatType::ContainerEscape) {
                    (ActionType::IsolatePod, RiskLevel::Medium, 0.75)
                } else {
                    (ActionType::Alert, RiskLevel::Low, 0.7)
                }
            }
            Severity::Medium => (ActionType::Alert, RiskLevel::Low, 0.6),
            Severity::Low => (ActionType::Log, RiskLevel::Low, 0.5),
        };

        let confidence = (base_confidence + 0.2 * ml_score.unwrap_or(0.0)).min(1.0);
        (action_type, risk_level, confidence)
    }
}

pub struct Decider {
    policy: Box<dyn Policy>,
}

impl Decider {
    pub fn new(policy: Box<dyn Policy>) -> Self {
        Decider { policy }
    }

    /// Builds the active policy from environment, matching the
    /// `USE_RL_AGENT` / `RL_MODEL_PATH` contract: without a bundled
    /// learned model, the table policy is always selected, but the
    /// env vars are still read so a future learned policy has a
    /// well-known place to hook in.
    pub fn from_env() -> Self {
        let use_rl = std::env::var("USE_RL_AGENT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if use_rl {
            let path = std::env::var("RL_MODEL_PATH").unwrap_or_else(|_| "models/rl_agent.zip".to_string());
            tracing::warn!(model_path = %path, "USE_RL_AGENT set but no learned policy is bundled; using table policy");
        }
        Decider::new(Box::new(TablePolicy))
    }

    pub fn decide(&self, threat: &Threat) -> Action {
        let (action_type, risk_level, confidence) = self.policy.decide(threat, threat.ml_score);
        let mut action = Action::new(threat.id, action_type, risk_level, confidence);
        action.ml_score = threat.ml_score;
        action
    }
}
