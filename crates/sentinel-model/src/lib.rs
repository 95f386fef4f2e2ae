//! Value types shared by every stage of the response pipeline.
//!
//! A `Threat` is the normalized record of something the detector saw;
//! an `Action` is the remediation decided (and possibly executed) for
//! it. Nothing in this crate talks to storage, the network, or a
//! scoring model — it only defines the shapes those stages pass around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit identifier for a `Threat` or `Action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub Uuid);

impl Id {
    pub fn new() -> Self {
        Id(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Id(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fallback anomaly score used when the scorer itself is unavailable.
    pub fn fallback_score(self) -> f64 {
        match self {
            Severity::Low => 0.3,
            Severity::Medium => 0.6,
            Severity::High => 0.85,
            Severity::Critical => 0.95,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    ReverseShell,
    PrivilegeEscalation,
    UnauthorizedAccess,
    MaliciousProcess,
    NetworkAnomaly,
    FileAnomaly,
    ContainerEscape,
    Unknown,
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreatType::ReverseShell => "reverse_shell",
            ThreatType::PrivilegeEscalation => "privilege_escalation",
            ThreatType::UnauthorizedAccess => "unauthorized_access",
            ThreatType::MaliciousProcess => "malicious_process",
            ThreatType::NetworkAnomaly => "network_anomaly",
            ThreatType::FileAnomaly => "file_anomaly",
            ThreatType::ContainerEscape => "container_escape",
            ThreatType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Source metadata about where a threat originated, as reported by the
/// detector. Every field is best-effort: detectors don't always know
/// the pod, the container, or the acting user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatSource {
    pub pod: Option<String>,
    pub namespace: Option<String>,
    pub container: Option<String>,
    pub user: Option<String>,
}

/// A normalized security event, ready for scoring and decisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    pub id: Id,
    pub detected_at: DateTime<Utc>,
    pub severity: Severity,
    pub threat_type: ThreatType,
    pub source: ThreatSource,
    pub description: String,
    pub detector_output: String,
    pub detector_rule: Option<String>,
    pub detector_priority: Option<String>,
    pub ml_score: Option<f64>,
    pub confidence: f64,
    pub raw_event: Json,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Threat {
    /// Truncate `detector_output` to the description length the
    /// Normalizer is contracted to produce (first 500 bytes).
    pub fn truncated_description(output: &str) -> String {
        truncate_chars(output, 500)
    }

    /// Shorter summary used in broadcast payloads.
    pub fn broadcast_summary(&self) -> String {
        truncate_chars(&self.description, 100)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Monitor,
    Log,
    Alert,
    IsolatePod,
    TerminatePod,
    BlockNetwork,
    TerminateProcess,
    Escalate,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionType::Monitor => "monitor",
            ActionType::Log => "log",
            ActionType::Alert => "alert",
            ActionType::IsolatePod => "isolate_pod",
            ActionType::TerminatePod => "terminate_pod",
            ActionType::BlockNetwork => "block_network",
            ActionType::TerminateProcess => "terminate_process",
            ActionType::Escalate => "escalate",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{s}")
    }
}

/// A remediation decided (and possibly executed) in response to a threat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Id,
    pub threat_id: Id,
    pub action_type: ActionType,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub ml_score: Option<f64>,
    pub executed: bool,
    pub executed_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub error_message: Option<String>,
    pub parameters: BTreeMap<String, Json>,
    pub requires_confirmation: bool,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Action {
    pub fn new(threat_id: Id, action_type: ActionType, risk_level: RiskLevel, confidence: f64) -> Self {
        Action {
            id: Id::new(),
            threat_id,
            action_type,
            risk_level,
            confidence,
            ml_score: None,
            executed: false,
            executed_at: None,
            success: None,
            error_message: None,
            parameters: BTreeMap::new(),
            requires_confirmation: matches!(risk_level, RiskLevel::Medium | RiskLevel::High),
            confirmed_by: None,
            confirmed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_display_matches_wire_contract() {
        assert_eq!(Severity::Critical.to_string(), "critical");
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn action_type_round_trips_through_json() {
        let json = serde_json::to_string(&ActionType::IsolatePod).unwrap();
        assert_eq!(json, "\"isolate_pod\"");
        let back: ActionType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActionType::IsolatePod);
    }

    #[test]
    fn description_truncates_to_500_chars() {
        let long = "x".repeat(600);
        let desc = Threat::truncated_description(&long);
        assert_eq!(desc.chars().count(), 500);
    }

    #[test]
    fn broadcast_summary_truncates_to_100_chars() {
        let threat = sample_threat("y".repeat(200));
        assert_eq!(threat.broadcast_summary().chars().count(), 100);
    }

    #[test]
    fn new_action_requires_confirmation_for_medium_and_high_risk() {
        let low = Action::new(Id::new(), ActionType::Monitor, RiskLevel::Low, 0.9);
        let medium = Action::new(Id::new(), ActionType::IsolatePod, RiskLevel::Medium, 0.9);
        let high = Action::new(Id::new(), ActionType::TerminatePod, RiskLevel::High, 0.9);
        assert!(!low.requires_confirmation);
        assert!(medium.requires_confirmation);
        assert!(high.requires_confirmation);
    }

    fn sample_threat(description: String) -> Threat {
        Threat {
            id: Id::new(),
            detected_at: Utc::now(),
            severity: Severity::Medium,
            threat_type: ThreatType::Unknown,
            source: ThreatSource::default(),
            description,
            detector_output: String::new(),
            detector_rule: None,
            detector_priority: None,
            ml_score: None,
            confidence: 0.0,
            raw_event: Json::Null,
            resolved: false,
            resolved_at: None,
        }
    }
}
