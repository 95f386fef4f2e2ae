//! Turns a raw detector payload (shaped like a Falco alert) into a
//! normalized [`Threat`](sentinel_model::Threat).
//!
//! Detection of severity and threat type is deliberately dumb: a
//! priority lookup table and an ordered keyword scan. Nothing here
//! does anomaly scoring — that's [`sentinel-scoring`](../sentinel_scoring).

use chrono::Utc;
use sentinel_model::{Id, Severity, Threat, ThreatSource, ThreatType};
use serde_json::Value as Json;

/// Maps a detector priority string to a [`Severity`]. Unknown
/// priorities default to [`Severity::Low`], matching the original
/// processor's behavior for priorities it doesn't recognize.
pub fn severity_for_priority(priority: &str) -> Severity {
    match priority {
        "Emergency" => Severity::Critical,
        "Alert" | "Critical" => Severity::High,
        "Error" | "Warning" => Severity::Medium,
        "Notice" | "Informational" | "Debug" => Severity::Low,
        _ => Severity::Low,
    }
}

/// Ordered keyword table: first threat type whose keyword list matches
/// anywhere in `output` or `rule` wins. Order matters and is preserved
/// from the reference implementation.
const THREAT_KEYWORDS: &[(ThreatType, &[&str])] = &[
    (
        ThreatType::ReverseShell,
        &["reverse shell", "nc ", "netcat", "bash -i", "/bin/sh", "shell"],
    ),
    (
        ThreatType::PrivilegeEscalation,
        &["sudo", "su ", "setuid", "setgid", "capabilities"],
    ),
    (
        ThreatType::UnauthorizedAccess,
        &["unauthorized", "forbidden", "access denied"],
    ),
    (
        ThreatType::MaliciousProcess,
        &["malware", "virus", "trojan", "backdoor"],
    ),
    (
        ThreatType::NetworkAnomaly,
        &["port scan", "brute force", "ddos"],
    ),
    (
        ThreatType::FileAnomaly,
        &["sensitive file", "password", "secret", "credential"],
    ),
    (
        ThreatType::ContainerEscape,
        &["container escape", "host mount", "privileged"],
    ),
];

/// Detects a [`ThreatType`] from lowercased output/rule text via an
/// ordered substring scan. Returns [`ThreatType::Unknown`] if nothing
/// matches.
pub fn detect_threat_type(output_lower: &str, rule_lower: &str) -> ThreatType {
    let combined = format!("{output_lower} {rule_lower}");
    for (threat_type, keywords) in THREAT_KEYWORDS {
        if keywords.iter().any(|kw| combined.contains(kw)) {
            return *threat_type;
        }
    }
    ThreatType::Unknown
}

fn field_str(fields: &Json, key: &str) -> Option<String> {
    fields.get(key).and_then(Json::as_str).map(str::to_string)
}

/// Structural validity check the front-end runs before calling
/// [`normalize`]: the envelope must be a JSON object and must carry at
/// least one of `output`/`priority`. Anything else is dropped rather
/// than normalized into a meaningless `Threat`.
pub fn is_valid_envelope(event: &Json) -> bool {
    let Some(obj) = event.as_object() else {
        return false;
    };
    obj.contains_key("output") || obj.contains_key("priority")
}

/// Normalizes one detector event into a [`Threat`].
///
/// Expects the Falco-shaped envelope:
/// ```json
/// {
///   "output": "...",
///   "priority": "Warning",
///   "rule": "Terminal shell in container",
///   "output_fields": { "k8s.pod.name": "evil-pod", ... }
/// }
/// ```
pub fn normalize(event: &Json) -> Threat {
    let output = event.get("output").and_then(Json::as_str).unwrap_or("");
    let priority = event
        .get("priority")
        .and_then(Json::as_str)
        .unwrap_or("Informational");
    let rule = event.get("rule").and_then(Json::as_str).unwrap_or("Unknown");
    let empty_fields = Json::Object(Default::default());
    let output_fields = event.get("output_fields").unwrap_or(&empty_fields);

    let severity = severity_for_priority(priority);
    let threat_type = detect_threat_type(&output.to_lowercase(), &rule.to_lowercase());

    let pod_name = field_str(output_fields, "k8s.pod.name");
    let namespace = field_str(output_fields, "k8s.ns.name")
        .or_else(|| field_str(output_fields, "k8s.namespace.name"))
        .or_else(|| Some("default".to_string()));
    let container = field_str(output_fields, "container.name")
        .or_else(|| field_str(output_fields, "k8s.container.name"));
    let user = field_str(output_fields, "user.name").or_else(|| field_str(output_fields, "proc.user"));

    let description = Threat::truncated_description(output);

    tracing::debug!(
        threat_type = %threat_type,
        severity = %severity,
        pod = pod_name.as_deref().unwrap_or("-"),
        "normalized detector event"
    );

    Threat {
        id: Id::new(),
        detected_at: Utc::now(),
        severity,
        threat_type,
        source: ThreatSource {
            pod: pod_name,
            namespace,
            container,
            user,
        },
        description,
        detector_output: output.to_string(),
        detector_rule: Some(rule.to_string()),
        detector_priority: Some(priority.to_string()),
        ml_score: None,
        confidence: 0.7,
        raw_event: event.clone(),
        resolved: false,
        resolved_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_priority_falls_back_to_low() {
        assert_eq!(severity_for_priority("Something Else"), Severity::Low);
    }

    #[test]
    fn priority_table_matches_reference() {
        assert_eq!(severity_for_priority("Emergency"), Severity::Critical);
        assert_eq!(severity_for_priority("Alert"), Severity::High);
        assert_eq!(severity_for_priority("Critical"), Severity::High);
        assert_eq!(severity_for_priority("Error"), Severity::Medium);
        assert_eq!(severity_for_priority("Warning"), Severity::Medium);
        assert_eq!(severity_for_priority("Notice"), Severity::Low);
        assert_eq!(severity_for_priority("Debug"), Severity::Low);
    }

    #[test]
    fn keyword_scan_is_first_match_wins() {
        // contains both a reverse-shell keyword and a privilege-escalation
        // keyword; reverse shell is earlier in the table so it wins.
        let t = detect_threat_type("spawned bash -i shell then ran sudo", "terminal shell in container");
        assert_eq!(t, ThreatType::ReverseShell);
    }

    #[test]
    fn no_keyword_match_is_unknown() {
        assert_eq!(detect_threat_type("nothing interesting happened", "benign rule"), ThreatType::Unknown);
    }

    #[test]
    fn normalize_extracts_k8s_fields_and_truncates_description() {
        let event = json!({
            "output": "x".repeat(600),
            "priority": "Warning",
            "rule": "Terminal shell in container",
            "output_fields": {
                "k8s.pod.name": "evil-pod",
                "k8s.ns.name": "default",
                "container.name": "evil-container",
                "user.name": "root"
            }
        });
        let threat = normalize(&event);
        assert_eq!(threat.source.pod.as_deref(), Some("evil-pod"));
        assert_eq!(threat.source.namespace.as_deref(), Some("default"));
        assert_eq!(threat.source.container.as_deref(), Some("evil-container"));
        assert_eq!(threat.source.user.as_deref(), Some("root"));
        assert_eq!(threat.description.chars().count(), 500);
        assert_eq!(threat.confidence, 0.7);
        assert_eq!(threat.severity, Severity::Medium);
    }

    #[test]
    fn normalize_defaults_namespace_when_absent() {
        let event = json!({"output": "ok", "priority": "Informational", "rule": "noop"});
        let threat = normalize(&event);
        assert_eq!(threat.source.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn empty_envelope_is_invalid() {
        assert!(!is_valid_envelope(&json!({})));
    }

    #[test]
    fn non_object_envelope_is_invalid() {
        assert!(!is_valid_envelope(&json!([1, 2, 3])));
        assert!(!is_valid_envelope(&json!("just a string")));
    }

    #[test]
    fn envelope_with_only_priority_is_valid() {
        assert!(is_valid_envelope(&json!({"priority": "Warning"})));
    }

    #[test]
    fn envelope_with_only_output_is_valid() {
        assert!(is_valid_envelope(&json!({"output": "something happened"})));
    }
}
