//! Pure template explanation, no network calls. Always available as
//! the fallback path, and the whole story when no LLM is configured.

use sentinel_model::{Severity, Threat};

fn humanize(threat_type: sentinel_model::ThreatType) -> String {
    threat_type.to_string().replace('_', " ")
}

/// Severity-conditioned sentence referencing the pod and a humanized
/// threat type. Deliberately plain and technical register, no
/// assistant persona.
pub fn template_explanation(threat: &Threat) -> String {
    let pod = threat.source.pod.as_deref().unwrap_or("an unidentified pod");
    let kind = humanize(threat.threat_type);

    match threat.severity {
        Severity::Critical => format!(
            "Critical {kind} threat detected in pod {pod}. Immediate remediation is required."
        ),
        Severity::High => format!(
            "High-severity {kind} threat detected in pod {pod}. Review and confirm remediation promptly."
        ),
        Severity::Medium | Severity::Low => format!(
            "{kind} event detected in pod {pod}. Monitoring for escalation."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentinel_model::{Id, ThreatSource, ThreatType};
    use serde_json::Value as Json;

    fn threat(severity: Severity, pod: Option<&str>) -> Threat {
        Threat {
            id: Id::new(),
            detected_at: Utc::now(),
            severity,
            threat_type: ThreatType::ContainerEscape,
            source: ThreatSource {
                pod: pod.map(str::to_string),
                namespace: None,
                container: None,
                user: None,
            },
            description: "escaped container namespace".into(),
            detector_output: "escaped container namespace".into(),
            detector_rule: None,
            detector_priority: None,
            ml_score: None,
            confidence: 0.7,
            raw_event: Json::Null,
            resolved: false,
            resolved_at: None,
        }
    }

    #[test]
    fn critical_mentions_immediate_remediation() {
        let text = template_explanation(&threat(Severity::Critical, Some("evil-pod")));
        assert!(text.contains("Critical"));
        assert!(text.contains("evil-pod"));
        assert!(text.contains("container escape"));
    }

    #[test]
    fn missing_pod_uses_placeholder() {
        let text = template_explanation(&threat(Severity::Low, None));
        assert!(text.contains("an unidentified pod"));
    }
}
