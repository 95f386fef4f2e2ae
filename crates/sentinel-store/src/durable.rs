//! Durable backing over `sqlx::Any` (sqlite or postgres, selected by
//! the `DATABASE_URL` scheme). Every operation is wrapped: a
//! `sqlx::Error` is logged at `warn!` and the call falls through to an
//! in-memory mirror kept alongside the pool, so a degraded call still
//! returns a sane value to the caller instead of an error. This is the
//! "durable realization wraps the in-memory one and delegates on
//! failure" discipline.

use crate::memory::MemoryStore;
use crate::StoreHealth;
use chrono::{DateTime, Utc};
use sentinel_model::{
    Action, ActionType, Id, RiskLevel, Severity, Threat, ThreatSource, ThreatType,
};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Row, Any, Pool};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

const CREATE_THREATS: &str = r#"
CREATE TABLE IF NOT EXISTS threat_events (
    id TEXT PRIMARY KEY,
    detected_at TEXT NOT NULL,
    severity TEXT NOT NULL,
    threat_type TEXT NOT NULL,
    source_pod TEXT,
    source_namespace TEXT,
    source_container TEXT,
    source_user TEXT,
    description TEXT NOT NULL,
    detector_output TEXT NOT NULL,
    detector_rule TEXT,
    detector_priority TEXT,
    ml_score REAL,
    confidence REAL NOT NULL,
    raw_event TEXT NOT NULL,
    resolved INTEGER NOT NULL,
    resolved_at TEXT
)"#;

const CREATE_ACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS remediation_actions (
    id TEXT PRIMARY KEY,
    threat_id TEXT NOT NULL,
    action_type TEXT NOT NULL,
    risk_level TEXT NOT NULL,
    confidence REAL NOT NULL,
    ml_score REAL,
    executed INTEGER NOT NULL,
    executed_at TEXT,
    success INTEGER,
    error_message TEXT,
    parameters TEXT NOT NULL,
    requires_confirmation INTEGER NOT NULL,
    confirmed_by TEXT,
    confirmed_at TEXT
)"#;

const CREATE_ACTIONS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_remediation_actions_threat_id ON remediation_actions(threat_id)";

pub struct DurableStore {
    pool: Pool<Any>,
    mirror: MemoryStore,
    degraded_reads: AtomicU64,
    degraded_writes: AtomicU64,
}

impl DurableStore {
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().max_connections(10).connect(url).await?;
        sqlx::query(CREATE_THREATS).execute(&pool).await?;
        sqlx::query(CREATE_ACTIONS).execute(&pool).await?;
        sqlx::query(CREATE_ACTIONS_INDEX).execute(&pool).await?;
        Ok(DurableStore {
            pool,
            mirror: MemoryStore::new(),
            degraded_reads: AtomicU64::new(0),
            degraded_writes: AtomicU64::new(0),
        })
    }

    pub fn health(&self) -> StoreHealth {
        StoreHealth {
            backing: "durable",
            degraded_reads: self.degraded_reads.load(Ordering::Relaxed),
            degraded_writes: self.degraded_writes.load(Ordering::Relaxed),
        }
    }

    pub async fn add_threat(&self, threat: Threat) {
        self.mirror.add_threat(threat.clone());
        if let Err(err) = self.insert_threat(&threat).await {
            tracing::warn!(error = %err, threat_id = %threat.id, "store: durable write failed, degraded to memory");
            self.degraded_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn add_action(&self, action: Action) {
        self.mirror.add_action(action.clone());
        if let Err(err) = self.insert_action(&action).await {
            tracing::warn!(error = %err, action_id = %action.id, "store: durable write failed, degraded to memory");
            self.degraded_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn list_threats(&self) -> Vec<Threat> {
        match self.select_threats(None).await {
            Ok(threats) => threats,
            Err(err) => {
                tracing::warn!(error = %err, "store: durable read failed, degraded to memory");
                self.degraded_reads.fetch_add(1, Ordering::Relaxed);
                self.mirror.list_threats()
            }
        }
    }

    pub async fn list_actions(&self) -> Vec<Action> {
        match self.select_actions(None).await {
            Ok(actions) => actions,
            Err(err) => {
                tracing::warn!(error = %err, "store: durable read failed, degraded to memory");
                self.degraded_reads.fetch_add(1, Ordering::Relaxed);
                self.mirror.list_actions()
            }
        }
    }

    pub async fn find_threat(&self, id: Id) -> Option<Threat> {
        match self.select_threats(Some(id)).await {
            Ok(mut threats) => threats.pop(),
            Err(err) => {
                tracing::warn!(error = %err, threat_id = %id, "store: durable read failed, degraded to memory");
                self.degraded_reads.fetch_add(1, Ordering::Relaxed);
                self.mirror.find_threat(id)
            }
        }
    }

    pub async fn find_action(&self, id: Id) -> Option<Action> {
        match self.select_actions(Some(id)).await {
            Ok(mut actions) => actions.pop(),
            Err(err) => {
                tracing::warn!(error = %err, action_id = %id, "store: durable read failed, degraded to memory");
                self.degraded_reads.fetch_add(1, Ordering::Relaxed);
                self.mirror.find_action(id)
            }
        }
    }

    pub async fn mark_resolved(&self, id: Id, at: DateTime<Utc>) {
        self.mirror.mark_resolved(id, at);
        let result = sqlx::query("UPDATE threat_events SET resolved = 1, resolved_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, threat_id = %id, "store: durable resolve failed, degraded to memory");
            self.degraded_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Upserts one threat row. `add_threat` is called twice per
    /// ingestion (once on creation, once after the Scorer attaches
    /// `ml_score`), and `sqlx::Any` has no portable `ON CONFLICT`
    /// syntax across sqlite/postgres, so identity is resolved with an
    /// `UPDATE`-then-`INSERT-if-absent` pair rather than a single
    /// upsert statement.
    async fn insert_threat(&self, t: &Threat) -> Result<(), sqlx::Error> {
        let updated = sqlx::query(
            "UPDATE threat_events SET detected_at=?, severity=?, threat_type=?, source_pod=?, source_namespace=?, \
             source_container=?, source_user=?, description=?, detector_output=?, detector_rule=?, \
             detector_priority=?, ml_score=?, confidence=?, raw_event=?, resolved=?, resolved_at=? WHERE id=?",
        )
        .bind(t.detected_at.to_rfc3339())
        .bind(t.severity.to_string())
        .bind(t.threat_type.to_string())
        .bind(t.source.pod.clone())
        .bind(t.source.namespace.clone())
        .bind(t.source.container.clone())
        .bind(t.source.user.clone())
        .bind(t.description.clone())
        .bind(t.detector_output.clone())
        .bind(t.detector_rule.clone())
        .bind(t.detector_priority.clone())
        .bind(t.ml_score)
        .bind(t.confidence)
        .bind(t.raw_event.to_string())
        .bind(t.resolved as i64)
        .bind(t.resolved_at.map(|d| d.to_rfc3339()))
        .bind(t.id.to_string())
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() > 0 {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO threat_events (id, detected_at, severity, threat_type, source_pod, source_namespace, \
             source_container, source_user, description, detector_output, detector_rule, detector_priority, \
             ml_score, confidence, raw_event, resolved, resolved_at) \
             VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(t.id.to_string())
        .bind(t.detected_at.to_rfc3339())
        .bind(t.severity.to_string())
        .bind(t.threat_type.to_string())
        .bind(t.source.pod.clone())
        .bind(t.source.namespace.clone())
        .bind(t.source.container.clone())
        .bind(t.source.user.clone())
        .bind(t.description.clone())
        .bind(t.detector_output.clone())
        .bind(t.detector_rule.clone())
        .bind(t.detector_priority.clone())
        .bind(t.ml_score)
        .bind(t.confidence)
        .bind(t.raw_event.to_string())
        .bind(t.resolved as i64)
        .bind(t.resolved_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts one action row; see `insert_threat` for why this isn't a
    /// single statement. The Actuator mutates an `Action` in place
    /// after `Decider` first persists it, so the same identity is
    /// written twice per ingestion.
    async fn insert_action(&self, a: &Action) -> Result<(), sqlx::Error> {
        let parameters = serde_json::to_string(&a.parameters).unwrap_or_else(|_| "{}".to_string());
        let updated = sqlx::query(
            "UPDATE remediation_actions SET threat_id=?, action_type=?, risk_level=?, confidence=?, ml_score=?, \
             executed=?, executed_at=?, success=?, error_message=?, parameters=?, requires_confirmation=?, \
             confirmed_by=?, confirmed_at=? WHERE id=?",
        )
        .bind(a.threat_id.to_string())
        .bind(a.action_type.to_string())
        .bind(a.risk_level.to_string())
        .bind(a.confidence)
        .bind(a.ml_score)
        .bind(a.executed as i64)
        .bind(a.executed_at.map(|d| d.to_rfc3339()))
        .bind(a.success.map(|s| s as i64))
        .bind(a.error_message.clone())
        .bind(parameters.clone())
        .bind(a.requires_confirmation as i64)
        .bind(a.confirmed_by.clone())
        .bind(a.confirmed_at.map(|d| d.to_rfc3339()))
        .bind(a.id.to_string())
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() > 0 {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO remediation_actions (id, threat_id, action_type, risk_level, confidence, ml_score, \
             executed, executed_at, success, error_message, parameters, requires_confirmation, confirmed_by, \
             confirmed_at) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(a.id.to_string())
        .bind(a.threat_id.to_string())
        .bind(a.action_type.to_string())
        .bind(a.risk_level.to_string())
        .bind(a.confidence)
        .bind(a.ml_score)
        .bind(a.executed as i64)
        .bind(a.executed_at.map(|d| d.to_rfc3339()))
        .bind(a.success.map(|s| s as i64))
        .bind(a.error_message.clone())
        .bind(parameters)
        .bind(a.requires_confirmation as i64)
        .bind(a.confirmed_by.clone())
        .bind(a.confirmed_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select_threats(&self, id: Option<Id>) -> Result<Vec<Threat>, sqlx::Error> {
        let rows: Vec<AnyRow> = if let Some(id) = id {
            sqlx::query("SELECT * FROM threat_events WHERE id = ?")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM threat_events ORDER BY detected_at ASC")
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.iter().filter_map(row_to_threat).collect())
    }

    async fn select_actions(&self, id: Option<Id>) -> Result<Vec<Action>, sqlx::Error> {
        let rows: Vec<AnyRow> = if let Some(id) = id {
            sqlx::query("SELECT * FROM remediation_actions WHERE id = ?")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM remediation_actions")
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.iter().filter_map(row_to_action).collect())
    }
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

fn row_to_threat(row: &AnyRow) -> Option<Threat> {
    let id: String = row.try_get("id").ok()?;
    let detected_at: String = row.try_get("detected_at").ok()?;
    let severity: String = row.try_get("severity").ok()?;
    let threat_type: String = row.try_get("threat_type").ok()?;
    let description: String = row.try_get("description").ok()?;
    let detector_output: String = row.try_get("detector_output").ok()?;
    let confidence: f64 = row.try_get("confidence").ok()?;
    let raw_event: String = row.try_get("raw_event").ok()?;
    let resolved: i64 = row.try_get("resolved").ok()?;

    Some(Threat {
        id: Id::from_str(&id).ok()?,
        detected_at: parse_time(&detected_at)?,
        severity: severity_from_str(&severity)?,
        threat_type: threat_type_from_str(&threat_type)?,
        source: ThreatSource {
            pod: row.try_get("source_pod").ok(),
            namespace: row.try_get("source_namespace").ok(),
            container: row.try_get("source_container").ok(),
            user: row.try_get("source_user").ok(),
        },
        description,
        detector_output,
        detector_rule: row.try_get("detector_rule").ok(),
        detector_priority: row.try_get("detector_priority").ok(),
        ml_score: row.try_get("ml_score").ok(),
        confidence,
        raw_event: serde_json::from_str(&raw_event).unwrap_or(serde_json::Value::Null),
        resolved: resolved != 0,
        resolved_at: row
            .try_get::<Option<String>, _>("resolved_at")
            .ok()
            .flatten()
            .and_then(|s| parse_time(&s)),
    })
}

fn row_to_action(row: &AnyRow) -> Option<Action> {
    let id: String = row.try_get("id").ok()?;
    let threat_id: String = row.try_get("threat_id").ok()?;
    let action_type: String = row.try_get("action_type").ok()?;
    let risk_level: String = row.try_get("risk_level").ok()?;
    let confidence: f64 = row.try_get("confidence").ok()?;
    let executed: i64 = row.try_get("executed").ok()?;
    let requires_confirmation: i64 = row.try_get("requires_confirmation").ok()?;
    let parameters: String = row.try_get("parameters").ok()?;

    Some(Action {
        id: Id::from_str(&id).ok()?,
        threat_id: Id::from_str(&threat_id).ok()?,
        action_type: action_type_from_str(&action_type)?,
        risk_level: risk_level_from_str(&risk_level)?,
        confidence,
        ml_score: row.try_get("ml_score").ok(),
        executed: executed != 0,
        executed_at: row
            .try_get::<Option<String>, _>("executed_at")
            .ok()
            .flatten()
            .and_then(|s| parse_time(&s)),
        success: row.try_get::<Option<i64>, _>("success").ok().flatten().map(|v| v != 0),
        error_message: row.try_get("error_message").ok(),
        parameters: serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&parameters).unwrap_or_default(),
        requires_confirmation: requires_confirmation != 0,
        confirmed_by: row.try_get("confirmed_by").ok(),
        confirmed_at: row
            .try_get::<Option<String>, _>("confirmed_at")
            .ok()
            .flatten()
            .and_then(|s| parse_time(&s)),
    })
}

fn severity_from_str(s: &str) -> Option<Severity> {
    Some(match s {
        "low" => Severity::Low,
        "medium" => Severity::Medium,
        "high" => Severity::High,
        "critical" => Severity::Critical,
        _ => return None,
    })
}

fn threat_type_from_str(s: &str) -> Option<ThreatType> {
    Some(match s {
        "reverse_shell" => ThreatType::ReverseShell,
        "privilege_escalation" => ThreatType::PrivilegeEscalation,
        "unauthorized_access" => ThreatType::UnauthorizedAccess,
        "malicious_process" => ThreatType::MaliciousProcess,
        "network_anomaly" => ThreatType::NetworkAnomaly,
        "file_anomaly" => ThreatType::FileAnomaly,
        "container_escape" => ThreatType::ContainerEscape,
        "unknown" => ThreatType::Unknown,
        _ => return None,
    })
}

fn action_type_from_str(s: &str) -> Option<ActionType> {
    Some(match s {
        "monitor" => ActionType::Monitor,
        "log" => ActionType::Log,
        "alert" => ActionType::Alert,
        "isolate_pod" => ActionType::IsolatePod,
        "terminate_pod" => ActionType::TerminatePod,
        "block_network" => ActionType::BlockNetwork,
        "terminate_process" => ActionType::TerminateProcess,
        "escalate" => ActionType::Escalate,
        _ => return None,
    })
}

fn risk_level_from_str(s: &str) -> Option<RiskLevel> {
    Some(match s {
        "low" => RiskLevel::Low,
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_model::{Id as ModelId, Severity, ThreatSource, ThreatType};
    use serde_json::Value as Json;

    fn tmp_sqlite_url(dir: &tempfile::TempDir) -> String {
        format!("sqlite://{}/sentinel-test.db?mode=rwc", dir.path().display())
    }

    fn sample_threat() -> Threat {
        Threat {
            id: ModelId::new(),
            detected_at: Utc::now(),
            severity: Severity::High,
            threat_type: ThreatType::ReverseShell,
            source: ThreatSource {
                pod: Some("evil-pod".into()),
                namespace: Some("default".into()),
                container: None,
                user: None,
            },
            description: "bash -i".into(),
            detector_output: "bash -i".into(),
            detector_rule: Some("shell".into()),
            detector_priority: Some("Critical".into()),
            ml_score: Some(0.8),
            confidence: 0.7,
            raw_event: Json::Null,
            resolved: false,
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn threat_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::connect(&tmp_sqlite_url(&dir)).await.unwrap();
        let threat = sample_threat();
        let id = threat.id;
        store.add_threat(threat).await;
        let found = store.find_threat(id).await.unwrap();
        assert_eq!(found.source.pod.as_deref(), Some("evil-pod"));
        assert_eq!(found.severity, Severity::High);
        assert_eq!(store.health().degraded_writes, 0);
    }

    #[tokio::test]
    async fn re_adding_a_threat_upserts_rather_than_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::connect(&tmp_sqlite_url(&dir)).await.unwrap();
        let mut threat = sample_threat();
        let id = threat.id;
        store.add_threat(threat.clone()).await;
        threat.ml_score = Some(0.87);
        store.add_threat(threat).await;

        assert_eq!(store.list_threats().await.iter().filter(|t| t.id == id).count(), 1);
        assert_eq!(store.find_threat(id).await.unwrap().ml_score, Some(0.87));
        assert_eq!(store.health().degraded_writes, 0);
    }

    #[tokio::test]
    async fn resolve_persists_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::connect(&tmp_sqlite_url(&dir)).await.unwrap();
        let threat = sample_threat();
        let id = threat.id;
        store.add_threat(threat).await;
        let at = Utc::now();
        store.mark_resolved(id, at).await;
        let found = store.find_threat(id).await.unwrap();
        assert!(found.resolved);
    }
}
