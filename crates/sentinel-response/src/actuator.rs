//! Executes a decided [`Action`] against the orchestrator, or against
//! nothing at all for purely local actions.

use crate::orchestrator::Orchestrator;
use chrono::Utc;
use sentinel_model::{Action, ActionType, Threat};

pub struct Actuator {
    orchestrator: Box<dyn Orchestrator>,
    simulated: bool,
}

impl Actuator {
    pub fn new(orchestrator: Box<dyn Orchestrator>) -> Self {
        Actuator {
            orchestrator,
            simulated: false,
        }
    }

    /// Probes the orchestrator once and falls back to simulation if
    /// it isn't reachable, logging which mode was chosen.
    pub async fn discover(real: Box<dyn Orchestrator>) -> Self {
        if real.ping().await {
            tracing::info!("orchestrator reachable, actuator running live");
            Actuator::new(real)
        } else {
            tracing::warn!("orchestrator unreachable, actuator running in simulated mode");
            let mut actuator = Actuator::new(Box::new(crate::orchestrator::SimulatedOrchestrator));
            actuator.simulated = true;
            actuator
        }
    }

    /// Builds an actuator running against `SimulatedOrchestrator`,
    /// explicitly marked as simulated for `/health` reporting.
    pub fn simulated() -> Self {
        Actuator {
            orchestrator: Box::new(crate::orchestrator::SimulatedOrchestrator),
            simulated: true,
        }
    }

    /// Whether this actuator is running against `SimulatedOrchestrator`
    /// rather than a real control plane; surfaced by `/health`.
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Executes `action` in place. If the action requires
    /// confirmation it is left unexecuted (`executed = false`,
    /// `success = None`) and nothing below is dispatched — the
    /// confirmation path is handled entirely by the Read API.
    pub async fn execute(&self, action: &mut Action, threat: &Threat) {
        action.executed_at = Some(Utc::now());

        if action.requires_confirmation {
            tracing::warn!(
                action_type = %action.action_type,
                risk_level = ?action.risk_level,
                "action requires confirmation before execution"
            );
            action.executed = false;
            action.success = None;
            return;
        }

        let result = self.dispatch(action.action_type, threat).await;
        action.executed = true;
        match result {
            Ok(success) => action.success = Some(success),
            Err(message) => {
                action.success = Some(false);
                action.error_message = Some(message);
            }
        }
    }

    async fn dispatch(&self, action_type: ActionType, threat: &Threat) -> Result<bool, String> {
        let namespace = threat.source.namespace.as_deref().unwrap_or("default");
        match action_type {
            ActionType::TerminatePod => {
                let pod = threat.source.pod.as_deref().ok_or("threat has no source pod")?;
                self.orchestrator
                    .delete_pod(namespace, pod, 0)
                    .await
                    .map(|_| true)
                    .map_err(|e| e.to_string())
            }
            ActionType::IsolatePod => {
                let pod = threat.source.pod.as_deref().ok_or("threat has no source pod")?;
                self.orchestrator
                    .isolate_pod(namespace, pod)
                    .await
                    .map(|_| true)
                    .map_err(|e| e.to_string())
            }
            ActionType::Alert => {
                tracing::warn!(severity = %threat.severity, description = %threat.broadcast_summary(), "ALERT");
                Ok(true)
            }
            ActionType::Log => {
                tracing::info!(threat_type = %threat.threat_type, pod = threat.source.pod.as_deref().unwrap_or("-"), "threat logged");
                Ok(true)
            }
            // Monitor and the escalation-path actions never reach the
            // orchestrator today; they succeed locally.
            ActionType::Monitor | ActionType::BlockNetwork | ActionType::TerminateProcess | ActionType::Escalate => {
                Ok(true)
            }
        }
    }
}
