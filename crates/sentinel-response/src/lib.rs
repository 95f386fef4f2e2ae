//! Decides what to do about a scored threat, and carries it out.

mod actuator;
mod decider;
mod orchestrator;

pub use actuator::Actuator;
pub use decider::{Decider, Policy, TablePolicy};
pub use orchestrator::{HttpOrchestrator, Orchestrator, OrchestratorError, SimulatedOrchestrator};
