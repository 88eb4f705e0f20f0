//! Application services layer.
//!
//! This module contains the stateful services that turn engine decisions into
//! device commands and own the state shared between cycles.

pub mod action_queue;
pub mod diagnostics;
pub mod orchestrator;
pub mod transition_coordinator;

pub use action_queue::{Action, ActionQueue, WaitCondition};
pub use diagnostics::{DeviceDiagnostics, DiagnosticsReport};
pub use orchestrator::{Orchestrator, OrchestratorDeps, OrchestratorState};
pub use transition_coordinator::{TransitionCoordinator, TransitionPlan};
