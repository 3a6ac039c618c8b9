//! Workflow runtime: structured extraction, progress milestones, per-session
//! command locks and the stage orchestrator.

pub mod extract;
pub mod progress;
pub mod session_lock;
pub mod workflow;

pub use workflow::{Orchestrator, WorkflowCommand, WorkflowEvent};
