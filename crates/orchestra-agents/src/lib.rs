//! # orchestra-agents
//!
//! Specialist roles and the orchestrator that coordinates them.
//!
//! The orchestrator receives a user task and:
//! 1. Asks the model to produce a JSON plan with subtasks
//! 2. Delegates each subtask to the right specialist agent
//! 3. Optionally runs a bounded reviewer/correction cycle
//! 4. Merges all results into one final answer
//!
//! The orchestrator never does the work directly; even single-subtask
//! plans are delegated. Specialists are role configurations (system
//! prompt + tool subset) of the one shared `ReactAgent` from
//! `orchestra-core`.

pub mod orchestrator;
pub mod plan;
pub mod roles;
pub mod verdict;

pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorRun, SubtaskResult};
pub use plan::{Plan, Subtask};
pub use roles::SpecialistRole;
pub use verdict::{parse_verdict, Verdict};
