//! Run Traces
//!
//! The ordered log of Thought/Act/Observe steps produced by one agent
//! run. A trace is owned exclusively by the agent instance that
//! produced it, append-only while the run is live, and read-only once
//! the run finishes. Everything is serde-serializable so hosts can
//! persist traces to append-only log storage keyed by run ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{ToolCall, ToolResult};

/// Unique run identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded ReAct step.
///
/// A `ToolCall` step pairs an Act with its Observe; the terminal
/// `FinalAnswer` step is a Thought with no Act/Observe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceStep {
    /// Act + Observe pair for one round
    ToolCall {
        round: usize,
        thought: Option<String>,
        call: ToolCall,
        result: ToolResult,
        /// Raw model output for the round, kept for debugging
        raw: String,
    },
    /// Terminal step: the final-answer declaration
    FinalAnswer {
        round: usize,
        thought: Option<String>,
        answer: String,
        raw: String,
    },
}

impl TraceStep {
    pub fn round(&self) -> usize {
        match self {
            TraceStep::ToolCall { round, .. } | TraceStep::FinalAnswer { round, .. } => *round,
        }
    }
}

/// The full trace of one agent run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    /// Unique run identifier
    pub run_id: RunId,

    /// Name of the agent that produced this trace
    pub agent: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Ordered steps, strictly by round
    pub steps: Vec<TraceStep>,
}

impl RunTrace {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            agent: agent.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    /// Append a step. Steps are never mutated after append.
    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    /// Number of recorded rounds
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Trace store trait for persistence
pub trait TraceStore: Send + Sync {
    /// Save a finished trace
    fn save(&self, trace: &RunTrace) -> crate::Result<()>;

    /// Load a trace by run ID
    fn load(&self, id: &RunId) -> crate::Result<Option<RunTrace>>;

    /// Delete a trace
    fn delete(&self, id: &RunId) -> crate::Result<()>;

    /// List traces for an agent, most recent first
    fn list(&self, agent: Option<&str>, limit: usize) -> crate::Result<Vec<RunTrace>>;
}

/// In-memory trace store (for development/testing)
pub struct MemoryTraceStore {
    traces: std::sync::RwLock<std::collections::HashMap<RunId, RunTrace>>,
}

impl Default for MemoryTraceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTraceStore {
    pub fn new() -> Self {
        Self {
            traces: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl TraceStore for MemoryTraceStore {
    fn save(&self, trace: &RunTrace) -> crate::Result<()> {
        let mut traces = self
            .traces
            .write()
            .map_err(|e| crate::AgentError::Other(e.to_string()))?;
        traces.insert(trace.run_id.clone(), trace.clone());
        Ok(())
    }

    fn load(&self, id: &RunId) -> crate::Result<Option<RunTrace>> {
        let traces = self
            .traces
            .read()
            .map_err(|e| crate::AgentError::Other(e.to_string()))?;
        Ok(traces.get(id).cloned())
    }

    fn delete(&self, id: &RunId) -> crate::Result<()> {
        let mut traces = self
            .traces
            .write()
            .map_err(|e| crate::AgentError::Other(e.to_string()))?;
        traces.remove(id);
        Ok(())
    }

    fn list(&self, agent: Option<&str>, limit: usize) -> crate::Result<Vec<RunTrace>> {
        let traces = self
            .traces
            .read()
            .map_err(|e| crate::AgentError::Other(e.to_string()))?;
        let mut result: Vec<_> = traces
            .values()
            .filter(|t| agent.is_none_or(|a| t.agent == a))
            .cloned()
            .collect();

        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result.truncate(limit);

        Ok(result)
    }
}
