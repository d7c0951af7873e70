//! # orchestra-core
//!
//! Core logic for a multi-agent ReAct system: the bounded
//! Thought → Act → Observe loop, the tool registry it dispatches
//! through, and the provider abstraction it talks to.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ReactAgent                              │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   ReAct     │  │    Tool     │  │   LlmProvider       │  │
//! │  │   Loop      │──│   Registry  │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The agent performs no network or filesystem I/O itself; every
//! side effect goes through `LlmProvider` or a registered `Tool`.
//! The loop structure is deterministic given the sequence of model
//! responses; the model is the only nondeterministic collaborator.
//!
//! Tool calling is text-protocol based: the model emits
//! `Act: [TOOL_CALL] {json}` lines that `parse` extracts. This works
//! with any chat model, no native function-calling support needed.

pub mod error;
pub mod message;
pub mod parse;
pub mod provider;
pub mod react;
pub mod tool;
pub mod trace;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use react::{AgentConfig, ReactAgent, ReactAgentBuilder, RunOutcome};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
pub use trace::{RunId, RunTrace, TraceStep, TraceStore};
