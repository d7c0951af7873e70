//! # orchestra-runtime
//!
//! The concrete backend provider and the side-effecting tools.
//!
//! The provider speaks the OpenAI-compatible chat-completions API, which
//! covers Ollama (`/v1`) and vLLM with one implementation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orchestra_runtime::OpenAiCompatProvider;
//!
//! let provider = OpenAiCompatProvider::from_env()?;
//! let agent = ReactAgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

pub mod fs_tools;
pub mod openai_compat;

pub use fs_tools::{ReadFileTool, WriteFileTool};
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};

// Re-export core types for convenience
pub use orchestra_core::{
    AgentError, LlmProvider, Message, ReactAgent, Result, Role, Tool, ToolRegistry,
};
