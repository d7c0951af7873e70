//! Specialist Roles
//!
//! A specialist is a fixed role configuration: a system prompt plus an
//! advisory tool subset. Roles form a closed enumeration known to the
//! orchestrator; unknown role names coming back from the planner fall
//! back to `General` rather than failing the plan.

use serde::{Deserialize, Serialize};

/// The fixed set of specialist roles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistRole {
    /// Finds, reads, and summarizes information
    Researcher,
    /// Writes and saves code
    Coder,
    /// Fallback for tasks that fit no other role; gets every tool
    General,
    /// Evaluates other specialists' output, returns a verdict
    Reviewer,
}

impl SpecialistRole {
    /// Parse a role name, falling back to `General` for anything
    /// the planner invents.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "researcher" => Self::Researcher,
            "coder" => Self::Coder,
            "reviewer" => Self::Reviewer,
            _ => Self::General,
        }
    }

    /// Lowercase role identifier
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Researcher => "researcher",
            Self::Coder => "coder",
            Self::General => "general",
            Self::Reviewer => "reviewer",
        }
    }

    /// Capitalized name used in agent naming ("Researcher_1")
    pub fn title(self) -> &'static str {
        match self {
            Self::Researcher => "Researcher",
            Self::Coder => "Coder",
            Self::General => "General",
            Self::Reviewer => "Reviewer",
        }
    }

    /// The role's system prompt
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::Researcher => RESEARCHER_PROMPT,
            Self::Coder => CODER_PROMPT,
            Self::General => GENERAL_PROMPT,
            Self::Reviewer => REVIEWER_PROMPT,
        }
    }

    /// The role's tool subset; `None` means the full registry
    pub fn tool_names(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Researcher => Some(&["read_file"]),
            Self::Coder => Some(&["write_file", "read_file"]),
            Self::General => None,
            Self::Reviewer => Some(&["read_file", "calculate"]),
        }
    }
}

impl std::fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const RESEARCHER_PROMPT: &str = "\
You are a Research Specialist. Your job is to find and summarize information.

You are thorough and accurate. When given a research task:
1. Think about what information you need
2. Use your tools to find it
3. If one source is not enough, look again from a different angle
4. Summarize your findings clearly with key facts

When you have gathered enough information, provide a clear summary as your Answer.
Do NOT make up information. If you cannot find something, say so.";

const CODER_PROMPT: &str = "\
You are a Code Specialist. Your job is to write clean, working code.

When given a coding task:
1. Think about the approach before writing code
2. Write clean, correct code with the edge cases handled
3. If asked to save code to a file, use write_file
4. If you need existing code as context, use read_file

Include the complete code in your Answer, along with a short explanation
of how it works.";

const GENERAL_PROMPT: &str = "\
You are a helpful general-purpose assistant.
Answer the user's question clearly and directly.
Use tools if needed, or answer from your knowledge if you can.";

const REVIEWER_PROMPT: &str = "\
You are a Review Specialist. Your job is to check the quality of work done by other agents.

You will receive:
- The original task that was assigned
- The result produced by another agent

Your job is to evaluate the result and return a verdict.

EVALUATION CRITERIA:
1. Does the result actually address the original task?
2. Is the information accurate and complete?
3. If a file was written: use read_file to verify its contents.
4. Are there obvious errors, gaps, or missing pieces?

RESPONSE FORMAT — you MUST end your Answer with one of these two formats:

If the result is good:
VERDICT: PASS

If the result has issues that need fixing:
VERDICT: FEEDBACK
- Issue 1: <specific description of the problem>
- Issue 2: <specific description of another problem>

RULES:
- Be specific in your feedback — vague comments are not useful.
- Only flag real problems, not style preferences.
- If the result is truncated or an error message, return FEEDBACK suggesting a retry.
- Use tools to verify when possible rather than guessing.
- Do NOT rewrite or fix the work yourself. Just identify what needs fixing.";
