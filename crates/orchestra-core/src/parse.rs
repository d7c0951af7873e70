//! ReAct Output Parsing
//!
//! The model is treated as a nondeterministic oracle emitting one of a
//! small set of tagged outcomes. Every turn is expected to follow the
//! text protocol:
//!
//! ```text
//! Thought: <reasoning about what to do next>
//! Act: [TOOL_CALL] {"name": "...", "arguments": {...}}
//!   or:
//! Thought: <reasoning>
//! Answer: <final answer to the user>
//! ```
//!
//! Nothing here trusts free-form structure: tool-call JSON is extracted
//! with a balanced-brace scan so that a model hallucinating a whole
//! multi-round transcript in one turn still yields only its first call.

use std::collections::HashMap;

use crate::tool::ToolCall;

/// Marker the model emits before a tool-call JSON object
pub const TOOL_CALL_TAG: &str = "[TOOL_CALL]";

const THOUGHT_TAG: &str = "Thought:";
const ANSWER_TAG: &str = "Answer:";

/// Strip a reasoning-model `<think>…</think>` preamble.
///
/// Returns the internal thinking (if any) and the visible remainder.
/// This is separate from the ReAct `Thought:` step.
pub fn extract_thinking(text: &str) -> (Option<String>, String) {
    let Some(start) = text.find("<think>") else {
        return (None, text.to_string());
    };
    let Some(end) = text[start..].find("</think>") else {
        return (None, text.to_string());
    };
    let end = start + end;

    let thinking = text[start + "<think>".len()..end].trim().to_string();
    let mut visible = String::with_capacity(text.len());
    visible.push_str(&text[..start]);
    visible.push_str(&text[end + "</think>".len()..]);
    (Some(thinking), visible.trim().to_string())
}

/// Extract the `Thought:` segment from a model turn.
///
/// The thought runs until the following `Act:` or `Answer:` line, or
/// the end of the text. Returns `None` when the model skipped the tag.
pub fn parse_thought(text: &str) -> Option<String> {
    let start = text.find(THOUGHT_TAG)? + THOUGHT_TAG.len();
    let after = &text[start..];

    let end = ["\nAct:", "\nAnswer:"]
        .iter()
        .filter_map(|tag| after.find(tag))
        .min()
        .unwrap_or(after.len());

    let thought = after[..end].trim();
    if thought.is_empty() {
        None
    } else {
        Some(thought.to_string())
    }
}

/// Extract the `Answer:` section (everything after the tag).
pub fn parse_answer(text: &str) -> Option<String> {
    let start = text.find(ANSWER_TAG)? + ANSWER_TAG.len();
    Some(text[start..].trim().to_string())
}

/// Extract the first complete JSON object from text.
///
/// Balanced-brace scan that respects string literals and escapes, so
/// braces inside argument strings don't break extraction and multiple
/// consecutive objects yield only the first.
pub fn extract_first_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(serde::Deserialize)]
struct WireToolCall {
    name: String,
    #[serde(default)]
    arguments: HashMap<String, serde_json::Value>,
}

/// Parse a `[TOOL_CALL] {json}` action from a model turn.
///
/// Returns `None` when there is no tag or the JSON after it is not a
/// valid call object. A fresh call ID is assigned for trace tracking.
pub fn parse_tool_call(text: &str) -> Option<ToolCall> {
    let idx = text.find(TOOL_CALL_TAG)? + TOOL_CALL_TAG.len();
    let json = extract_first_json(&text[idx..])?;
    let wire: WireToolCall = serde_json::from_str(json).ok()?;

    Some(ToolCall {
        name: wire.name,
        arguments: wire.arguments,
        id: Some(uuid::Uuid::new_v4().to_string()),
    })
}

/// Reduce a terminal model turn to just the user-facing answer.
///
/// Strips `<think>` preambles and hallucinated Thought/Act/Observe
/// transcripts: an `Answer:` tag wins, a bare `Thought:` falls back to
/// its content, and plain text passes through unchanged.
pub fn clean_final_answer(text: &str) -> String {
    let (_, visible) = extract_thinking(text);

    if let Some(answer) = parse_answer(&visible) {
        return answer;
    }
    if let Some(thought) = parse_thought(&visible) {
        return thought;
    }
    visible.trim().to_string()
}
