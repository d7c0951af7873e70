//! Subtask Plans
//!
//! A plan is produced once per orchestrator invocation by parsing a
//! model-generated JSON response, is always non-empty, and is read-only
//! after creation. When parsing fails even after the corrective retry,
//! `Plan::fallback` assigns the whole task to the General specialist so
//! planning never propagates a parse failure.

use serde::{Deserialize, Serialize};

use orchestra_core::parse::{extract_first_json, extract_thinking};

use crate::roles::SpecialistRole;

/// One planned unit of work, assigned to a specialist
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Position in the plan, 1-based
    pub id: u32,

    /// Assigned specialist
    pub role: SpecialistRole,

    /// Subtask description handed to the specialist
    pub task: String,
}

/// An ordered, non-empty list of subtasks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub subtasks: Vec<Subtask>,
}

#[derive(Deserialize)]
struct WirePlan {
    subtasks: Vec<WireSubtask>,
}

#[derive(Deserialize)]
struct WireSubtask {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    agent: String,
    task: String,
}

impl Plan {
    /// Parse a model response into a plan.
    ///
    /// Tolerates `<think>` preambles and prose around the JSON object.
    /// Returns `None` for malformed JSON, a missing/empty `subtasks`
    /// list, or subtasks without a task description. Unknown specialist
    /// names map to `General`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (_, visible) = extract_thinking(raw);
        let json = extract_first_json(&visible)?;
        let wire: WirePlan = serde_json::from_str(json).ok()?;

        if wire.subtasks.is_empty() {
            return None;
        }

        let subtasks = wire
            .subtasks
            .into_iter()
            .enumerate()
            .map(|(i, st)| Subtask {
                id: if st.id == 0 { i as u32 + 1 } else { st.id },
                role: SpecialistRole::from_name(&st.agent),
                task: st.task,
            })
            .collect();

        Some(Self { subtasks })
    }

    /// The guaranteed-valid plan: the entire task goes to General.
    pub fn fallback(task: &str) -> Self {
        Self {
            subtasks: vec![Subtask {
                id: 1,
                role: SpecialistRole::General,
                task: task.to_string(),
            }],
        }
    }

    /// Number of subtasks (always at least 1)
    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    /// A plan is never empty; kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_plan_parses() {
        let raw = r#"{"subtasks": [{"id": 1, "agent": "researcher", "task": "Find info"}, {"id": 2, "agent": "coder", "task": "Write code"}]}"#;
        let plan = Plan::parse(raw).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.subtasks[0].role, SpecialistRole::Researcher);
        assert_eq!(plan.subtasks[1].role, SpecialistRole::Coder);
    }

    #[test]
    fn single_subtask_plan_parses() {
        let raw = r#"{"subtasks": [{"id": 1, "agent": "general", "task": "Answer directly"}]}"#;
        let plan = Plan::parse(raw).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.subtasks[0].role, SpecialistRole::General);
    }

    #[test]
    fn plan_with_think_preamble_parses() {
        let raw = "<think>Let me analyze this task and decide how to split it...</think>\n\
                   {\"subtasks\": [{\"id\": 1, \"agent\": \"researcher\", \"task\": \"Look up data\"}]}";
        let plan = Plan::parse(raw).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.subtasks[0].role, SpecialistRole::Researcher);
    }

    #[test]
    fn plan_with_surrounding_prose_parses() {
        let raw = "Here is my plan:\n\
                   {\"subtasks\": [{\"id\": 1, \"agent\": \"coder\", \"task\": \"Write a script\"}]}\n\
                   I hope this helps.";
        let plan = Plan::parse(raw).unwrap();
        assert_eq!(plan.subtasks[0].role, SpecialistRole::Coder);
    }

    #[test]
    fn invalid_json_returns_none() {
        assert!(Plan::parse(r#"{"subtasks": [{"id": 1, "agent": "researcher" BROKEN"#).is_none());
    }

    #[test]
    fn missing_subtasks_key_returns_none() {
        assert!(Plan::parse(r#"{"tasks": [{"id": 1, "agent": "researcher", "task": "x"}]}"#).is_none());
    }

    #[test]
    fn empty_subtasks_returns_none() {
        assert!(Plan::parse(r#"{"subtasks": []}"#).is_none());
    }

    #[test]
    fn prose_without_json_returns_none() {
        assert!(Plan::parse("I think we should research this topic and then write some code.").is_none());
    }

    #[test]
    fn unknown_agent_maps_to_general() {
        let raw = r#"{"subtasks": [{"id": 1, "agent": "astrologer", "task": "Guess"}]}"#;
        let plan = Plan::parse(raw).unwrap();
        assert_eq!(plan.subtasks[0].role, SpecialistRole::General);
    }

    #[test]
    fn missing_ids_are_assigned_in_order() {
        let raw = r#"{"subtasks": [{"agent": "researcher", "task": "a"}, {"agent": "coder", "task": "b"}]}"#;
        let plan = Plan::parse(raw).unwrap();
        assert_eq!(plan.subtasks[0].id, 1);
        assert_eq!(plan.subtasks[1].id, 2);
    }

    #[test]
    fn fallback_is_single_general_subtask() {
        let plan = Plan::fallback("do the thing");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.subtasks[0].role, SpecialistRole::General);
        assert_eq!(plan.subtasks[0].task, "do the thing");
        assert_eq!(plan.subtasks[0].id, 1);
    }
}
