//! Orchestrator
//!
//! Coordinates one task end to end: plan, delegate, optionally review,
//! merge. The orchestrator only plans and merges through the model; the
//! actual work always goes to a specialist `ReactAgent`.
//!
//! Error policy: only unrecoverable transport failure (after the
//! provider's own retries) propagates as `Err`. Plan-parse failure
//! falls back to a single General subtask, truncated agent runs stay
//! valid merge input, and review exhaustion marks the result
//! unresolved instead of failing.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use orchestra_core::{
    parse::extract_thinking, AgentConfig, Conversation, GenerationOptions, LlmProvider, Message,
    ReactAgent, Result, RunOutcome, ToolRegistry,
};

use crate::plan::{Plan, Subtask};
use crate::roles::SpecialistRole;
use crate::verdict::{parse_verdict, Verdict};

const PLAN_PROMPT: &str = "\
You are an Orchestrator. Your job is to break a user's task into subtasks and assign each to the right specialist agent.

Available agents:
- researcher: Finds and summarizes information. Has tools: read_file.
- coder: Writes and saves code. Has tools: write_file, read_file.
- general: Handles any task that does not clearly fit researcher or coder.

RULES:
1. Analyze the user's task and decide what subtasks are needed.
2. Output a JSON plan — ONLY the JSON, nothing else.
3. Each subtask must have: \"id\" (number), \"agent\" (string), \"task\" (string).
4. Subtasks run in order. Later subtasks can say \"using the result from subtask 1\".
5. Use the fewest subtasks necessary. Simple tasks may need only 1.
6. If the task is a simple question you can answer directly, use one subtask with agent \"general\".

OUTPUT FORMAT (JSON only, no markdown, no explanation):
{
  \"subtasks\": [
    {\"id\": 1, \"agent\": \"researcher\", \"task\": \"Find information about X\"},
    {\"id\": 2, \"agent\": \"coder\", \"task\": \"Using the research results, write code to do Y\"}
  ]
}";

const PLAN_RETRY_PROMPT: &str = "\
That was not a valid JSON plan. Respond with ONLY the JSON object in the required \
format — no prose, no markdown fences, no explanation.";

const MERGE_SYSTEM_PROMPT: &str =
    "You merge specialist results into a clear final answer.";

/// Orchestrator configuration
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Round limit passed to each specialist agent
    pub max_rounds: usize,

    /// Correction rounds allowed per reviewed result before it is
    /// accepted as unresolved
    pub correction_rounds: usize,

    /// Upper bound on concurrently running subtasks. At 1 (the
    /// default) subtasks run in plan order and later subtasks receive
    /// context from earlier results; above 1 they run independently.
    pub max_concurrency: usize,

    /// Whether to run the reviewer cycle over specialist results
    pub review: bool,

    /// Generation options for specialist agents
    pub generation: GenerationOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            correction_rounds: 2,
            max_concurrency: 1,
            review: false,
            generation: GenerationOptions::default(),
        }
    }
}

/// One delegated subtask and what came back
#[derive(Clone, Debug)]
pub struct SubtaskResult {
    /// The planned subtask
    pub subtask: Subtask,

    /// The specialist's outcome (possibly truncated)
    pub outcome: RunOutcome,

    /// Set when the review cycle exhausted its correction rounds
    /// without a PASS
    pub unresolved: bool,
}

/// Everything one orchestrator invocation produced, for trace
/// persistence and inspection
#[derive(Clone, Debug)]
pub struct OrchestratorRun {
    /// The plan that was executed (post-fallback if parsing failed)
    pub plan: Plan,

    /// Per-subtask results in plan order
    pub results: Vec<SubtaskResult>,

    /// The merged final answer
    pub answer: String,
}

/// The coordinating agent: plans, delegates, merges
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, OrchestratorConfig::default())
    }

    /// Handle one task end to end and return the final answer.
    pub async fn handle(&self, task: &str) -> Result<String> {
        Ok(self.run(task).await?.answer)
    }

    /// Handle one task end to end, returning the plan and per-subtask
    /// results along with the answer.
    pub async fn run(&self, task: &str) -> Result<OrchestratorRun> {
        tracing::info!(task, "orchestrator started");

        let plan = self.plan(task).await?;
        tracing::info!(subtasks = plan.len(), "plan ready");

        let mut results = self.delegate(&plan).await?;

        if self.config.review {
            self.review(&mut results).await?;
        }

        let answer = if results.len() == 1 && !results[0].unresolved {
            // Single subtask: no synthesis needed
            results[0].outcome.answer.clone()
        } else {
            self.merge(task, &results).await?
        };

        tracing::info!("orchestrator finished");
        Ok(OrchestratorRun {
            plan,
            results,
            answer,
        })
    }

    /// Plan stage. Always returns a valid, non-empty plan: a malformed
    /// model response gets one corrective retry, then the fallback
    /// single-General plan. Only transport failure propagates.
    pub async fn plan(&self, task: &str) -> Result<Plan> {
        let options = self.config.generation.clone().with_temperature(0.3);

        let mut conversation = Conversation::with_system_prompt(PLAN_PROMPT);
        conversation.push(Message::user(task));

        let first = self
            .provider
            .complete(conversation.messages(), &options)
            .await?;
        if let Some(plan) = Plan::parse(&first.content) {
            return Ok(plan);
        }

        tracing::warn!("plan response was not parseable, retrying with corrective instruction");
        conversation.push(Message::assistant(&first.content));
        conversation.push(Message::user(PLAN_RETRY_PROMPT));

        let second = self
            .provider
            .complete(conversation.messages(), &options)
            .await?;
        if let Some(plan) = Plan::parse(&second.content) {
            return Ok(plan);
        }

        tracing::warn!("plan retry also failed, falling back to a single general subtask");
        Ok(Plan::fallback(task))
    }

    /// Delegate stage. Results always come back in plan order, even
    /// when subtasks complete out of order under parallel dispatch.
    async fn delegate(&self, plan: &Plan) -> Result<Vec<SubtaskResult>> {
        if self.config.max_concurrency > 1 {
            return self.delegate_parallel(plan).await;
        }

        let mut results: Vec<SubtaskResult> = Vec::with_capacity(plan.len());

        for subtask in &plan.subtasks {
            let task_text = if results.is_empty() {
                subtask.task.clone()
            } else {
                format!(
                    "{}\n\nContext from previous subtasks:\n{}",
                    subtask.task,
                    build_context(&results)
                )
            };

            tracing::info!(id = subtask.id, role = %subtask.role, "delegating subtask");
            let agent = self.specialist(subtask.role, subtask.id);
            let outcome = agent.run(&task_text).await?;

            results.push(SubtaskResult {
                subtask: subtask.clone(),
                outcome,
                unresolved: false,
            });
        }

        Ok(results)
    }

    /// Bounded parallel dispatch. Subtasks are independent in this
    /// mode (no context threading); completion order is discarded by
    /// re-sorting on plan index.
    async fn delegate_parallel(&self, plan: &Plan) -> Result<Vec<SubtaskResult>> {
        let mut indexed: Vec<(usize, Result<SubtaskResult>)> =
            stream::iter(plan.subtasks.iter().cloned().enumerate().map(|(i, subtask)| {
                let agent = self.specialist(subtask.role, subtask.id);
                async move {
                    tracing::info!(id = subtask.id, role = %subtask.role, "delegating subtask");
                    let outcome = agent.run(&subtask.task).await;
                    (
                        i,
                        outcome.map(|outcome| SubtaskResult {
                            subtask,
                            outcome,
                            unresolved: false,
                        }),
                    )
                }
            }))
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, r)| r).collect()
    }

    /// Review stage: a reviewer agent evaluates each result, feedback
    /// re-runs the originating specialist, bounded by
    /// `correction_rounds`. An exhausted cycle accepts the last result
    /// and marks it unresolved.
    async fn review(&self, results: &mut [SubtaskResult]) -> Result<()> {
        for result in results.iter_mut() {
            let mut corrections = 0;

            loop {
                let reviewer = self.specialist(SpecialistRole::Reviewer, result.subtask.id);
                let review_input = format!(
                    "Original task:\n{}\n\nResult produced by the {} specialist:\n{}",
                    result.subtask.task, result.subtask.role, result.outcome.answer
                );
                let review = reviewer.run(&review_input).await?;

                match parse_verdict(&review.answer) {
                    Verdict::Pass => {
                        tracing::info!(id = result.subtask.id, "review passed");
                        break;
                    }
                    Verdict::Feedback(feedback) => {
                        if corrections >= self.config.correction_rounds {
                            tracing::warn!(
                                id = result.subtask.id,
                                "correction rounds exhausted, accepting result as unresolved"
                            );
                            result.unresolved = true;
                            break;
                        }
                        corrections += 1;
                        tracing::info!(
                            id = result.subtask.id,
                            round = corrections,
                            "reviewer feedback, re-running specialist"
                        );

                        let retry_task = format!(
                            "{}\n\nA reviewer flagged issues with your previous attempt:\n{}\n\n\
                             Address the feedback and redo the task.",
                            result.subtask.task, feedback
                        );
                        let agent = self.specialist(result.subtask.role, result.subtask.id);
                        result.outcome = agent.run(&retry_task).await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Merge stage: one non-looping synthesis call over all results,
    /// in plan order.
    async fn merge(&self, task: &str, results: &[SubtaskResult]) -> Result<String> {
        let mut results_text = String::new();
        for r in results {
            results_text.push_str(&format!(
                "--- Subtask {} ({}) ---\n",
                r.subtask.id, r.subtask.role
            ));
            results_text.push_str(&format!("Task: {}\n", r.subtask.task));
            if r.outcome.truncated {
                results_text.push_str("(note: this result was cut off at the round limit)\n");
            }
            if r.unresolved {
                results_text.push_str("(note: reviewer feedback on this result is unresolved)\n");
            }
            results_text.push_str(&format!("Result:\n{}\n\n", r.outcome.answer));
        }

        let merge_prompt = format!(
            "The user's original task was:\n{task}\n\n\
             Here are the results from each subtask:\n\n{results_text}\
             Your job: Combine these results into one clear, complete final answer for the user.\n\
             - Do NOT repeat the subtask structure, just give the final answer.\n\
             - If a subtask was cut off or unresolved, mention it briefly.\n\
             - Be direct and concise."
        );

        let mut conversation = Conversation::with_system_prompt(MERGE_SYSTEM_PROMPT);
        conversation.push(Message::user(merge_prompt));

        let options = self.config.generation.clone().with_temperature(0.3);
        let merged = self
            .provider
            .complete(conversation.messages(), &options)
            .await?;

        let (_, visible) = extract_thinking(&merged.content);
        Ok(visible)
    }

    /// Build the named specialist: one shared `ReactAgent`
    /// implementation configured with the role's prompt and tool
    /// subset.
    fn specialist(&self, role: SpecialistRole, subtask_id: u32) -> ReactAgent {
        let tools = match role.tool_names() {
            Some(names) => Arc::new(self.tools.subset(names)),
            None => Arc::clone(&self.tools),
        };

        ReactAgent::new(
            Arc::clone(&self.provider),
            tools,
            AgentConfig {
                name: format!("{}_{}", role.title(), subtask_id),
                system_prompt: role.system_prompt().to_string(),
                max_rounds: self.config.max_rounds,
                generation: self.config.generation.clone(),
                ..AgentConfig::default()
            },
        )
    }
}

/// Context block carried into later subtasks under sequential
/// delegation. Each earlier result is truncated to keep prompts
/// manageable.
fn build_context(results: &[SubtaskResult]) -> String {
    let mut lines = Vec::new();
    for r in results {
        lines.push(format!("[Subtask {} — {}]", r.subtask.id, r.subtask.role));
        lines.push(truncate_chars(&r.outcome.answer, 500));
        lines.push(String::new());
    }
    lines.join("\n")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
