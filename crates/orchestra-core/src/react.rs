//! ReAct Reasoning Loop
//!
//! Drives a single bounded Thought → Act → Observe cycle for one task.
//! The loop is a state machine over classified model output: a turn is
//! either a tool call, a final answer, or unparseable (treated as a
//! final answer, matching how small local models actually behave).
//!
//! Round exhaustion and repeated tool failure are policy outcomes, not
//! errors: both return a `RunOutcome` marked truncated so the
//! orchestrator can still merge the partial answer.

use std::sync::Arc;

use crate::error::Result;
use crate::message::{Conversation, Message};
use crate::parse::{self, TOOL_CALL_TAG};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolRegistry, ToolResult};
use crate::trace::{RunTrace, TraceStep};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Agent name, recorded on the trace
    pub name: String,

    /// Role system prompt (before tool instructions are appended)
    pub system_prompt: String,

    /// Maximum reasoning rounds before returning a truncated result
    pub max_rounds: usize,

    /// Consecutive identical tool failures tolerated before the agent
    /// abandons that path and truncates
    pub repeat_failure_limit: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Agent".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_rounds: 10,
            repeat_failure_limit: 3,
            generation: GenerationOptions::default(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools.\n\
Always think step by step before acting. After gathering all information you need,\n\
give a clear, direct final answer.";

/// Outcome of one agent run.
///
/// `truncated` marks round-limit or repeated-failure cutoffs; the
/// answer is still the best available partial result and remains valid
/// input for merging.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    /// Final (or best partial) answer text
    pub answer: String,

    /// Whether the run was cut off before a final-answer declaration
    pub truncated: bool,

    /// The full Thought/Act/Observe trace
    pub trace: RunTrace,
}

/// Build the full system prompt: the role prompt plus the ReAct format
/// contract and the plain-text tool descriptions.
pub fn build_system_prompt(base: &str, tools: &ToolRegistry) -> String {
    if tools.is_empty() {
        return base.to_string();
    }

    format!(
        r#"{base}

You have access to the following tools:

{tool_desc}
YOU MUST ALWAYS FOLLOW THIS FORMAT:

1. ALWAYS start with a Thought — reason about what you know and what you need.
2. Then EITHER use a tool OR give your final answer.

FORMAT WHEN USING A TOOL:
Thought: <your reasoning about what to do next>
Act: [TOOL_CALL] {{"name": "tool_name", "arguments": {{"arg1": "value1"}}}}

FORMAT WHEN GIVING YOUR FINAL ANSWER (no more tools needed):
Thought: <your reasoning about why you are done>
Answer: <your final answer to the user>

RULES:
- Every response MUST start with "Thought:"
- After Act, STOP. Do not write anything after [TOOL_CALL]. Wait for the result.
- You will receive tool results as: Observe: <result>
- After Observe, start your next Thought.
- Only call ONE tool at a time.
- The JSON after [TOOL_CALL] must be valid JSON on a single line.
- If you do NOT need any tools, go straight to Thought + Answer.
- Always end with "Answer:" when you have your final response."#,
        base = base,
        tool_desc = tools.prompt_section(),
    )
}

/// A role-configured ReAct agent.
///
/// Specialists are distinct configurations (system prompt + tool
/// subset) of this one implementation; there is no subclassing.
pub struct ReactAgent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl ReactAgent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Run the bounded reasoning loop on one task.
    ///
    /// Only transport failure (after the provider's own retries)
    /// returns `Err`; every other condition resolves to a `RunOutcome`.
    pub async fn run(&self, task: &str) -> Result<RunOutcome> {
        let mut conversation =
            Conversation::with_system_prompt(build_system_prompt(&self.config.system_prompt, &self.tools));
        conversation.push(Message::user(task));

        let mut trace = RunTrace::new(&self.config.name);
        let mut last_visible = String::new();
        // (tool name + failure output, consecutive count)
        let mut repeated_failure: Option<(String, usize)> = None;

        tracing::debug!(agent = %self.config.name, task, "agent run started");

        for round in 1..=self.config.max_rounds {
            conversation.truncate_to_fit();

            let completion = self
                .provider
                .complete(conversation.messages(), &self.config.generation)
                .await?;

            let raw = completion.content;
            let (thinking, visible) = parse::extract_thinking(&raw);
            if let Some(thinking) = &thinking {
                tracing::debug!(agent = %self.config.name, chars = thinking.len(), "model internal thinking");
            }

            let thought = parse::parse_thought(&visible);
            if let Some(thought) = &thought {
                tracing::debug!(agent = %self.config.name, round, %thought);
            }

            // Final answer declaration, unless a tool call is also pending
            if let Some(answer) = parse::parse_answer(&visible) {
                if !visible.contains(TOOL_CALL_TAG) {
                    trace.push(TraceStep::FinalAnswer {
                        round,
                        thought,
                        answer: answer.clone(),
                        raw,
                    });
                    return Ok(RunOutcome {
                        answer,
                        truncated: false,
                        trace,
                    });
                }
            }

            let Some(call) = parse::parse_tool_call(&visible) else {
                // Neither an Answer tag nor a tool call: treat the whole
                // response as the final answer rather than erroring out.
                let answer = parse::clean_final_answer(&visible);
                trace.push(TraceStep::FinalAnswer {
                    round,
                    thought,
                    answer: answer.clone(),
                    raw,
                });
                return Ok(RunOutcome {
                    answer,
                    truncated: false,
                    trace,
                });
            };

            tracing::debug!(agent = %self.config.name, round, tool = %call.name, "dispatching tool");
            let result = self.tools.dispatch(&call).await;

            let abandoned = if result.success {
                repeated_failure = None;
                false
            } else {
                let key = format!("{}\u{1f}{}", call.name, result.output);
                let count = match &mut repeated_failure {
                    Some((seen, count)) if *seen == key => {
                        *count += 1;
                        *count
                    }
                    slot => {
                        *slot = Some((key, 1));
                        1
                    }
                };
                count >= self.config.repeat_failure_limit
            };

            let observation = if result.success {
                result.output.clone()
            } else {
                format!("Error: {}", result.output)
            };

            conversation.push(Message::assistant(&visible));
            conversation.push(Message::tool(
                format!("Observe: {observation}"),
                call.id.clone(),
            ));

            trace.push(TraceStep::ToolCall {
                round,
                thought,
                call,
                result,
                raw,
            });

            if abandoned {
                tracing::warn!(agent = %self.config.name, round, "same tool failing repeatedly, abandoning run");
                return Ok(RunOutcome {
                    answer: parse::clean_final_answer(&visible),
                    truncated: true,
                    trace,
                });
            }

            last_visible = visible;
        }

        // Round limit reached without a final answer. Return the last
        // model response as the best available partial answer.
        tracing::warn!(agent = %self.config.name, max_rounds = self.config.max_rounds, "round limit reached");
        Ok(RunOutcome {
            answer: parse::clean_final_answer(&last_visible),
            truncated: true,
            trace,
        })
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for agent configuration
pub struct ReactAgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for ReactAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactAgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn max_rounds(mut self, max: usize) -> Self {
        self.config.max_rounds = max;
        self
    }

    pub fn build(self) -> Result<ReactAgent> {
        let provider = self
            .provider
            .ok_or_else(|| crate::AgentError::Config("Provider is required".into()))?;

        Ok(ReactAgent::new(provider, Arc::new(self.tools), self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, ModelInfo};
    use crate::tool::{CalculatorTool, ClockTool};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider fake that replays a fixed script of responses
    struct ScriptedProvider {
        responses: Mutex<VecDeque<String>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|s| (*s).to_string()).collect()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            options: &GenerationOptions,
        ) -> Result<Completion> {
            *self.calls.lock().unwrap() += 1;
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted provider ran out of responses");
            Ok(Completion {
                content,
                model: options.model.clone(),
                usage: None,
                finish_reason: None,
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    fn agent_with(provider: Arc<dyn LlmProvider>, max_rounds: usize) -> ReactAgent {
        ReactAgentBuilder::new()
            .provider(provider)
            .tool(CalculatorTool)
            .tool(ClockTool)
            .name("TestAgent")
            .max_rounds(max_rounds)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn zero_rounds_returns_truncated_with_empty_trace() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let agent = agent_with(provider.clone(), 0);

        let outcome = agent.run("anything").await.unwrap();
        assert!(outcome.truncated);
        assert!(outcome.answer.is_empty());
        assert!(outcome.trace.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn immediate_answer_has_single_thought_step() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "Thought: The user asked a simple question.\nAnswer: Paris.",
        ]));
        let agent = agent_with(provider, 10);

        let outcome = agent.run("capital of France?").await.unwrap();
        assert!(!outcome.truncated);
        assert_eq!(outcome.answer, "Paris.");
        assert_eq!(outcome.trace.len(), 1);
        assert!(matches!(
            &outcome.trace.steps[0],
            TraceStep::FinalAnswer { round: 1, thought: Some(_), .. }
        ));
    }

    #[tokio::test]
    async fn calculator_and_clock_scenario() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "Thought: First the multiplication.\n\
             Act: [TOOL_CALL] {\"name\": \"calculate\", \"arguments\": {\"expression\": \"157*23\"}}",
            "Thought: Now the current time.\n\
             Act: [TOOL_CALL] {\"name\": \"clock\", \"arguments\": {\"format\": \"iso\"}}",
            "Thought: I have both pieces.\n\
             Answer: 157 multiplied by 23 is 3611, and the current time is shown above.",
        ]));
        let agent = agent_with(provider, 10);

        let outcome = agent.run("What is 157 multiplied by 23, and what time is it?").await.unwrap();
        assert!(!outcome.truncated);
        assert!(outcome.answer.contains("3611"));
        assert_eq!(outcome.trace.len(), 3);

        let TraceStep::ToolCall { call, result, .. } = &outcome.trace.steps[0] else {
            panic!("expected tool call step");
        };
        assert_eq!(call.name, "calculate");
        assert_eq!(call.arguments["expression"], "157*23");
        assert!(result.success);
        assert!(result.output.contains("3611"));

        let TraceStep::ToolCall { call, result, .. } = &outcome.trace.steps[1] else {
            panic!("expected tool call step");
        };
        assert_eq!(call.name, "clock");
        assert!(result.success);

        assert!(matches!(&outcome.trace.steps[2], TraceStep::FinalAnswer { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_feeds_error_back_for_self_correction() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "Thought: I'll try a tool that doesn't exist.\n\
             Act: [TOOL_CALL] {\"name\": \"teleport\", \"arguments\": {}}",
            "Thought: That tool is unavailable, I'll answer directly.\nAnswer: done without it.",
        ]));
        let agent = agent_with(provider, 10);

        let outcome = agent.run("task").await.unwrap();
        assert!(!outcome.truncated);
        assert_eq!(outcome.answer, "done without it.");

        let TraceStep::ToolCall { result, .. } = &outcome.trace.steps[0] else {
            panic!("expected tool call step");
        };
        assert!(!result.success);
        assert!(result.output.contains("unknown tool"));
    }

    #[tokio::test]
    async fn repeated_identical_failure_truncates() {
        let bad_call = "Thought: Still trying.\n\
                        Act: [TOOL_CALL] {\"name\": \"teleport\", \"arguments\": {}}";
        let provider = Arc::new(ScriptedProvider::new(&[bad_call, bad_call, bad_call, bad_call]));
        let agent = agent_with(provider.clone(), 10);

        let outcome = agent.run("task").await.unwrap();
        assert!(outcome.truncated);
        // Abandoned at the repeat_failure_limit (3), not the round limit
        assert_eq!(outcome.trace.len(), 3);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn round_exhaustion_returns_last_response_as_partial() {
        let looping = "Thought: checking again.\n\
                       Act: [TOOL_CALL] {\"name\": \"clock\", \"arguments\": {}}";
        let provider = Arc::new(ScriptedProvider::new(&[looping, looping]));
        let agent = agent_with(provider, 2);

        let outcome = agent.run("task").await.unwrap();
        assert!(outcome.truncated);
        assert_eq!(outcome.trace.len(), 2);
        assert!(outcome.answer.contains("checking again"));
    }

    #[tokio::test]
    async fn untagged_response_is_treated_as_final_answer() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "The capital of France is Paris.",
        ]));
        let agent = agent_with(provider, 10);

        let outcome = agent.run("capital of France?").await.unwrap();
        assert!(!outcome.truncated);
        assert_eq!(outcome.answer, "The capital of France is Paris.");
        assert_eq!(outcome.trace.len(), 1);
    }

    #[test]
    fn system_prompt_contains_react_format() {
        let mut tools = ToolRegistry::new();
        tools.register(CalculatorTool);

        let prompt = build_system_prompt("You are helpful.", &tools);
        assert!(prompt.contains("Thought:"));
        assert!(prompt.contains("Act:"));
        assert!(prompt.contains("Answer:"));
        assert!(prompt.contains("Observe:"));
        assert!(prompt.contains("calculate"));
    }

    #[test]
    fn system_prompt_without_tools_is_the_base_prompt() {
        let prompt = build_system_prompt("You are helpful.", &ToolRegistry::new());
        assert_eq!(prompt, "You are helpful.");
    }

    #[test]
    fn builder_requires_provider() {
        assert!(ReactAgentBuilder::new().build().is_err());
    }
}
