//! Tool System
//!
//! Extensible tool framework for agent capabilities. Tools are
//! registered at startup; the registry is a read-mostly dispatch table
//! that is safe to share across concurrently running agents.
//!
//! Dispatch never fails: unknown tools, bad arguments, and tool-internal
//! errors all come back as a `ToolResult` with `success = false` so the
//! reasoning loop can feed the error to the model and let it self-correct.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};

/// Default per-dispatch execution timeout
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Tool call request parsed from the model output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,

    /// Call ID for tracking across the trace
    #[serde(default)]
    pub id: Option<String>,
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    pub id: Option<String>,

    /// Whether execution succeeded
    pub success: bool,

    /// Output text (result or error description)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: false,
            output: error.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

/// Tool definition schema shown to the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema, immutable once registered
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && !call.arguments.contains_key(&param.name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Registry for available tools
///
/// Schemas are fixed at startup; lookup is concurrent-safe. Individual
/// tool implementations own any mutual exclusion over external state.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,

    /// Upper bound on a single tool execution. A tool that exceeds it
    /// is reported to the model as a failed result, so a hung tool
    /// cannot stall the agent round forever.
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ToolRegistry {
    fn clone(&self) -> Self {
        Self {
            tools: self.tools.clone(),
            timeout: self.timeout,
        }
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Override the per-dispatch execution timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let schema = tool.schema();
        self.tools.insert(schema.name.clone(), Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Dispatch a tool call by name
    ///
    /// Never fails: every error path, including a timed-out execution,
    /// is reported as a failed `ToolResult` carrying a human-readable
    /// message for the model.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            let mut names = self.names();
            names.sort_unstable();
            let mut result = ToolResult::failure(
                &call.name,
                format!("unknown tool '{}'. Available tools: {:?}", call.name, names),
            );
            result.id = call.id.clone();
            return result;
        };

        if let Err(e) = tool.validate(call) {
            let mut result = ToolResult::failure(&call.name, e.to_string());
            result.id = call.id.clone();
            return result;
        }

        let mut result = match tokio::time::timeout(self.timeout, tool.execute(call)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ToolResult::failure(&call.name, e.to_string()),
            Err(_) => ToolResult::failure(
                &call.name,
                format!("tool timed out after {} seconds", self.timeout.as_secs_f64()),
            ),
        };
        result.id = call.id.clone();
        result
    }

    /// All tool schemas, for prompt construction
    pub fn describe(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Registered tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// A registry containing only the named tools that exist here.
    /// Used to give each specialist role its own tool subset.
    pub fn subset(&self, names: &[&str]) -> Self {
        let tools = names
            .iter()
            .filter_map(|n| self.tools.get(*n).map(|t| ((*n).to_string(), t.clone())))
            .collect();
        Self {
            tools,
            timeout: self.timeout,
        }
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Plain-text description of every tool for the system prompt.
    /// One entry per tool with its argument list, in the format the
    /// ReAct instructions reference.
    pub fn prompt_section(&self) -> String {
        let mut section = String::new();
        for schema in self.describe() {
            section.push_str(&format!("- {}: {}\n", schema.name, schema.description));
            if !schema.parameters.is_empty() {
                let args: Vec<String> = schema
                    .parameters
                    .iter()
                    .map(|p| {
                        let required = if p.required { ", required" } else { "" };
                        format!("\"{}\": \"{}{}  — {}\"", p.name, p.param_type, required, p.description)
                    })
                    .collect();
                section.push_str(&format!("  Arguments: {{{}}}\n", args.join(", ")));
            }
        }
        section
    }
}

// ============================================================================
// Built-in tools
// ============================================================================

/// Clock tool - returns the current time
pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "clock".into(),
            description: "Get the current date and time".into(),
            parameters: vec![ParameterSchema {
                name: "format".into(),
                param_type: "string".into(),
                description: "Output format: 'iso', 'human', or 'unix'".into(),
                required: false,
            }],
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let format = call
            .arguments
            .get("format")
            .and_then(|v| v.as_str())
            .unwrap_or("human");

        let now = chrono::Utc::now();

        let output = match format {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
        };

        Ok(ToolResult::success("clock", output))
    }
}

/// Calculator tool - evaluates arithmetic expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculate".into(),
            description:
                "Evaluate a math expression. Supports +, -, *, /, ^, parentheses, and decimals."
                    .into(),
            parameters: vec![ParameterSchema {
                name: "expression".into(),
                param_type: "string".into(),
                description: "The math expression, e.g. '(15 + 27) * 3'".into(),
                required: true,
            }],
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let expr = call
            .arguments
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::ToolValidation("Missing expression".into()))?;

        if !expr.chars().all(|c| "0123456789+-*/.^() ".contains(c)) {
            return Ok(ToolResult::failure(
                "calculate",
                "expression contains disallowed characters. Only numbers and +-*/^.() are allowed.",
            ));
        }

        match evaluate_expression(expr) {
            Ok(result) => Ok(ToolResult::success(
                "calculate",
                format!("{} = {}", expr, result),
            )),
            Err(e) => Ok(ToolResult::failure("calculate", e)),
        }
    }
}

/// Simple recursive-descent-by-precedence evaluator
fn evaluate_expression(expr: &str) -> std::result::Result<f64, String> {
    let expr = expr.replace(' ', "");

    // Handle parentheses recursively
    if let Some(start) = expr.rfind('(') {
        if let Some(end) = expr[start..].find(')') {
            let inner = &expr[start + 1..start + end];
            let inner_result = evaluate_expression(inner)?;
            let new_expr = format!(
                "{}{}{}",
                &expr[..start],
                inner_result,
                &expr[start + end + 1..]
            );
            return evaluate_expression(&new_expr);
        }
    }

    // Addition/subtraction (lowest precedence, evaluated last)
    for (i, c) in expr.char_indices().rev() {
        if i > 0 && (c == '+' || c == '-') {
            // Make sure it's not a unary minus
            let prev_char = expr.chars().nth(i - 1).unwrap_or(' ');
            if prev_char.is_ascii_digit() || prev_char == ')' {
                let left = evaluate_expression(&expr[..i])?;
                let right = evaluate_expression(&expr[i + 1..])?;
                return Ok(if c == '+' { left + right } else { left - right });
            }
        }
    }

    // Multiplication/division
    for (i, c) in expr.char_indices().rev() {
        if c == '*' || c == '/' {
            let left = evaluate_expression(&expr[..i])?;
            let right = evaluate_expression(&expr[i + 1..])?;
            if c == '/' && right == 0.0 {
                return Err("Division by zero".into());
            }
            return Ok(if c == '*' { left * right } else { left / right });
        }
    }

    // Power
    if let Some(i) = expr.find('^') {
        let left = evaluate_expression(&expr[..i])?;
        let right = evaluate_expression(&expr[i + 1..])?;
        return Ok(left.powf(right));
    }

    // Parse number
    expr.parse::<f64>().map_err(|e| format!("Parse error: {}", e))
}
