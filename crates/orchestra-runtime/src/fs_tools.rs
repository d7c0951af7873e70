//! Filesystem Tools
//!
//! `read_file` and `write_file` for the researcher/coder/reviewer
//! flows. Both report every expected failure (missing file, oversized
//! file, IO error) as a failed `ToolResult` so the model can
//! self-correct instead of aborting the run.

use async_trait::async_trait;

use orchestra_core::{
    error::Result,
    tool::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema},
};

/// Refuse to read files larger than this into the conversation
const MAX_READ_BYTES: u64 = 100_000;

fn string_arg<'a>(call: &'a ToolCall, name: &str) -> Option<&'a str> {
    call.arguments.get(name).and_then(serde_json::Value::as_str)
}

/// Reads a text file from the local filesystem
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "read_file".into(),
            description: "Read the contents of a text file at the given path".into(),
            parameters: vec![ParameterSchema {
                name: "path".into(),
                param_type: "string".into(),
                description: "Path of the file to read".into(),
                required: true,
            }],
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let Some(path) = string_arg(call, "path") else {
            return Ok(ToolResult::failure(
                "read_file",
                "'path' must be a string",
            ));
        };

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                return Ok(ToolResult::failure(
                    "read_file",
                    format!("file not found: {path}"),
                ));
            }
        };

        if !metadata.is_file() {
            return Ok(ToolResult::failure(
                "read_file",
                format!("not a file: {path}"),
            ));
        }

        if metadata.len() > MAX_READ_BYTES {
            return Ok(ToolResult::failure(
                "read_file",
                format!(
                    "file too large to read ({} bytes, limit {MAX_READ_BYTES})",
                    metadata.len()
                ),
            ));
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(ToolResult::success("read_file", content)),
            Err(e) => Ok(ToolResult::failure(
                "read_file",
                format!("could not read {path}: {e}"),
            )),
        }
    }
}

/// Writes a text file, creating parent directories as needed
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "write_file".into(),
            description: "Write text content to a file at the given path, creating it if needed"
                .into(),
            parameters: vec![
                ParameterSchema {
                    name: "path".into(),
                    param_type: "string".into(),
                    description: "Path of the file to write".into(),
                    required: true,
                },
                ParameterSchema {
                    name: "content".into(),
                    param_type: "string".into(),
                    description: "Text content to write".into(),
                    required: true,
                },
            ],
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let Some(path) = string_arg(call, "path") else {
            return Ok(ToolResult::failure(
                "write_file",
                "'path' must be a string",
            ));
        };
        let Some(content) = string_arg(call, "content") else {
            return Ok(ToolResult::failure(
                "write_file",
                "'content' must be a string",
            ));
        };

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return Ok(ToolResult::failure(
                        "write_file",
                        format!("could not create directories for {path}: {e}"),
                    ));
                }
            }
        }

        match tokio::fs::write(path, content).await {
            Ok(()) => Ok(ToolResult::success(
                "write_file",
                format!("Wrote {} bytes to {path}", content.len()),
            )),
            Err(e) => Ok(ToolResult::failure(
                "write_file",
                format!("could not write {path}: {e}"),
            )),
        }
    }
}
