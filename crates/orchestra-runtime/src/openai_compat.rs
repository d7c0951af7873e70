//! OpenAI-Compatible Chat Provider
//!
//! One `LlmProvider` implementation for every backend that speaks the
//! OpenAI chat-completions API: Ollama (under `/v1`), vLLM, and hosted
//! endpoints. The agent loop stays backend-agnostic; switching backends
//! is a base-URL change.
//!
//! Retry policy lives here: timeouts, connection failures, HTTP 429 and
//! 5xx are retried with bounded exponential backoff before an error
//! ever reaches the agent loop.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use orchestra_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, TokenUsage},
};

/// Provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiCompatConfig {
    /// Base URL including the API prefix (e.g. "http://localhost:11434/v1")
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the initial attempt for transport-class failures
    pub max_retries: u32,

    /// Base backoff delay, doubled per retry
    pub backoff_base_ms: u64,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            timeout_secs: 120,
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }
}

impl OpenAiCompatConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("OLLAMA_BASE_URL").unwrap_or(defaults.base_url);
        let timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_secs);
        let max_retries = std::env::var("LLM_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_retries);

        Self {
            base_url,
            timeout_secs,
            max_retries,
            ..defaults
        }
    }
}

/// OpenAI-compatible chat-completions provider
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<WireUsage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<WireModel>,
}

#[derive(Deserialize)]
struct WireModel {
    id: String,
}

impl OpenAiCompatProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiCompatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create with a custom base URL and default timeouts
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::from_config(OpenAiCompatConfig {
            base_url: base_url.into(),
            ..OpenAiCompatConfig::default()
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiCompatConfig::from_env())
    }

    /// Create with default localhost Ollama settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OpenAiCompatConfig::default())
    }

    /// Convert conversation messages to the wire format. The text
    /// protocol carries tool results as user turns, so `Role::Tool`
    /// maps to "user" (not every backend accepts a "tool" role without
    /// native function calling).
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                };
                WireMessage {
                    role: role.into(),
                    content: m.content.clone(),
                }
            })
            .collect()
    }

    fn convert_finish_reason(reason: Option<&str>) -> Option<FinishReason> {
        match reason {
            Some("stop") => Some(FinishReason::Stop),
            Some("length") => Some(FinishReason::Length),
            Some("content_filter") => Some(FinishReason::ContentFilter),
            Some(_) => Some(FinishReason::Error),
            None => None,
        }
    }

    /// One request attempt, with failure classification
    async fn send_chat(&self, request: &ChatRequest<'_>) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 429 and 5xx are transient; everything else won't improve
            // by retrying
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(AgentError::Transport(format!("HTTP {status}: {body}")));
            }
            return Err(AgentError::Provider(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Transport(format!("malformed response body: {e}")))?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(AgentError::Transport("response contained no choices".into()));
        };

        Ok(Completion {
            content: choice.message.content,
            model: parsed.model.unwrap_or_else(|| request.model.to_string()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: Self::convert_finish_reason(choice.finish_reason.as_deref()),
        })
    }
}

/// Map client-side request failures onto the error taxonomy
fn classify_reqwest_error(err: reqwest::Error) -> AgentError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AgentError::Transport(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("health check failed: {e}");
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatRequest {
            model: &options.model,
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stop: options.stop_sequences.clone(),
            stream: false,
        };

        let mut attempt: u32 = 0;
        loop {
            match self.send_chat(&request).await {
                Ok(completion) => return Ok(completion),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay =
                        Duration::from_millis(self.config.backoff_base_ms << attempt);
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient backend failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Provider(format!("HTTP {status}")));
        }

        let parsed: ModelsResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Transport(format!("malformed response body: {e}")))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id.clone(),
                name: m.id,
                context_length: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = OpenAiCompatConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_base_ms, 500);
    }

    #[test]
    fn tool_role_is_sent_as_user() {
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Hello"),
            Message::assistant("Thought: ..."),
            Message::tool("Observe: 42", Some("call-1".into())),
        ];

        let converted = OpenAiCompatProvider::convert_messages(&messages);
        let roles: Vec<&str> = converted.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(converted[3].content, "Observe: 42");
    }

    #[test]
    fn request_serialization_omits_empty_stop() {
        let request = ChatRequest {
            model: "deepseek-r1:8b",
            messages: vec![WireMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: 0.7,
            max_tokens: 2048,
            top_p: 0.9,
            stop: Vec::new(),
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "deepseek-r1:8b");
        assert_eq!(json["stream"], false);
        assert!(json.get("stop").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn response_parsing() {
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "deepseek-r1:8b",
            "choices": [
                {
                    "index": 0,
                    "message": {"role": "assistant", "content": "Thought: hi\nAnswer: hello"},
                    "finish_reason": "stop"
                }
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
        }"#;

        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].message.content, "Thought: hi\nAnswer: hello");
        assert_eq!(parsed.usage.as_ref().unwrap().total_tokens, 20);
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(
            OpenAiCompatProvider::convert_finish_reason(Some("stop")),
            Some(FinishReason::Stop)
        );
        assert_eq!(
            OpenAiCompatProvider::convert_finish_reason(Some("length")),
            Some(FinishReason::Length)
        );
        assert_eq!(
            OpenAiCompatProvider::convert_finish_reason(Some("weird")),
            Some(FinishReason::Error)
        );
        assert_eq!(OpenAiCompatProvider::convert_finish_reason(None), None);
    }

    #[test]
    fn models_response_parsing() {
        let body = r#"{"object": "list", "data": [{"id": "deepseek-r1:8b", "object": "model"}]}"#;
        let parsed: ModelsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].id, "deepseek-r1:8b");
    }

    mod backend_stub {
        use std::io::{Read, Write};
        use std::net::{TcpListener, TcpStream};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        /// Minimal scripted HTTP listener: answers each accepted
        /// connection with the next (status, body) pair and counts
        /// requests served.
        pub fn spawn(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&hits);

            std::thread::spawn(move || {
                for (status, body) in responses {
                    let Ok((mut stream, _)) = listener.accept() else {
                        return;
                    };
                    counter.fetch_add(1, Ordering::SeqCst);
                    drain_request(&mut stream);

                    let reason = match status {
                        200 => "OK",
                        400 => "Bad Request",
                        429 => "Too Many Requests",
                        _ => "Internal Server Error",
                    };
                    let response = format!(
                        "HTTP/1.1 {status} {reason}\r\n\
                         Content-Type: application/json\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
            });

            (format!("http://{addr}/v1"), hits)
        }

        fn drain_request(stream: &mut TcpStream) {
            let mut head = Vec::new();
            let mut byte = [0u8; 1];
            while !head.ends_with(b"\r\n\r\n") {
                match stream.read(&mut byte) {
                    Ok(1) => head.push(byte[0]),
                    _ => return,
                }
            }

            let headers = String::from_utf8_lossy(&head).to_lowercase();
            let body_len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let mut body = vec![0u8; body_len];
            let _ = stream.read_exact(&mut body);
        }
    }

    fn stub_provider(base_url: String, max_retries: u32) -> OpenAiCompatProvider {
        OpenAiCompatProvider::from_config(OpenAiCompatConfig {
            base_url,
            timeout_secs: 5,
            max_retries,
            backoff_base_ms: 1,
        })
        .unwrap()
    }

    const CHAT_OK: &str = r#"{
        "model": "deepseek-r1:8b",
        "choices": [
            {"message": {"role": "assistant", "content": "Answer: recovered"}, "finish_reason": "stop"}
        ]
    }"#;

    #[tokio::test]
    async fn server_error_is_retried_then_succeeds() {
        let (base_url, hits) = backend_stub::spawn(vec![(500, ""), (200, CHAT_OK)]);
        let provider = stub_provider(base_url, 3);

        let completion = provider
            .complete(&[Message::user("hello")], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "Answer: recovered");
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_are_bounded_before_transport_error_surfaces() {
        let (base_url, hits) = backend_stub::spawn(vec![(500, ""), (500, ""), (500, "")]);
        let provider = stub_provider(base_url, 1);

        let err = provider
            .complete(&[Message::user("hello")], &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Transport(_)));
        // initial attempt + max_retries, no more
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_error_surfaces_immediately_without_retry() {
        let (base_url, hits) =
            backend_stub::spawn(vec![(400, r#"{"error": "bad request"}"#), (400, "")]);
        let provider = stub_provider(base_url, 3);

        let err = provider
            .complete(&[Message::user("hello")], &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Provider(_)));
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_is_classified_as_retryable() {
        let (base_url, hits) = backend_stub::spawn(vec![(429, ""), (200, CHAT_OK)]);
        let provider = stub_provider(base_url, 3);

        let completion = provider
            .complete(&[Message::user("hello")], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "Answer: recovered");
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
