//! Reasoning backends.
//!
//! A backend looks at the trace so far and decides what happens next:
//! invoke one of the advertised tools, or answer. [`OllamaBackend`]
//! implements this on top of Ollama's chat API with tool calling.

use crate::analysis::verdict::has_final_answer;
use crate::inspector::tools::{ToolDefinition, ToolDescriptor};
use crate::models::Trace;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// What the backend wants to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    /// Invoke a tool by name. Tools take no arguments, so none are kept.
    InvokeTool { name: String, thought: String },
    /// Stop and answer with free text.
    Final(String),
}

/// Failure to reach or understand the reasoning backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Cannot connect to Ollama at {url}. Is Ollama running?")]
    Connect { url: String },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Ollama API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse Ollama response: {0}")]
    Decode(String),

    #[error("Failed to send request: {0}")]
    Request(String),
}

/// Decides the next action given the trace and the available tools.
pub trait ReasoningBackend {
    fn next_action(
        &mut self,
        trace: &Trace,
        tools: &[ToolDescriptor],
    ) -> impl Future<Output = Result<AgentAction, BackendError>> + Send;
}

/// Connection settings for [`OllamaBackend`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.1,
            timeout_seconds: 300,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallMessage {
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallMessage>>,
}

/// Reasoning backend backed by a local or remote Ollama server.
pub struct OllamaBackend {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a backend. Fails only if the HTTP client cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ResponseMessage, BackendError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages,
            tools,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending chat request with {} messages", request.messages.len());

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        seconds: self.config.timeout_seconds,
                    }
                } else if e.is_connect() {
                    BackendError::Connect {
                        url: self.config.ollama_url.clone(),
                    }
                } else {
                    BackendError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        Ok(chat_response.message)
    }
}

impl ReasoningBackend for OllamaBackend {
    async fn next_action(
        &mut self,
        trace: &Trace,
        tools: &[ToolDescriptor],
    ) -> Result<AgentAction, BackendError> {
        let messages = build_messages(trace);
        let definitions = tools.iter().map(ToolDescriptor::definition).collect();
        let message = self.chat(messages, definitions).await?;
        Ok(classify_response(message, tools))
    }
}

/// Rebuild the chat history from the trace.
///
/// Each step becomes an assistant message carrying exactly the one tool
/// call that was executed, followed by its tool result.
fn build_messages(trace: &Trace) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(1 + trace.len() * 2);
    messages.push(ChatMessage::text("user", trace.instruction.clone()));

    for step in trace.steps() {
        messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: step.thought.clone(),
            tool_calls: Some(vec![ToolCallMessage {
                function: ToolCallFunction {
                    name: step.tool.clone(),
                    arguments: json!({}),
                },
            }]),
            tool_name: None,
        });
        messages.push(ChatMessage {
            tool_name: Some(step.tool.clone()),
            ..ChatMessage::text("tool", step.observation.clone())
        });
    }

    messages
}

fn classify_response(message: ResponseMessage, tools: &[ToolDescriptor]) -> AgentAction {
    if let Some(mut calls) = message.tool_calls.filter(|c| !c.is_empty()) {
        if calls.len() > 1 {
            debug!("Ignoring {} extra tool calls in one response", calls.len() - 1);
        }
        let call = calls.swap_remove(0);
        return AgentAction::InvokeTool {
            name: call.function.name,
            thought: message.content,
        };
    }

    // Models without native tool calling may answer in ReAct text form
    if !has_final_answer(&message.content) {
        if let Some(name) = parse_react_action(&message.content, tools) {
            return AgentAction::InvokeTool {
                name,
                thought: message.content,
            };
        }
    }

    AgentAction::Final(message.content)
}

/// Find an `Action: <tool>` line naming one of `tools`.
fn parse_react_action(content: &str, tools: &[ToolDescriptor]) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.trim();
        let rest = line.get(..7)?;
        if !rest.eq_ignore_ascii_case("action:") {
            return None;
        }
        let name = line[7..].trim().trim_matches(|c| c == '`' || c == '"' || c == '\'');
        tools
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.name.to_string())
    })
}
