//! Chat model abstraction, the REST chat client and model binding.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role, ToolCall};
use crate::platform::{Platform, MANAGED_LLM_KIND};
use crate::tool::{ToolDescription, ToolRegistry};

/// Result of one chat completion: plain text, or one or more tool-call
/// requests. When tool calls are present any accompanying text is
/// provisional.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_requests(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }
}

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelCompletion>;
}

/// A chat handle with the registry's tool descriptions attached. Tool
/// availability is part of the invocation contract, so the descriptions
/// travel with the handle rather than per call.
#[derive(Clone)]
pub struct BoundModel {
    chat: Arc<dyn ChatModel>,
    tools: Vec<ToolDescription>,
}

impl std::fmt::Debug for BoundModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundModel")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl BoundModel {
    pub fn new(chat: Arc<dyn ChatModel>, registry: &ToolRegistry) -> Self {
        Self {
            chat,
            tools: registry.describe(),
        }
    }

    /// Resolve a chat model by case-insensitive substring match against
    /// the platform's model identifiers and attach the registry's tools.
    /// Managed-class candidates win when the selector is ambiguous.
    pub async fn bind(
        platform: &dyn Platform,
        selector: &str,
        registry: &ToolRegistry,
    ) -> Result<Self> {
        let models = platform.list_models().await?;
        let lowered = selector.to_ascii_lowercase();
        let matches = |info: &&crate::platform::ModelInfo| {
            info.model.to_ascii_lowercase().contains(&lowered)
        };

        let chosen = models
            .iter()
            .filter(matches)
            .find(|info| info.kind == MANAGED_LLM_KIND)
            .or_else(|| models.iter().find(matches))
            .ok_or_else(|| AgentError::ModelNotFound(selector.to_string()))?;

        debug!(id = %chosen.id, model = %chosen.model, "bound chat model");
        let chat = platform.chat_model(&chosen.id).await?;
        Ok(Self::new(chat, registry))
    }

    /// Refresh the attached descriptions after the registry changed.
    pub fn rebind_tools(&mut self, registry: &ToolRegistry) {
        self.tools = registry.describe();
    }

    pub async fn invoke(&self, messages: &[Message]) -> Result<ModelCompletion> {
        self.chat.complete_chat(messages, &self.tools).await
    }
}

/// Chat-completions client for the platform's managed models.
#[derive(Clone)]
pub struct RestChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl RestChatClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model: model.into(),
        }
    }

    fn to_wire_messages(&self, messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                }
                .to_string();

                let tool_calls = if message.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        message
                            .tool_calls
                            .iter()
                            .map(|call| WireToolCall {
                                id: call.id.clone(),
                                r#type: "function".to_string(),
                                function: WireFunctionCall {
                                    name: call.name.clone(),
                                    arguments: serialize_arguments(&call.arguments),
                                },
                            })
                            .collect(),
                    )
                };

                WireMessage {
                    role,
                    content: Some(message.content.clone()),
                    tool_call_id: message.tool_call_id.clone(),
                    tool_calls,
                }
            })
            .collect()
    }

    fn to_wire_tools(&self, tools: &[ToolDescription]) -> Option<Vec<WireTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| WireTool {
                    r#type: "function".to_string(),
                    function: WireFunction {
                        name: tool.name.clone(),
                        description: Some(tool.description.clone()),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
        )
    }
}

fn serialize_arguments(args: &Value) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| args.to_string())
}

fn coalesce_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::ModelInvocation(format!("rate limit exceeded: {body}"));
    }
    AgentError::ModelInvocation(format!("request failed with {status}: {body}"))
}

#[async_trait]
impl ChatModel for RestChatClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelCompletion> {
        let payload = json!({
            "model": self.model,
            "messages": self.to_wire_messages(messages),
            "tools": self.to_wire_tools(tools),
            "tool_choice": if tools.is_empty() { Value::Null } else { Value::String("auto".to_string()) },
        });

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|err| AgentError::ModelInvocation(format!("request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body));
        }

        let parsed: WireCompletion = resp
            .json()
            .await
            .map_err(|err| AgentError::ModelInvocation(format!("malformed response: {err}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::ModelInvocation("response carried no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
            })
            .collect();

        Ok(ModelCompletion {
            content: choice.message.content,
            tool_calls,
        })
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: Option<String>,
    r#type: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    r#type: String,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: Option<String>,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireCompletion {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

/// Scripted model that replays a fixed sequence of completions.
#[derive(Default)]
pub struct StubChatModel {
    script: Mutex<VecDeque<ModelCompletion>>,
    invocations: AtomicUsize,
}

impl StubChatModel {
    pub fn new(script: Vec<ModelCompletion>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            invocations: AtomicUsize::new(0),
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for StubChatModel {
    async fn complete_chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescription],
    ) -> Result<ModelCompletion> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::ModelInvocation("stub script exhausted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StubPlatform;

    fn platform() -> StubPlatform {
        StubPlatform::new()
            .with_model(
                "llm-1",
                "gpt-4o-mini",
                "OPENAI",
                StubChatModel::new(vec![ModelCompletion::text("a")]),
            )
            .with_model(
                "llm-2",
                "Claude-3-5-Sonnet",
                "OPENROUTER",
                StubChatModel::new(vec![ModelCompletion::text("b")]),
            )
            .with_model(
                "llm-3",
                "claude-3-5-sonnet-v2",
                MANAGED_LLM_KIND,
                StubChatModel::new(vec![ModelCompletion::text("managed")]),
            )
    }

    #[tokio::test]
    async fn binding_prefers_managed_models() {
        let bound = BoundModel::bind(&platform(), "claude-3-5-sonnet", &ToolRegistry::new())
            .await
            .unwrap();

        let completion = bound.invoke(&[]).await.unwrap();
        assert_eq!(completion.content.as_deref(), Some("managed"));
    }

    #[tokio::test]
    async fn binding_falls_back_to_first_substring_match() {
        let bound = BoundModel::bind(&platform(), "gpt-4o", &ToolRegistry::new())
            .await
            .unwrap();

        let completion = bound.invoke(&[]).await.unwrap();
        assert_eq!(completion.content.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn binding_fails_when_nothing_matches() {
        let err = BoundModel::bind(&platform(), "mistral", &ToolRegistry::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ModelNotFound(_)));
    }
}
