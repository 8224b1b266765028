use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::PlatformConfig;
use crate::error::{AgentError, Result};
use crate::llm::{ChatModel, RestChatClient};
use crate::tool::DomainTool;

/// Model class the platform assigns to its managed LLMs. Preferred when a
/// selector matches several candidates.
pub const MANAGED_LLM_KIND: &str = "SNOWFLAKE_CORTEX";

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolInfo {
    pub id: String,
    pub name: String,
}

/// The hosted-platform collaborator: enumerates chat models and domain
/// tools and converts their ids into invocable handles.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
    async fn chat_model(&self, id: &str) -> Result<Arc<dyn ChatModel>>;
    async fn list_tools(&self) -> Result<Vec<ToolInfo>>;
    async fn tool_handle(&self, id: &str) -> Result<Arc<dyn DomainTool>>;
}

/// REST client for the platform API.
#[derive(Clone)]
pub struct RestPlatform {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestPlatform {
    pub fn from_config(cfg: &PlatformConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| AgentError::Platform(format!("http client error: {err}")))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.get(format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }
}

#[async_trait]
impl Platform for RestPlatform {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let resp = self
            .get("/models")
            .send()
            .await
            .map_err(|err| AgentError::Platform(format!("list models failed: {err}")))?;
        if !resp.status().is_success() {
            return Err(AgentError::Platform(format!(
                "list models returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|err| AgentError::Platform(format!("malformed model listing: {err}")))
    }

    async fn chat_model(&self, id: &str) -> Result<Arc<dyn ChatModel>> {
        Ok(Arc::new(RestChatClient::new(
            self.http.clone(),
            self.base_url.clone(),
            self.api_key.clone(),
            id,
        )))
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let resp = self
            .get("/agent-tools")
            .send()
            .await
            .map_err(|err| AgentError::Platform(format!("list tools failed: {err}")))?;
        if !resp.status().is_success() {
            return Err(AgentError::Platform(format!(
                "list tools returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|err| AgentError::Platform(format!("malformed tool listing: {err}")))
    }

    async fn tool_handle(&self, id: &str) -> Result<Arc<dyn DomainTool>> {
        Ok(Arc::new(RestDomainTool {
            http: self.http.clone(),
            url: format!("{}/agent-tools/{id}/run", self.base_url),
            api_key: self.api_key.clone(),
            name: id.to_string(),
        }))
    }
}

/// Invokes one platform tool with a single text argument.
struct RestDomainTool {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    name: String,
}

#[derive(Deserialize)]
struct ToolRunResponse {
    output: String,
}

#[async_trait]
impl DomainTool for RestDomainTool {
    async fn run(&self, query: &str) -> Result<String> {
        let mut builder = self.http.post(&self.url).json(&json!({"query": query}));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await.map_err(|err| AgentError::ToolInvocation {
            name: self.name.clone(),
            source: Box::new(err),
        })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AgentError::ToolInvocation {
                name: self.name.clone(),
                source: format!("request failed with {status}: {body}").into(),
            });
        }

        // Tools answer either a JSON envelope or raw text.
        match serde_json::from_str::<ToolRunResponse>(&body) {
            Ok(parsed) => Ok(parsed.output),
            Err(_) => Ok(body),
        }
    }
}

/// In-memory platform for tests and demos.
#[derive(Default, Clone)]
pub struct StubPlatform {
    models: Vec<ModelInfo>,
    chat: HashMap<String, Arc<dyn ChatModel>>,
    tools: Vec<ToolInfo>,
    handles: HashMap<String, Arc<dyn DomainTool>>,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(
        mut self,
        id: impl Into<String>,
        model: impl Into<String>,
        kind: impl Into<String>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        let id = id.into();
        self.models.push(ModelInfo {
            id: id.clone(),
            model: model.into(),
            kind: kind.into(),
        });
        self.chat.insert(id, chat);
        self
    }

    pub fn with_tool(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        handle: Arc<dyn DomainTool>,
    ) -> Self {
        let id = id.into();
        self.tools.push(ToolInfo {
            id: id.clone(),
            name: name.into(),
        });
        self.handles.insert(id, handle);
        self
    }
}

#[async_trait]
impl Platform for StubPlatform {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.models.clone())
    }

    async fn chat_model(&self, id: &str) -> Result<Arc<dyn ChatModel>> {
        self.chat
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::Platform(format!("unknown model id `{id}`")))
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        Ok(self.tools.clone())
    }

    async fn tool_handle(&self, id: &str) -> Result<Arc<dyn DomainTool>> {
        self.handles
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::Platform(format!("unknown tool id `{id}`")))
    }
}
