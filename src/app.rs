use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::llm::BoundModel;
use crate::memory::ConversationMemory;
use crate::message::Message;
use crate::platform::Platform;
use crate::tool::ToolRegistry;

/// Fixed answer rendered when the agent could not be constructed.
pub const NOT_INITIALIZED: &str = "Agent not initialized. Please check server logs.";

/// Everything one question/answer exchange needs: the wrapped tools and
/// the bound model. Built once, shared read-only across exchanges.
pub struct AgentContext {
    pub registry: Arc<ToolRegistry>,
    pub model: BoundModel,
}

impl AgentContext {
    pub async fn initialize(platform: &dyn Platform, cfg: &AgentConfig) -> Result<Self> {
        let registry = ToolRegistry::discover(platform, cfg).await;
        info!(tools = registry.len(), "tool registry ready");
        let model = BoundModel::bind(platform, &cfg.model, &registry).await?;
        Ok(Self {
            registry: Arc::new(registry),
            model,
        })
    }
}

/// Result of one `answer` exchange handed back to the UI collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub status: String,
    pub text: String,
    pub history: Vec<Message>,
}

/// The boundary the UI collaborator talks to. Owns the platform handle
/// and lazily builds the agent context on the first question.
pub struct InsightApp<P: Platform> {
    platform: P,
    config: AgentConfig,
    context: RwLock<Option<Arc<AgentContext>>>,
}

impl<P: Platform> InsightApp<P> {
    pub fn new(platform: P, config: AgentConfig) -> Self {
        Self {
            platform,
            config,
            context: RwLock::new(None),
        }
    }

    /// Rebuild the context from the platform. Idempotent; also serves as
    /// explicit re-initialization after tool or model changes.
    pub async fn reinitialize(&self) -> Result<()> {
        let ctx = AgentContext::initialize(&self.platform, &self.config).await?;
        *self.context.write().await = Some(Arc::new(ctx));
        Ok(())
    }

    /// Construction faults degrade to a disabled state; the next question
    /// retries initialization.
    async fn context(&self) -> Option<Arc<AgentContext>> {
        if let Some(ctx) = self.context.read().await.clone() {
            return Some(ctx);
        }
        let mut guard = self.context.write().await;
        if guard.is_none() {
            match AgentContext::initialize(&self.platform, &self.config).await {
                Ok(ctx) => *guard = Some(Arc::new(ctx)),
                Err(err) => error!(%err, "agent initialization failed"),
            }
        }
        guard.clone()
    }

    /// Answer one question against the given history.
    ///
    /// Returns `None` for an empty question (no state change). Otherwise
    /// the returned history always gains the outcome as an assistant
    /// turn, errors included; this boundary never raises outward.
    pub async fn answer(&self, question: &str, history: Vec<Message>) -> Option<Answer> {
        if question.trim().is_empty() {
            return None;
        }

        let mut memory = ConversationMemory::with_messages(history)
            .with_max_messages(self.config.max_messages);

        let Some(ctx) = self.context().await else {
            memory.push(Message::assistant(NOT_INITIALIZED));
            memory.evict_to_cap();
            return Some(Answer {
                status: String::new(),
                text: NOT_INITIALIZED.to_string(),
                history: memory.into_messages(),
            });
        };

        memory.evict_to_cap();
        memory.push(Message::user(question));

        let agent = Agent::new(ctx.model.clone(), ctx.registry.clone())
            .with_max_iterations(self.config.max_iterations);

        let text = match agent.run(&mut memory).await {
            Ok(text) => text,
            Err(err) => {
                error!(%err, "question failed");
                let rendered = format!("Error: {err}");
                memory.push(Message::assistant(&rendered));
                rendered
            }
        };

        memory.evict_to_cap();
        Some(Answer {
            status: String::new(),
            text,
            history: memory.into_messages(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelCompletion, StubChatModel};
    use crate::message::{Role, ToolCall};
    use crate::platform::{StubPlatform, MANAGED_LLM_KIND};
    use crate::tool::StubDomainTool;

    fn platform_with(script: Vec<ModelCompletion>) -> StubPlatform {
        StubPlatform::new()
            .with_model(
                "llm-1",
                "claude-3-5-sonnet",
                MANAGED_LLM_KIND,
                StubChatModel::new(script),
            )
            .with_tool(
                "tool-1",
                "Snowflake Cortex Search",
                StubDomainTool::new("a dramatic tiebreak"),
            )
            .with_tool(
                "tool-2",
                "Snowflake Cortex Analyst",
                StubDomainTool::new("7 break points"),
            )
    }

    #[tokio::test]
    async fn empty_question_is_a_no_op() {
        let app = InsightApp::new(
            platform_with(vec![ModelCompletion::text("unused")]),
            AgentConfig::default(),
        );

        assert!(app.answer("", vec![Message::user("old")]).await.is_none());
        assert!(app.answer("   ", Vec::new()).await.is_none());
    }

    #[tokio::test]
    async fn missing_model_yields_the_fixed_disabled_answer() {
        let platform = StubPlatform::new(); // no models at all
        let app = InsightApp::new(platform, AgentConfig::default());

        let answer = app.answer("anything", Vec::new()).await.unwrap();

        assert_eq!(answer.status, "");
        assert_eq!(answer.text, NOT_INITIALIZED);
        assert_eq!(answer.history.len(), 1);
        assert_eq!(answer.history[0].role, Role::Assistant);
        assert_eq!(answer.history[0].content, NOT_INITIALIZED);
    }

    #[tokio::test]
    async fn history_stays_within_the_cap() {
        let app = InsightApp::new(
            platform_with(vec![ModelCompletion::text("short answer")]),
            AgentConfig::default(),
        );

        let history: Vec<Message> = (0..20).map(|i| Message::user(format!("turn {i}"))).collect();
        let answer = app.answer("one more", history).await.unwrap();

        assert_eq!(answer.history.len(), 20);
        assert_eq!(answer.history.last().unwrap().content, "short answer");
    }

    #[tokio::test]
    async fn emotional_question_routes_to_search() {
        let app = InsightApp::new(
            platform_with(vec![
                ModelCompletion::tool_requests(vec![ToolCall {
                    id: Some("call-1".into()),
                    name: "cortex_search_tool".into(),
                    arguments: serde_json::json!({"query": "final set emotions"}),
                }]),
                ModelCompletion::text("The final set swung on a dramatic tiebreak."),
            ]),
            AgentConfig::default(),
        );

        let answer = app
            .answer("How did the final set unfold emotionally?", Vec::new())
            .await
            .unwrap();

        let tool_turn = answer
            .history
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("tool-result turn");
        assert!(tool_turn.content.starts_with("[Using Cortex Search tool]"));
        assert_eq!(
            answer.text,
            "The final set swung on a dramatic tiebreak."
        );
    }

    #[tokio::test]
    async fn model_fault_becomes_an_error_turn() {
        // Script exhausted on the first invocation.
        let app = InsightApp::new(platform_with(Vec::new()), AgentConfig::default());

        let answer = app.answer("hello", Vec::new()).await.unwrap();

        assert!(answer.text.starts_with("Error: "));
        let last = answer.history.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, answer.text);
    }

    #[tokio::test]
    async fn reinitialize_surfaces_platform_faults() {
        let app = InsightApp::new(StubPlatform::new(), AgentConfig::default());

        assert_eq!(
            app.answer("q", Vec::new()).await.unwrap().text,
            NOT_INITIALIZED
        );
        assert!(app.reinitialize().await.is_err());
    }
}
