use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::llm::BoundModel;
use crate::memory::ConversationMemory;
use crate::message::{Message, Role, ToolCall};
use crate::tool::ToolRegistry;

/// Fixed instruction turn prepended once per conversation. Tells the model
/// to name the tool it used and to answer narratively.
pub const SYSTEM_INSTRUCTION: &str = "When answering questions, always mention which tool you are using.
When asked about emotions, mood, flow of the match - use Cortex Search on match summaries.
When asked about statistical things - use Cortex Analyst to query the semantic model.
When asked a combination - use both tools.

In your responses:
- Tell a story with structure, don't use numbered bullets
- Show intermediate results from tools
- Avoid using the colon symbol (:) too much
- Explain what you found and how it answers the question";

pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// Placeholder output recorded when no registered tool answers a
/// model-proposed name. The loop continues rather than failing.
const UNROUTED_TOOL_OUTPUT: &str = "None";

/// Drives the model/tool cycle for one question until the model produces
/// a plain-text answer or the iteration bound is hit.
pub struct Agent {
    model: BoundModel,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
}

impl Agent {
    pub fn new(model: BoundModel, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Run one exchange. Expects the conversation to already carry the
    /// new user turn; prepends the system instruction when absent.
    /// Returns the final assistant reply, which is also appended to the
    /// conversation.
    pub async fn run(&self, memory: &mut ConversationMemory) -> Result<String> {
        memory.ensure_system(SYSTEM_INSTRUCTION);

        for iteration in 0..self.max_iterations {
            let completion = self
                .model
                .invoke(memory.messages())
                .instrument(debug_span!("invoke_model", iteration))
                .await?;

            if completion.tool_calls.is_empty() {
                let content = completion.content.unwrap_or_default();
                memory.push(Message::assistant(&content));
                return Ok(content);
            }

            debug!(
                requests = completion.tool_calls.len(),
                "model requested tools"
            );

            let mut calls = completion.tool_calls;
            for call in &mut calls {
                if call.id.is_none() {
                    call.id = Some(format!("call-{}", Uuid::new_v4()));
                }
            }

            // The raw assistant turn goes in before any tool executes so
            // the next invocation replays the exact order of events.
            memory.push(Message {
                role: Role::Assistant,
                content: completion.content.unwrap_or_default(),
                tool_call_id: None,
                tool_calls: calls.clone(),
            });

            // Sequential, in emission order. A later call may depend on
            // context framed by an earlier one.
            for call in calls {
                let output = self.execute(&call).await;
                memory.push(Message::tool(output, call.id));
            }
        }

        Err(AgentError::IterationLimit(self.max_iterations))
    }

    /// Route and execute one tool-call request. Failures and unroutable
    /// names become result text the model can see and react to.
    async fn execute(&self, call: &ToolCall) -> String {
        let Some(descriptor) = self.tools.route(&call.name) else {
            warn!(requested = %call.name, "no registered tool answers this name");
            return UNROUTED_TOOL_OUTPUT.to_string();
        };

        let query = query_text(&call.arguments);
        let span = debug_span!("call_tool", tool = %descriptor.name, requested = %call.name);
        match descriptor.run(&query).instrument(span).await {
            Ok(output) => format!("[Using {} tool]\n\n{output}", descriptor.label),
            Err(err) => {
                warn!(tool = %descriptor.name, %err, "tool execution failed");
                err.to_string()
            }
        }
    }
}

/// Extract the `query` argument; fall back to the whole argument object
/// when the model used a different shape.
fn query_text(arguments: &Value) -> String {
    arguments
        .get("query")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| arguments.to_string())
}
