use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::platform::{Platform, ToolInfo};

/// Routing description handed to the model for the search-oriented tool.
pub const SEARCH_TOOL_DESCRIPTION: &str = "Use Cortex Search when asked about emotions, mood, flow of the match, or narrative descriptions of matches. This tool searches through match summaries and descriptions to find relevant information about the emotional and narrative aspects of tennis matches. Use this for questions about match intensity, player emotions, match flow, dramatic moments, or storytelling aspects.";

/// Routing description handed to the model for the analysis-oriented tool.
pub const ANALYST_TOOL_DESCRIPTION: &str = "Use Cortex Analyst when asked about statistical things, numbers, aggregations, or data analysis. This tool queries the semantic model to answer questions about match statistics, player performance metrics, tournament data, and analytical queries. Use this for questions about counts, averages, comparisons, rankings, or any numerical analysis.";

const GENERIC_TOOL_DESCRIPTION: &str = "Tool for querying data.";

/// A platform-native domain tool with a string-in/string-out contract.
#[async_trait]
pub trait DomainTool: Send + Sync {
    async fn run(&self, query: &str) -> Result<String>;
}

/// Which of the two well-known roles a registered tool plays. Generic
/// covers additional tools beyond the fixed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Search,
    Analyst,
    Generic,
}

impl ToolKind {
    fn description(self) -> &'static str {
        match self {
            ToolKind::Search => SEARCH_TOOL_DESCRIPTION,
            ToolKind::Analyst => ANALYST_TOOL_DESCRIPTION,
            ToolKind::Generic => GENERIC_TOOL_DESCRIPTION,
        }
    }
}

/// Metadata the model consumes when deciding whether to call a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A wrapped domain tool: routing tag, model-facing description and the
/// callable handle. Created once at startup, read-only thereafter.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub kind: ToolKind,
    /// Human tag used in the `[Using <label> tool]` output prefix.
    pub label: String,
    pub description: String,
    handle: Arc<dyn DomainTool>,
}

impl ToolDescriptor {
    pub async fn run(&self, query: &str) -> Result<String> {
        self.handle.run(query).await
    }
}

/// Ordered list of wrapped tools available to the model.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the two well-known tools by exact display name and wrap
    /// them. A missing tool is skipped rather than failing startup.
    pub async fn discover(platform: &dyn Platform, cfg: &AgentConfig) -> Self {
        let mut registry = Self::new();
        let listed = match platform.list_tools().await {
            Ok(listed) => listed,
            Err(err) => {
                warn!(%err, "could not list platform tools; continuing without tools");
                return registry;
            }
        };

        for (wanted, kind) in [
            (&cfg.search_tool, ToolKind::Search),
            (&cfg.analyst_tool, ToolKind::Analyst),
        ] {
            match resolve(platform, &listed, wanted).await {
                Ok(handle) => registry.wrap(wanted.clone(), kind, handle),
                Err(err) => warn!(tool = %wanted, %err, "skipping unavailable tool"),
            }
        }

        registry
    }

    /// Append a wrapped descriptor. Entries are not deduplicated by name;
    /// wrapping the same handle twice yields two entries.
    pub fn wrap(&mut self, name: impl Into<String>, kind: ToolKind, handle: Arc<dyn DomainTool>) {
        let name = name.into();
        let label = match kind {
            ToolKind::Search => "Cortex Search".to_string(),
            ToolKind::Analyst => "Cortex Analyst".to_string(),
            ToolKind::Generic => name.clone(),
        };
        self.descriptors.push(ToolDescriptor {
            label,
            kind,
            description: kind.description().to_string(),
            handle,
            name,
        });
    }

    /// Pick the descriptor that answers a model-proposed tool name.
    ///
    /// The model's literal name may not equal a registered name, so the
    /// rules are an ordered list. Search deliberately outranks analyst
    /// when a name matches both (e.g. `search_and_analyst`).
    pub fn route(&self, requested: &str) -> Option<&ToolDescriptor> {
        let lowered = requested.to_ascii_lowercase();
        let rules: [(ToolKind, &str); 2] = [
            (ToolKind::Search, "search"),
            (ToolKind::Analyst, "analyst"),
        ];
        for (kind, token) in rules {
            let matched = self
                .descriptors
                .iter()
                .find(|d| d.kind == kind && (d.name == requested || lowered.contains(token)));
            if matched.is_some() {
                return matched;
            }
        }
        self.descriptors
            .iter()
            .find(|d| d.kind == ToolKind::Generic && d.name == requested)
    }

    /// Descriptions attached to the bound model. Every tool takes a single
    /// `query` string.
    pub fn describe(&self) -> Vec<ToolDescription> {
        self.descriptors
            .iter()
            .map(|d| ToolDescription {
                name: d.name.clone(),
                description: d.description.clone(),
                parameters: json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"],
                }),
            })
            .collect()
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

async fn resolve(
    platform: &dyn Platform,
    listed: &[ToolInfo],
    name: &str,
) -> Result<Arc<dyn DomainTool>> {
    let info = listed
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
    platform.tool_handle(&info.id).await
}

/// Scripted tool that replies with a fixed text and records the queries
/// it received.
#[derive(Default)]
pub struct StubDomainTool {
    reply: String,
    queries: Mutex<Vec<String>>,
}

impl StubDomainTool {
    pub fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DomainTool for StubDomainTool {
    async fn run(&self, query: &str) -> Result<String> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.reply.clone())
    }
}
