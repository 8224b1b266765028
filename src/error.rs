use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool `{0}` not found on the platform")]
    ToolNotFound(String),

    #[error("tool `{name}` invocation failed: {source}")]
    ToolInvocation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no model matching `{0}` is available")]
    ModelNotFound(String),

    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("reached the limit of {0} iterations without a final answer")]
    IterationLimit(usize),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
