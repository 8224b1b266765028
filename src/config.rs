use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Platform connection the Cortex tools are provisioned on.
    #[serde(default = "default_connection")]
    pub connection: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            connection: default_connection(),
        }
    }
}

fn default_connection() -> String {
    "snowflake_cortex".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Case-insensitive substring matched against platform model names.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Display names of the two well-known platform tools.
    #[serde(default = "default_search_tool")]
    pub search_tool: String,
    #[serde(default = "default_analyst_tool")]
    pub analyst_tool: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_messages: default_max_messages(),
            max_iterations: default_max_iterations(),
            search_tool: default_search_tool(),
            analyst_tool: default_analyst_tool(),
        }
    }
}

fn default_model() -> String {
    "claude-3-5-sonnet".into()
}

fn default_max_messages() -> usize {
    20
}

fn default_max_iterations() -> usize {
    6
}

fn default_search_tool() -> String {
    "Snowflake Cortex Search".into()
}

fn default_analyst_tool() -> String {
    "Snowflake Cortex Analyst".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)
            .map_err(|err| AgentError::Protocol(format!("failed to parse configuration: {err}")))?;
        Ok(cfg)
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        if let Ok(host) = env::var("INSIGHTS_HOST") {
            cfg.server.host = host;
        }
        if let Ok(port) = env::var("INSIGHTS_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                cfg.server.port = parsed;
            }
        }
        if let Ok(url) = env::var("INSIGHTS_BASE_URL") {
            cfg.platform.base_url = url;
        }
        if let Ok(key) = env::var("INSIGHTS_API_KEY") {
            cfg.platform.api_key = Some(key);
        }
        if let Ok(connection) = env::var("INSIGHTS_CONNECTION") {
            cfg.platform.connection = connection;
        }
        if let Ok(model) = env::var("INSIGHTS_MODEL") {
            cfg.agent.model = model;
        }
        if let Ok(max) = env::var("INSIGHTS_MAX_MESSAGES") {
            if let Ok(parsed) = max.parse::<usize>() {
                cfg.agent.max_messages = parsed.max(1);
            }
        }
        if let Ok(max) = env::var("INSIGHTS_MAX_ITERATIONS") {
            if let Ok(parsed) = max.parse::<usize>() {
                cfg.agent.max_iterations = parsed.max(1);
            }
        }
        Ok(cfg)
    }
}
