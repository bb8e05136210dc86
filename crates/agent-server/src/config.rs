//! Server Configuration
//!
//! Read from the environment (after `.env` is loaded).

use std::path::{Path, PathBuf};

use agent_core::{RemoteTool, ToolChoice};
use anyhow::Context;

/// Server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (`BIND_ADDR`)
    pub bind_addr: String,

    /// Engine instructions override (`AGENT_INSTRUCTIONS`)
    pub instructions: Option<String>,

    /// First-turn tool choice (`AGENT_TOOL_CHOICE`)
    pub tool_choice: ToolChoice,

    /// JSON file with remote tool declarations (`AGENT_REMOTE_TOOLS`)
    pub remote_tools: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            instructions: None,
            tool_choice: ToolChoice::Auto,
            remote_tools: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let tool_choice = match var("AGENT_TOOL_CHOICE") {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
            None => defaults.tool_choice,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            instructions: var("AGENT_INSTRUCTIONS"),
            tool_choice,
            remote_tools: var("AGENT_REMOTE_TOOLS").map(PathBuf::from),
        })
    }

    /// Remote tool declarations from the configured file, if any
    pub fn load_remote_tools(&self) -> anyhow::Result<Vec<RemoteTool>> {
        self.remote_tools
            .as_deref()
            .map_or_else(|| Ok(Vec::new()), load_remote_tools)
    }
}

fn load_remote_tools(path: &Path) -> anyhow::Result<Vec<RemoteTool>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading remote tools from {}", path.display()))?;
    parse_remote_tools(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Parse a JSON array of remote tool declarations
pub fn parse_remote_tools(raw: &str) -> anyhow::Result<Vec<RemoteTool>> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.tool_choice, ToolChoice::Auto);
        assert!(config.load_remote_tools().unwrap().is_empty());
    }

    #[test]
    fn test_parse_remote_tools() {
        let tools = parse_remote_tools(
            r#"[
                {"type": "web_search", "search_context_size": "medium"},
                {"type": "file_search", "vector_store_ids": ["vs_1"], "max_num_results": 5},
                {"type": "mcp", "server_url": "http://localhost:8000/mcp", "server_label": "Notes", "require_approval": "never"}
            ]"#,
        )
        .unwrap();

        let kinds: Vec<&str> = tools.iter().map(RemoteTool::kind).collect();
        assert_eq!(kinds, vec!["web_search", "file_search", "mcp"]);
    }

    #[test]
    fn test_parse_rejects_untyped_entries() {
        assert!(parse_remote_tools(r#"[{"server_url": "http://x"}]"#).is_err());
        assert!(parse_remote_tools("{}").is_err());
    }
}
