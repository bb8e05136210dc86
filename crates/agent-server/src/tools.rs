//! Built-in Local Tools

use agent_core::{AgentError, ParameterSchema, Result, SessionId, Tool, ToolCall, ToolSchema};
use async_trait::async_trait;
use serde_json::json;

/// Current date and time
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "current_time".into(),
            description: "Get the current date and time in UTC".into(),
            parameters: vec![
                ParameterSchema::new("format", "string", "Output format: 'iso', 'human', or 'unix'")
                    .with_default(json!("human"))
                    .with_enum(vec![json!("iso"), json!("human"), json!("unix")]),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, _session: &SessionId) -> Result<String> {
        let now = chrono::Utc::now();

        match call.str_arg("format").unwrap_or("human") {
            "iso" => Ok(now.to_rfc3339()),
            "unix" => Ok(now.timestamp().to_string()),
            "human" => Ok(now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string()),
            other => Err(AgentError::ToolValidation(format!("unknown format '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolRegistry;

    #[tokio::test]
    async fn test_formats() {
        let registry = ToolRegistry::builder().tool(CurrentTimeTool).build();
        let id = SessionId::default();

        let unix = registry.dispatch("current_time", r#"{"format":"unix"}"#, &id).await.unwrap();
        assert!(unix.parse::<i64>().is_ok(), "{unix}");

        let human = registry.dispatch("current_time", "", &id).await.unwrap();
        assert!(human.ends_with("UTC"), "{human}");

        let bad = registry.dispatch("current_time", r#"{"format":"roman"}"#, &id).await.unwrap();
        assert!(bad.starts_with("Error: "));
    }
}
