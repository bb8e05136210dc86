//! Model Service Interface
//!
//! The remote endpoint that runs one conversation turn. The engine only sees
//! this trait; transports live in `agent-runtime`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::service::{ModelService, TurnRequest};
//!
//! let turn = service.create_turn(&TurnRequest::text("You are helpful.", "Hi")).await?;
//! println!("{}", turn.output_text);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tool::Manifest;

/// Tool-choice policy; only meaningful alongside a non-empty manifest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
    None,
}

impl std::str::FromStr for ToolChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "required" => Ok(Self::Required),
            "none" => Ok(Self::None),
            other => Err(format!("unknown tool choice '{other}' (expected auto, required or none)")),
        }
    }
}

/// Item sent back to the service in a follow-up turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    /// Output of a local tool call
    FunctionCallOutput { call_id: String, output: String },

    /// Resolution of a remote tool approval gate
    McpApprovalResponse {
        approval_request_id: String,
        approve: bool,
    },
}

/// Turn input: the user's text, or items answering the previous turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnInput {
    Text(String),
    Items(Vec<InputItem>),
}

/// One request to the model service
#[derive(Clone, Debug, Serialize)]
pub struct TurnRequest {
    pub instructions: String,

    /// Tool manifest; absent when no tools are registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Manifest>,

    /// Never set without a manifest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Continuation reference of the turn being answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,

    pub input: TurnInput,
}

impl TurnRequest {
    /// A tool-less text turn
    pub fn text(instructions: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            tools: None,
            tool_choice: None,
            previous_response_id: None,
            input: TurnInput::Text(input.into()),
        }
    }

    /// Input items, if this is a follow-up turn
    pub fn items(&self) -> &[InputItem] {
        match &self.input {
            TurnInput::Items(items) => items,
            TurnInput::Text(_) => &[],
        }
    }
}

/// Output item of a turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    /// Request to run a function tool
    FunctionCall {
        name: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        arguments: String,
        call_id: String,
    },

    /// Pending authorization gate for a remote tool
    #[serde(rename = "mcp_approval_request")]
    ApprovalRequest { id: String },

    /// Messages, reasoning, remote tool traces and anything else
    #[serde(other)]
    Other,
}

// Providers send `"arguments": null` for parameterless calls.
fn null_as_empty<'de, D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Result of one turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    /// Continuation reference for the next turn
    pub id: String,

    #[serde(default)]
    pub output: Vec<OutputItem>,

    /// Concatenated text output
    #[serde(default)]
    pub output_text: String,
}

impl TurnResult {
    /// Final-text-only result
    pub fn text(id: impl Into<String>, output_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            output: Vec::new(),
            output_text: output_text.into(),
        }
    }

    #[must_use]
    pub fn with_item(mut self, item: OutputItem) -> Self {
        self.output.push(item);
        self
    }

    /// Function calls in service order
    pub fn function_calls(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.output.iter().filter_map(|item| match item {
            OutputItem::FunctionCall { name, arguments, call_id } => {
                Some((name.as_str(), arguments.as_str(), call_id.as_str()))
            }
            _ => None,
        })
    }

    /// Pending approval request ids in service order
    pub fn approval_requests(&self) -> impl Iterator<Item = &str> {
        self.output.iter().filter_map(|item| match item {
            OutputItem::ApprovalRequest { id } => Some(id.as_str()),
            _ => None,
        })
    }
}

/// The remote model endpoint
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Run one turn
    async fn create_turn(&self, request: &TurnRequest) -> Result<TurnResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_absent_fields() {
        let request = TurnRequest::text("Be brief.", "Hi");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({"instructions": "Be brief.", "input": "Hi"}));
    }

    #[test]
    fn test_input_items_wire_format() {
        let input = TurnInput::Items(vec![
            InputItem::FunctionCallOutput { call_id: "c1".into(), output: "ok".into() },
            InputItem::McpApprovalResponse { approval_request_id: "a1".into(), approve: true },
        ]);
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!([
                {"type": "function_call_output", "call_id": "c1", "output": "ok"},
                {"type": "mcp_approval_response", "approval_request_id": "a1", "approve": true},
            ])
        );
    }

    #[test]
    fn test_output_items_parse() {
        let items: Vec<OutputItem> = serde_json::from_value(json!([
            {"type": "function_call", "name": "Weather", "arguments": "{}", "call_id": "c1", "id": "fc_1"},
            {"type": "function_call", "name": "now", "call_id": "c2"},
            {"type": "function_call", "name": "now", "arguments": null, "call_id": "c3"},
            {"type": "mcp_approval_request", "id": "a1", "server_label": "Notes", "name": "add"},
            {"type": "message", "role": "assistant", "content": []},
            {"type": "web_search_call", "status": "completed"},
        ]))
        .unwrap();

        assert_eq!(
            items[0],
            OutputItem::FunctionCall { name: "Weather".into(), arguments: "{}".into(), call_id: "c1".into() }
        );
        assert!(matches!(&items[1], OutputItem::FunctionCall { arguments, .. } if arguments.is_empty()));
        assert!(matches!(&items[2], OutputItem::FunctionCall { arguments, .. } if arguments.is_empty()));
        assert_eq!(items[3], OutputItem::ApprovalRequest { id: "a1".into() });
        assert_eq!(items[4], OutputItem::Other);
        assert_eq!(items[5], OutputItem::Other);
    }

    #[test]
    fn test_tool_choice_from_str() {
        assert_eq!("Required".parse::<ToolChoice>().unwrap(), ToolChoice::Required);
        assert_eq!(" none ".parse::<ToolChoice>().unwrap(), ToolChoice::None);
        assert!("sometimes".parse::<ToolChoice>().is_err());
        assert_eq!(ToolChoice::default(), ToolChoice::Auto);
    }
}
