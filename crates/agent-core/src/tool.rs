//! Tool System
//!
//! Tools come in two kinds. Local tools run in-process and are dispatched by
//! name. Remote tools are declarations (web search, file search, MCP servers)
//! executed entirely by the model service; they are only forwarded.
//!
//! A [`ToolRegistry`] resolves a mixed list once into the manifest sent to the
//! service and the dispatch table used for local calls.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::session::SessionId;

/// Parsed local tool call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Parse the raw JSON argument string sent by the model service.
    ///
    /// Absent or blank arguments yield an empty map.
    pub fn parse(name: impl Into<String>, arguments: &str) -> Result<Self> {
        let name = name.into();
        let arguments = if arguments.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(arguments) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(AgentError::ToolValidation(format!(
                        "arguments must be a JSON object, got {other}"
                    )));
                }
                Err(e) => {
                    return Err(AgentError::ToolValidation(format!(
                        "malformed arguments: {e}"
                    )));
                }
            }
        };

        Ok(Self { name, arguments })
    }

    /// Deserialize the arguments into a typed parameter struct
    pub fn args<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.arguments.clone()))
            .map_err(|e| AgentError::ToolValidation(e.to_string()))
    }

    /// String argument lookup
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn new(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            default: None,
            enum_values: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Local tool declaration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier, also the dispatch key
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// JSON Schema object describing the declared parameters
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type));
            prop.insert("description".into(), json!(param.description));
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));

            if param.required {
                required.push(json!(param.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Manifest entry advertised to the model service
    pub fn manifest_entry(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name,
            "description": self.description,
            "parameters": self.json_schema(),
        })
    }
}

/// Tool trait - implement to add a local capability
///
/// Failures returned from `validate` or `execute` never abort a conversation:
/// the registry turns them into the tool's textual output.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's declaration
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments
    async fn execute(&self, call: &ToolCall, session: &SessionId) -> Result<String>;

    /// Validate arguments before execution (optional)
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && !call.arguments.contains_key(&param.name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Approval policy for MCP tool servers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    Always,
    Never,
}

/// Declarative tool executed by the model service.
///
/// Always a JSON object carrying a string `type` tag; everything else is
/// provider-specific and forwarded untouched.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RemoteTool(Value);

impl RemoteTool {
    pub fn new(raw: Value) -> Result<Self> {
        match raw.get("type") {
            Some(Value::String(_)) => Ok(Self(raw)),
            _ => Err(AgentError::InvalidToolSpec(format!(
                "remote tool needs a string \"type\" field: {raw}"
            ))),
        }
    }

    /// Internet search
    pub fn web_search() -> Self {
        Self(json!({ "type": "web_search" }))
    }

    /// Search over one or more vector stores
    pub fn file_search<S: Into<String>>(
        vector_store_ids: impl IntoIterator<Item = S>,
        max_num_results: Option<u32>,
    ) -> Self {
        let ids: Vec<String> = vector_store_ids.into_iter().map(Into::into).collect();
        let mut raw = json!({ "type": "file_search", "vector_store_ids": ids });
        if let Some(max) = max_num_results {
            raw["max_num_results"] = json!(max);
        }
        Self(raw)
    }

    /// Remote MCP tool server
    pub fn mcp(server_label: &str, server_url: &str, require_approval: ApprovalPolicy) -> Self {
        Self(json!({
            "type": "mcp",
            "server_label": server_label,
            "server_url": server_url,
            "require_approval": require_approval,
        }))
    }

    /// The type tag
    pub fn kind(&self) -> &str {
        self.0.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    pub const fn raw(&self) -> &Value {
        &self.0
    }
}

impl TryFrom<Value> for RemoteTool {
    type Error = AgentError;

    fn try_from(raw: Value) -> Result<Self> {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for RemoteTool {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// A tool declaration handed to the registry
#[derive(Clone)]
pub enum ToolSpec {
    Local(Arc<dyn Tool>),
    Remote(RemoteTool),
}

impl ToolSpec {
    pub fn local<T: Tool + 'static>(tool: T) -> Self {
        Self::Local(Arc::new(tool))
    }

    pub fn remote(tool: RemoteTool) -> Self {
        Self::Remote(tool)
    }
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(tool) => f.debug_tuple("Local").field(&tool.schema().name).finish(),
            Self::Remote(tool) => f.debug_tuple("Remote").field(&tool.kind()).finish(),
        }
    }
}

/// Ordered tool declarations sent to the model service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Vec<Value>);

impl Manifest {
    pub fn entries(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Manifest plus dispatch table, built once from a list of [`ToolSpec`]s
#[derive(Default)]
pub struct ToolRegistry {
    manifest: Manifest,
    tools: HashMap<String, Arc<dyn Tool>>,
    // manifest index of each local tool, so a re-registration replaces in place
    positions: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Resolve a list of declarations.
    ///
    /// A local tool registered under a name already taken replaces the earlier
    /// one, both in the manifest and in the dispatch table.
    pub fn new(specs: impl IntoIterator<Item = ToolSpec>) -> Self {
        let mut registry = Self::default();
        for spec in specs {
            registry.insert(spec);
        }
        registry
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    fn insert(&mut self, spec: ToolSpec) {
        match spec {
            ToolSpec::Local(tool) => {
                let schema = tool.schema();
                let entry = schema.manifest_entry();

                if let Some(&idx) = self.positions.get(&schema.name) {
                    tracing::warn!(tool = %schema.name, "Duplicate tool name, replacing earlier registration");
                    self.manifest.0[idx] = entry;
                } else {
                    self.positions.insert(schema.name.clone(), self.manifest.0.len());
                    self.manifest.0.push(entry);
                }
                self.tools.insert(schema.name, tool);
            }
            ToolSpec::Remote(tool) => {
                tracing::debug!(kind = %tool.kind(), "Registered remote tool");
                self.manifest.0.push(tool.0);
            }
        }
    }

    /// Tool declarations to advertise, in registration order
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Whether `name` is executed locally
    pub fn is_local(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Run a local tool call.
    ///
    /// Argument or handler failures come back as `Ok("Error: ...")` so the
    /// model can see what went wrong. The only `Err` is [`AgentError::UnknownTool`].
    pub async fn dispatch(&self, name: &str, arguments: &str, session: &SessionId) -> Result<String> {
        let Some(tool) = self.tools.get(name) else {
            tracing::error!(tool = %name, "Function call for a tool missing from the dispatch table");
            return Err(AgentError::UnknownTool(name.to_owned()));
        };

        let outcome = match ToolCall::parse(name, arguments) {
            Ok(call) => match tool.validate(&call) {
                Ok(()) => tool.execute(&call, session).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        Ok(outcome.unwrap_or_else(|e| {
            tracing::warn!(tool = %name, error = %e, "Tool failed");
            format!("Error: {e}")
        }))
    }

    /// Local tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of manifest entries
    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }
}

/// Fluent construction of a [`ToolRegistry`]
#[derive(Default)]
pub struct ToolRegistryBuilder {
    specs: Vec<ToolSpec>,
}

impl ToolRegistryBuilder {
    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.specs.push(ToolSpec::local(tool));
        self
    }

    #[must_use]
    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.specs.push(ToolSpec::Local(tool));
        self
    }

    #[must_use]
    pub fn remote(mut self, tool: RemoteTool) -> Self {
        self.specs.push(ToolSpec::Remote(tool));
        self
    }

    #[must_use]
    pub fn remotes(mut self, tools: impl IntoIterator<Item = RemoteTool>) -> Self {
        self.specs.extend(tools.into_iter().map(ToolSpec::Remote));
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry::new(self.specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WeatherTool;

    #[derive(Deserialize)]
    struct WeatherArgs {
        city: String,
    }

    #[async_trait]
    impl Tool for WeatherTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "Weather".into(),
                description: "Current weather for a city".into(),
                parameters: vec![ParameterSchema::new("city", "string", "City name").required()],
            }
        }

        async fn execute(&self, call: &ToolCall, _session: &SessionId) -> Result<String> {
            let args: WeatherArgs = call.args()?;
            Ok(format!("15°C in {}", args.city))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "broken".into(),
                description: "Always fails".into(),
                parameters: Vec::new(),
            }
        }

        async fn execute(&self, _call: &ToolCall, _session: &SessionId) -> Result<String> {
            Err(AgentError::ToolExecution("backend down".into()))
        }
    }

    struct WhoAmI(&'static str);

    #[async_trait]
    impl Tool for WhoAmI {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "whoami".into(),
                description: self.0.into(),
                parameters: Vec::new(),
            }
        }

        async fn execute(&self, _call: &ToolCall, session: &SessionId) -> Result<String> {
            Ok(format!("{}:{session}", self.0))
        }
    }

    #[test]
    fn test_manifest_shapes_and_order() {
        let registry = ToolRegistry::builder()
            .remote(RemoteTool::web_search())
            .tool(WeatherTool)
            .remote(RemoteTool::file_search(["vs_1"], Some(5)))
            .remote(RemoteTool::mcp("Notes", "http://localhost:8000/mcp", ApprovalPolicy::Never))
            .build();

        let entries = registry.manifest().entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], json!({"type": "web_search"}));
        assert_eq!(entries[1]["type"], "function");
        assert_eq!(entries[1]["name"], "Weather");
        assert_eq!(entries[1]["parameters"]["required"], json!(["city"]));
        assert_eq!(entries[1]["parameters"]["properties"]["city"]["type"], "string");
        assert_eq!(entries[2]["vector_store_ids"], json!(["vs_1"]));
        assert_eq!(entries[2]["max_num_results"], 5);
        assert_eq!(entries[3]["require_approval"], "never");

        assert!(registry.is_local("Weather"));
        assert!(!registry.is_local("web_search"));
        assert_eq!(registry.names(), vec!["Weather"]);
    }

    #[test]
    fn test_remote_passes_through_verbatim() {
        let raw = json!({"type": "mcp", "server_url": "http://x", "headers": {"k": "v"}});
        let registry = ToolRegistry::new([ToolSpec::remote(RemoteTool::new(raw.clone()).unwrap())]);
        assert_eq!(registry.manifest().entries(), &[raw]);
    }

    #[test]
    fn test_remote_requires_type_tag() {
        assert!(matches!(
            RemoteTool::new(json!({"server_url": "http://x"})),
            Err(AgentError::InvalidToolSpec(_))
        ));
        assert!(RemoteTool::new(json!({"type": 3})).is_err());
        assert!(serde_json::from_value::<RemoteTool>(json!(["web_search"])).is_err());

        let parsed: Vec<RemoteTool> =
            serde_json::from_value(json!([{"type": "web_search"}])).unwrap();
        assert_eq!(parsed[0].kind(), "web_search");
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::new(Vec::new());
        assert!(registry.is_empty());
        assert!(registry.manifest().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_replaces_earlier() {
        let registry = ToolRegistry::builder()
            .tool(WhoAmI("first"))
            .remote(RemoteTool::web_search())
            .tool(WhoAmI("second"))
            .build();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.manifest().entries()[0]["description"], "second");

        let out = registry.dispatch("whoami", "", &SessionId::new("s")).await.unwrap();
        assert_eq!(out, "second:s");
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let registry = ToolRegistry::builder().tool(WeatherTool).build();
        let out = registry
            .dispatch("Weather", r#"{"city":"Paris"}"#, &SessionId::default())
            .await
            .unwrap();
        assert_eq!(out, "15°C in Paris");
    }

    #[tokio::test]
    async fn test_dispatch_is_repeatable() {
        let registry = ToolRegistry::builder().tool(WeatherTool).build();
        let id = SessionId::default();
        let first = registry.dispatch("Weather", r#"{"city":"Oslo"}"#, &id).await.unwrap();
        let second = registry.dispatch("Weather", r#"{"city":"Oslo"}"#, &id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_dispatch_failures_become_text() {
        let registry = ToolRegistry::builder().tool(WeatherTool).tool(BrokenTool).build();
        let id = SessionId::default();

        let missing = registry.dispatch("Weather", "", &id).await.unwrap();
        assert!(missing.starts_with("Error: "), "{missing}");
        assert!(missing.contains("city"));

        let malformed = registry.dispatch("Weather", "{city:", &id).await.unwrap();
        assert!(malformed.starts_with("Error: "), "{malformed}");

        let not_object = registry.dispatch("Weather", "[1, 2]", &id).await.unwrap();
        assert!(not_object.starts_with("Error: "), "{not_object}");

        let wrong_type = registry.dispatch("Weather", r#"{"city": 7}"#, &id).await.unwrap();
        assert!(wrong_type.starts_with("Error: "), "{wrong_type}");

        let broken = registry.dispatch("broken", "", &id).await.unwrap();
        assert_eq!(broken, "Error: Tool execution error: backend down");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_is_fault() {
        let registry = ToolRegistry::builder().tool(WeatherTool).build();
        let err = registry
            .dispatch("Nope", "{}", &SessionId::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "Nope"));
    }

    #[test]
    fn test_parse_blank_arguments() {
        let call = ToolCall::parse("x", "   ").unwrap();
        assert!(call.arguments.is_empty());
        assert!(call.str_arg("anything").is_none());
    }
}
