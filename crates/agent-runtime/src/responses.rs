//! Responses API Provider
//!
//! Implementation of `ModelService` for OpenAI-compatible Responses endpoints.
//! Turns are stored server-side (`store: true`) so the returned response id
//! can be used as the continuation reference.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    service::{ModelService, OutputItem, TurnRequest, TurnResult},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://ai.api.cloud.yandex.net/v1";

/// Responses provider configuration
#[derive(Clone, Debug)]
pub struct ResponsesConfig {
    /// API root, without the trailing `/responses`
    pub base_url: String,

    /// Bearer key
    pub api_key: Option<String>,

    /// Project / folder the key belongs to
    pub project: Option<String>,

    /// Model identifier sent with every turn
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ResponsesConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            project: None,
            model: String::new(),
            timeout_secs: 120,
        }
    }
}

impl ResponsesConfig {
    /// Read `MODEL_BASE_URL`, `MODEL_API_KEY`, `MODEL_PROJECT`, `MODEL_NAME`
    /// and `MODEL_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let project = var("MODEL_PROJECT");
        let model = var("MODEL_NAME")
            .or_else(|| project.as_deref().map(Self::model_uri))
            .ok_or_else(|| AgentError::Config("set MODEL_NAME or MODEL_PROJECT".into()))?;
        let timeout_secs = match var("MODEL_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .map_err(|_| AgentError::Config(format!("MODEL_TIMEOUT_SECS is not a number: {raw}")))?,
            None => Self::default().timeout_secs,
        };

        Ok(Self {
            base_url: var("MODEL_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            api_key: var("MODEL_API_KEY"),
            project,
            model,
            timeout_secs,
        })
    }

    /// Default model URI for a Yandex Cloud folder
    pub fn model_uri(project: &str) -> String {
        format!("gpt://{project}/yandexgpt/rc")
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url.trim_end_matches('/'))
    }
}

/// Responses API model service
pub struct ResponsesProvider {
    client: Client,
    config: ResponsesConfig,
}

impl ResponsesProvider {
    /// Create from configuration
    pub fn from_config(config: ResponsesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(ResponsesConfig::from_env()?)
    }

    pub const fn config(&self) -> &ResponsesConfig {
        &self.config
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    store: bool,
    #[serde(flatten)]
    turn: &'a TurnRequest,
}

#[derive(Deserialize)]
struct ResponseBody {
    id: String,
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    output_text: Option<String>,
}

/// Convert a raw response body into a turn result
fn parse_response(body: Value) -> Result<TurnResult> {
    let body: ResponseBody =
        serde_json::from_value(body).map_err(|e| AgentError::Service(format!("unexpected response body: {e}")))?;

    let output = body
        .output
        .iter()
        .map(|item| {
            OutputItem::deserialize(item)
                .map_err(|e| AgentError::Service(format!("unexpected output item {item}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let output_text = body
        .output_text
        .unwrap_or_else(|| collect_output_text(&body.output));

    Ok(TurnResult {
        id: body.id,
        output,
        output_text,
    })
}

/// Join the `output_text` parts of every message item
fn collect_output_text(output: &[Value]) -> String {
    output
        .iter()
        .filter(|item| item["type"] == "message")
        .filter_map(|item| item["content"].as_array())
        .flatten()
        .filter(|part| part["type"] == "output_text")
        .filter_map(|part| part["text"].as_str())
        .collect()
}

fn status_error(status: StatusCode, body: &str) -> AgentError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(format!("{status}: {body}")),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(body.to_owned()),
        _ => AgentError::Service(format!("{status}: {body}")),
    }
}

fn transport_error(e: &reqwest::Error) -> AgentError {
    if e.is_timeout() || e.is_connect() {
        AgentError::ServiceUnavailable(e.to_string())
    } else {
        AgentError::Service(e.to_string())
    }
}

#[async_trait]
impl ModelService for ResponsesProvider {
    async fn create_turn(&self, request: &TurnRequest) -> Result<TurnResult> {
        let body = RequestBody {
            model: &self.config.model,
            store: true,
            turn: request,
        };

        let mut req = self.client.post(self.config.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(project) = &self.config.project {
            req = req.header("OpenAI-Project", project);
        }

        let response = req.send().await.map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "Responses API call failed");
            return Err(status_error(status, &text));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Service(format!("undecodable response: {e}")))?;
        let turn = parse_response(raw)?;

        tracing::debug!(response = %turn.id, items = turn.output.len(), "Responses API turn");
        Ok(turn)
    }
}
