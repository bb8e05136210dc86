//! Conversation Engine
//!
//! Drives one user message through a bounded exchange with the model service:
//!
//! ```text
//! Start ──▶ ModelCall ──▶ LocalDispatch ────┐
//!              ▲    │                        │
//!              │    ├──▶ ApprovalResolve ───┤
//!              │    │                        │
//!              │    └──▶ Done                │
//!              └─────────────────────────────┘
//! ```
//!
//! Local function calls win over approval requests when a turn carries both.
//! At most [`MAX_ROUND_TRIPS`] follow-up turns are issued per message.

use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::service::{InputItem, ModelService, ToolChoice, TurnInput, TurnRequest, TurnResult};
use crate::session::{MemorySessionStore, SessionId, SessionStore};
use crate::tool::{Manifest, ToolRegistry};

/// Follow-up turns allowed per message
pub const MAX_ROUND_TRIPS: usize = 10;

const ARGS_LOG_LIMIT: usize = 50;

const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant. \
Use the available tools when they help answer the question, \
and explain tool errors to the user when they cannot be worked around. \
Be concise and accurate.";

/// Engine configuration
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Instructions sent with every turn
    pub instructions: String,

    /// Tool-choice policy for the first turn of a message
    pub tool_choice: ToolChoice,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.into(),
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// Outcome of [`ConversationEngine::send`]
#[derive(Clone, Debug)]
pub struct Reply {
    /// The last turn returned by the service
    pub turn: TurnResult,

    /// Follow-up turns issued after the first one
    pub round_trips: usize,

    /// The loop stopped at [`MAX_ROUND_TRIPS`] with actions still pending
    pub bound_reached: bool,
}

impl Reply {
    pub fn final_text(&self) -> &str {
        &self.turn.output_text
    }

    /// Total model service calls made for this message
    pub const fn service_calls(&self) -> usize {
        self.round_trips + 1
    }
}

/// What the latest turn asks for
enum Pending<'a> {
    LocalCalls(Vec<LocalCall<'a>>),
    Approvals(Vec<&'a str>),
    Terminal,
}

struct LocalCall<'a> {
    name: &'a str,
    arguments: &'a str,
    call_id: &'a str,
}

/// Answer to a pending action, sent as the next turn's input
enum ActionOutcome {
    ToolOutputs(Vec<InputItem>),
    ApprovalResponses(Vec<InputItem>),
}

impl ActionOutcome {
    fn into_input(self) -> TurnInput {
        match self {
            Self::ToolOutputs(items) | Self::ApprovalResponses(items) => TurnInput::Items(items),
        }
    }
}

/// Turn loop over a model service, a tool registry and a session store
pub struct ConversationEngine {
    service: Arc<dyn ModelService>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<dyn SessionStore>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(
        service: Arc<dyn ModelService>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            service,
            tools,
            sessions,
            config,
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Process one user message.
    ///
    /// Tool failures are reported to the service as tool output and never fail
    /// the call. A service error aborts it and leaves the session untouched.
    pub async fn send(&self, message: &str, session_id: &SessionId) -> Result<Reply> {
        // Read only; the session is created by the commit below.
        let continuation = self.sessions.get(session_id).and_then(|s| s.continuation);
        let manifest = self.manifest();

        tracing::debug!(
            session = %session_id,
            resumed = continuation.is_some(),
            tools = manifest.as_ref().map_or(0, Manifest::len),
            "Sending message"
        );

        let first = TurnRequest {
            instructions: self.config.instructions.clone(),
            tool_choice: manifest.as_ref().map(|_| self.config.tool_choice),
            tools: manifest.clone(),
            previous_response_id: continuation,
            input: TurnInput::Text(message.to_owned()),
        };
        let mut turn = self.service.create_turn(&first).await?;

        let mut round_trips = 0;
        let mut bound_reached = false;

        loop {
            let outcome = match self.classify(&turn) {
                Pending::Terminal => break,
                _ if round_trips >= MAX_ROUND_TRIPS => {
                    tracing::warn!(
                        session = %session_id,
                        max = MAX_ROUND_TRIPS,
                        "Round-trip bound reached, dropping pending actions"
                    );
                    bound_reached = true;
                    break;
                }
                Pending::LocalCalls(calls) => {
                    ActionOutcome::ToolOutputs(self.run_local_calls(&calls, session_id).await?)
                }
                Pending::Approvals(ids) => {
                    tracing::info!(count = ids.len(), "Auto-approving remote tool requests");
                    ActionOutcome::ApprovalResponses(
                        ids.into_iter()
                            .map(|id| InputItem::McpApprovalResponse {
                                approval_request_id: id.to_owned(),
                                approve: true,
                            })
                            .collect(),
                    )
                }
            };

            let follow_up = TurnRequest {
                instructions: self.config.instructions.clone(),
                tools: manifest.clone(),
                tool_choice: None,
                previous_response_id: Some(turn.id.clone()),
                input: outcome.into_input(),
            };
            turn = self.service.create_turn(&follow_up).await?;
            round_trips += 1;

            tracing::debug!(session = %session_id, round_trips, response = %turn.id, "Follow-up turn completed");
        }

        self.sessions.append_user(session_id, message);
        self.sessions.set_continuation(session_id, &turn.id);
        self.sessions.append_assistant(session_id, &turn.output_text);

        Ok(Reply {
            turn,
            round_trips,
            bound_reached,
        })
    }

    /// Ordered history for a session; empty if unknown
    pub fn history(&self, session_id: &SessionId) -> Vec<Message> {
        self.sessions.history(session_id)
    }

    /// Forget a session
    pub fn reset(&self, session_id: &SessionId) {
        self.sessions.reset(session_id);
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn manifest(&self) -> Option<Manifest> {
        let manifest = self.tools.manifest();
        (!manifest.is_empty()).then(|| manifest.clone())
    }

    fn classify<'a>(&self, turn: &'a TurnResult) -> Pending<'a> {
        let calls: Vec<LocalCall<'a>> = turn
            .function_calls()
            .filter(|(name, _, _)| self.tools.is_local(name))
            .map(|(name, arguments, call_id)| LocalCall { name, arguments, call_id })
            .collect();
        if !calls.is_empty() {
            return Pending::LocalCalls(calls);
        }

        let approvals: Vec<&str> = turn.approval_requests().collect();
        if !approvals.is_empty() {
            return Pending::Approvals(approvals);
        }

        Pending::Terminal
    }

    // One at a time, in service order: a later call may depend on an earlier error.
    async fn run_local_calls(&self, calls: &[LocalCall<'_>], session_id: &SessionId) -> Result<Vec<InputItem>> {
        let mut outputs = Vec::with_capacity(calls.len());

        for call in calls {
            tracing::info!(tool = %call.name, args = %preview(call.arguments), "Executing tool");

            let output = self.tools.dispatch(call.name, call.arguments, session_id).await?;
            outputs.push(InputItem::FunctionCallOutput {
                call_id: call.call_id.to_owned(),
                output,
            });
        }

        Ok(outputs)
    }
}

fn preview(arguments: &str) -> String {
    if arguments.chars().count() > ARGS_LOG_LIMIT {
        let head: String = arguments.chars().take(ARGS_LOG_LIMIT).collect();
        format!("{head}...")
    } else {
        arguments.to_owned()
    }
}

/// Builder for [`ConversationEngine`]
pub struct EngineBuilder {
    service: Option<Arc<dyn ModelService>>,
    tools: ToolRegistry,
    sessions: Option<Arc<dyn SessionStore>>,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            service: None,
            tools: ToolRegistry::default(),
            sessions: None,
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub fn service(mut self, service: Arc<dyn ModelService>) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = instructions.into();
        self
    }

    #[must_use]
    pub const fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.config.tool_choice = choice;
        self
    }

    pub fn build(self) -> Result<ConversationEngine> {
        let service = self
            .service
            .ok_or_else(|| AgentError::Config("Model service is required".into()))?;
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));

        Ok(ConversationEngine::new(
            service,
            Arc::new(self.tools),
            sessions,
            self.config,
        ))
    }
}
