//! # agent-core
//!
//! Tool-calling conversation engine with a provider-agnostic model service
//! abstraction.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ConversationEngine                        │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │  Turn Loop  │──│ ToolRegistry │  │   ModelService      │  │
//! │  │ (≤10 trips) │──│ SessionStore │──│   (Strategy)        │  │
//! │  └─────────────┘  └──────────────┘  └─────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Local tools run in-process and are dispatched by name; remote tools
//! (web search, file search, MCP servers) are forwarded to the service, and
//! their approval requests are granted automatically.

pub mod engine;
pub mod error;
pub mod message;
pub mod service;
pub mod session;
pub mod tool;

pub use engine::{ConversationEngine, EngineBuilder, EngineConfig, MAX_ROUND_TRIPS, Reply};
pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use service::{InputItem, ModelService, OutputItem, ToolChoice, TurnInput, TurnRequest, TurnResult};
pub use session::{MemorySessionStore, Session, SessionId, SessionStore};
pub use tool::{
    ApprovalPolicy, Manifest, ParameterSchema, RemoteTool, Tool, ToolCall, ToolRegistry, ToolSchema,
    ToolSpec,
};
