//! # agent-runtime
//!
//! Model service adapters for the conversation engine.
//!
//! ## Providers
//!
//! - **Responses** (default): any endpoint speaking the OpenAI-compatible
//!   Responses API (`POST {base_url}/responses`), including Yandex Cloud
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::responses::ResponsesProvider;
//!
//! let service = ResponsesProvider::from_env()?;
//! let engine = ConversationEngine::builder()
//!     .service(Arc::new(service))
//!     .build()?;
//! ```

#[cfg(feature = "responses")]
pub mod responses;

#[cfg(feature = "responses")]
pub use responses::{ResponsesConfig, ResponsesProvider};

// Re-export core types for convenience
pub use agent_core::{
    AgentError, ConversationEngine, ModelService, Result, SessionId, ToolRegistry, TurnRequest,
    TurnResult,
};
