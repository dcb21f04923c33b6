//! # anomtree LLM
//!
//! The oracle side of anomtree: backends that turn prompts into text, the
//! four taxonomy prompts, and strict parsers that turn replies into typed
//! values or protocol errors.
//!
//! ## Features
//!
//! - `api`: OpenAI-compatible chat completions backend
//! - `local`: Ollama backend
//! - `full`: All backends
//!
//! ## Usage
//!
//! ```rust,ignore
//! use anomtree_llm::{Oracle, OllamaBackend};
//! use std::sync::Arc;
//!
//! let oracle = Oracle::new(Arc::new(OllamaBackend::localhost()));
//! let route = oracle.select_route(&tree.root_view(false), "Temp1 jumps.").await?;
//! ```

mod backend;
mod oracle;
mod prompt;
pub mod reply;
mod types;

pub use backend::{LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend};
pub use oracle::Oracle;
pub use prompt::{AdditionPrompt, PromptTemplate, RoutePrompt, SplitPrompt, TemplatePrompt};
pub use reply::{parse_reply, ProtocolError, END_SENTINEL};
pub use types::{
    AdditionReply, OracleReply, QueryKind, RouteReply, SplitDecision, SplitReply, TemplateReply,
};

#[cfg(feature = "local")]
mod ollama;
#[cfg(feature = "local")]
pub use ollama::{OllamaBackend, DEFAULT_ENDPOINT as OLLAMA_DEFAULT_ENDPOINT};

#[cfg(feature = "api")]
mod openai;
#[cfg(feature = "api")]
pub use openai::OpenAiBackend;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend, Oracle};
    pub use crate::{OracleReply, ProtocolError, QueryKind, SplitDecision};

    #[cfg(feature = "local")]
    pub use crate::OllamaBackend;

    #[cfg(feature = "api")]
    pub use crate::OpenAiBackend;
}
