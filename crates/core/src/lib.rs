//! # openmud core
//!
//! Domain types, traits, and error definitions shared by every openmud crate.
//! Nothing here talks to the network: providers, tool handlers and the
//! telemetry recorder implement against these types in their own crates.
//!
//! - [`Message`] / [`Role`]: the request-scoped conversation buffer
//! - [`Provider`]: one LLM backend, one turn at a time
//! - [`ToolHandler`]: one executable tool behind the dispatcher
//! - [`ToolSchema`]: a declaration the model may call

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

pub use error::{ProviderError, RegistryError, ToolError};
pub use message::{Message, Role, ToolCallRequest};
pub use provider::{Provider, ProviderStyle, TurnReply, TurnRequest, Usage};
pub use tool::{ToolContext, ToolExecutionResult, ToolHandler, ToolSchema};
