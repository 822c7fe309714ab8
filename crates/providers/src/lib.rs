//! LLM provider adapters for openmud.
//!
//! Both adapters implement `openmud_core::Provider`: [`AnthropicProvider`]
//! speaks the content-block dialect, [`OpenAiCompatProvider`] the
//! chat-completion dialect. The router picks one per requested model.

pub mod anthropic;
pub mod fallback;
pub mod openai_compat;
pub mod router;
pub mod transport;

pub use anthropic::AnthropicProvider;
pub use fallback::ModelAliases;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, Route, build_from_config};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
