//! Agent module - the orchestration core.
//!
//! This module contains:
//! - Message and conversation types
//! - Provider clients and the per-provider rate limiter
//! - Failover between the primary and secondary provider
//! - Router and tool dispatcher
//! - Agent loop driving the whole session
//!
//! # Adding a New LLM Provider
//!
//! See [`llm`] for instructions.

mod conversation;
mod dispatcher;
mod loop_impl;
mod message;
mod rate_limiter;

pub mod failover;
pub mod router;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use conversation::Conversation;
pub use dispatcher::ToolDispatcher;
pub use failover::{FailoverController, ProviderId};
pub use llm::{GeminiClient, OpenAiClient, ProviderClient};
pub use loop_impl::{AgentLoop, LoopState, RunFailure};
pub use message::{Content, ContentSegment, Message, Role, ToolCallRequest};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use router::Route;
