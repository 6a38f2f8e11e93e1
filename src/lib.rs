//! quizloop - autonomous quiz-solving agent
//!
//! This library provides the orchestration loop that alternates model
//! invocation and tool dispatch, with primary/secondary provider failover.

pub mod agent;
pub mod config;
pub mod error;
pub mod prompt;
pub mod tools;
pub mod ui;

pub use error::{Error, ProviderError, Result};
