//! Primary/secondary provider failover.
//!
//! The policy is a pure function ([`next_step`]) over the failed attempt and
//! its [`ProviderError`]; [`FailoverController`] only executes the steps.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::{Error, ProviderError};
use crate::Result;

use super::llm::ProviderClient;
use super::message::Message;

/// Which backend produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderId {
    Primary,
    Secondary,
}

/// One invocation attempt within a failover sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Primary,
    Secondary,
    SecondaryRetry,
}

impl Attempt {
    pub fn provider(self) -> ProviderId {
        match self {
            Attempt::Primary => ProviderId::Primary,
            Attempt::Secondary | Attempt::SecondaryRetry => ProviderId::Secondary,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverStep {
    /// Run the given attempt immediately.
    Attempt(Attempt),
    /// Sleep for the configured backoff, then run the given attempt.
    BackoffThen(Attempt),
    /// Surface the error as-is.
    Propagate,
    /// Both tiers are confirmed exhausted.
    Exhausted,
}

/// Failover policy.
///
/// Only rate-limit failures switch tiers. The secondary gets one immediate
/// attempt and one retry after backoff; anything after that is exhaustion.
pub fn next_step(failed: Attempt, error: &ProviderError, has_secondary: bool) -> FailoverStep {
    match (failed, error.is_rate_limited()) {
        (Attempt::Primary, true) if has_secondary => FailoverStep::Attempt(Attempt::Secondary),
        (Attempt::Primary, _) => FailoverStep::Propagate,
        (Attempt::Secondary, true) => FailoverStep::BackoffThen(Attempt::SecondaryRetry),
        (Attempt::Secondary, false) => FailoverStep::Propagate,
        (Attempt::SecondaryRetry, _) => FailoverStep::Exhausted,
    }
}

/// Runs one logical "get next assistant message" operation with failover.
pub struct FailoverController {
    primary: Arc<dyn ProviderClient>,
    secondary: Option<Arc<dyn ProviderClient>>,
    backoff: Duration,
}

impl FailoverController {
    pub fn new(
        primary: Arc<dyn ProviderClient>,
        secondary: Option<Arc<dyn ProviderClient>>,
        backoff: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            backoff,
        }
    }

    fn client_for(&self, attempt: Attempt) -> Option<&Arc<dyn ProviderClient>> {
        match attempt.provider() {
            ProviderId::Primary => Some(&self.primary),
            ProviderId::Secondary => self.secondary.as_ref(),
        }
    }

    /// Invoke the primary, failing over to the secondary on rate limits.
    pub async fn invoke(&self, system_prompt: &str, conversation: &[Message]) -> Result<(ProviderId, Message)> {
        let mut attempt = Attempt::Primary;

        loop {
            let Some(client) = self.client_for(attempt) else {
                return Err(Error::Config("Secondary provider is not configured".to_string()));
            };

            let err = match client.invoke(system_prompt, conversation).await {
                Ok(message) => {
                    if attempt != Attempt::Primary {
                        info!("{} answered via {:?}", client.name(), attempt);
                    }
                    return Ok((attempt.provider(), message));
                }
                Err(err) => err,
            };

            match next_step(attempt, &err, self.secondary.is_some()) {
                FailoverStep::Attempt(next) => {
                    warn!("{} rate limited, switching to secondary without waiting: {}", client.name(), err);
                    attempt = next;
                }
                FailoverStep::BackoffThen(next) => {
                    warn!("Secondary also rate limited, retrying once in {:?}", self.backoff);
                    tokio::time::sleep(self.backoff).await;
                    attempt = next;
                }
                FailoverStep::Propagate => {
                    error!("{} failed with no fallback: {}", client.name(), err);
                    return Err(Error::Provider(err));
                }
                FailoverStep::Exhausted => {
                    error!("Both providers exhausted: {}", err);
                    return Err(Error::BothProvidersExhausted(err));
                }
            }
        }
    }
}
