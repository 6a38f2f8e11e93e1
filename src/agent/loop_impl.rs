//! Agent loop - alternates model invocation and tool dispatch

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Error;
use crate::prompt::build_system_prompt;
use crate::tools::ToolRunner;
use crate::Result;

use super::conversation::Conversation;
use super::dispatcher::ToolDispatcher;
use super::failover::FailoverController;
use super::llm::{GeminiClient, OpenAiClient, ProviderClient};
use super::rate_limiter::RateLimiter;
use super::router::{self, Route};

/// Control-loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Agent,
    Tools,
    Done,
}

/// A fatal run error together with the conversation accumulated so far.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: Error,
    pub conversation: Conversation,
}

/// The agent loop drives one task session until the model emits the
/// termination sentinel, a provider fails fatally, or the step budget runs out.
pub struct AgentLoop {
    failover: FailoverController,
    dispatcher: ToolDispatcher,
    system_prompt: String,
    max_steps: usize,
}

impl AgentLoop {
    /// Create a new agent loop
    pub fn new(
        failover: FailoverController,
        dispatcher: ToolDispatcher,
        system_prompt: impl Into<String>,
        max_steps: usize,
    ) -> Self {
        Self {
            failover,
            dispatcher,
            system_prompt: system_prompt.into(),
            max_steps,
        }
    }

    /// Wire providers, rate limiters, tools and prompt from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let runner = ToolRunner::new_with_defaults(config)?;
        let tools = runner.definitions();
        let system_prompt =
            build_system_prompt(&config.email, &config.secret, &config.workspace, &runner.tool_names());

        let primary_limiter = Arc::new(RateLimiter::new(config.primary.rate_limit));
        let primary: Arc<dyn ProviderClient> = Arc::new(OpenAiClient::new(
            &config.primary.api_key,
            &config.primary.base_url,
            &config.primary.model,
            tools.clone(),
            primary_limiter,
        ));

        let secondary = config.secondary.as_ref().map(|s| {
            let limiter = Arc::new(RateLimiter::new(s.rate_limit));
            Arc::new(GeminiClient::new(&s.api_key, &s.model, tools.clone(), limiter, s.max_retries))
                as Arc<dyn ProviderClient>
        });

        let failover = FailoverController::new(primary, secondary, Duration::from_secs(config.backoff_secs));

        Ok(Self::new(failover, ToolDispatcher::new(runner), system_prompt, config.max_steps))
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Run the session seeded with `initial_reference` (e.g. the first quiz URL).
    pub async fn run(&self, initial_reference: &str) -> std::result::Result<Conversation, RunFailure> {
        let mut conversation = Conversation::seeded(initial_reference);
        let mut state = LoopState::Agent;
        let mut steps = 0usize;

        info!("Starting agent loop with: {}", initial_reference);

        while state != LoopState::Done {
            if steps >= self.max_steps {
                return Err(RunFailure {
                    error: Error::LoopBudgetExceeded { max_steps: self.max_steps },
                    conversation,
                });
            }
            steps += 1;
            debug!("Step {}/{} in {:?}", steps, self.max_steps, state);

            state = match state {
                LoopState::Agent => {
                    let outcome = self
                        .failover
                        .invoke(&self.system_prompt, conversation.messages())
                        .await;
                    let (provider, message) = match outcome {
                        Ok(answer) => answer,
                        Err(error) => return Err(RunFailure { error, conversation }),
                    };

                    let route = router::decide(&message);
                    debug!("{:?} replied, routing to {:?}", provider, route);
                    conversation.push(message);

                    match route {
                        Route::DispatchTools => LoopState::Tools,
                        Route::Terminate => LoopState::Done,
                        Route::Continue => LoopState::Agent,
                    }
                }
                LoopState::Tools => {
                    let appended = self.dispatcher.dispatch(&mut conversation).await;
                    debug!("Appended {} tool results", appended);
                    LoopState::Agent
                }
                LoopState::Done => LoopState::Done,
            };
        }

        info!("Agent finished after {} steps with {} messages", steps, conversation.len());
        Ok(conversation)
    }
}
