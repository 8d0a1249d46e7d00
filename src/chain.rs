//! Ordered provider fallback chains
//!
//! A [`FallbackChain`] executes provider calls strictly in priority order,
//! never concurrently, so a healthy primary is the only provider that gets
//! traffic. Each call is bounded by a per-call timeout; a timeout is treated
//! like any other provider failure and falls through to the next step.
//!
//! Steps may be conditional: a step built with [`Trigger::IfRegionRestricted`]
//! or [`Trigger::IfUnsupportedParameter`] only runs when the previous
//! attempted step failed with the matching error, which is how the regional
//! mirror and the normalized-interval retry are expressed.

use crate::{
    constants::PROVIDER_CALL_TIMEOUT_SECS,
    error::{FetchError, ProviderError},
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Condition under which a chain step is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Attempted whenever the chain reaches it
    Always,
    /// Attempted only if the previous attempted step was region-restricted
    IfRegionRestricted,
    /// Attempted only if the previous attempted step rejected a parameter
    IfUnsupportedParameter,
}

impl Trigger {
    fn matches(self, previous: Option<&ProviderError>) -> bool {
        match self {
            Trigger::Always => true,
            Trigger::IfRegionRestricted => {
                previous.is_some_and(ProviderError::is_region_restricted)
            }
            Trigger::IfUnsupportedParameter => {
                previous.is_some_and(ProviderError::is_unsupported_parameter)
            }
        }
    }
}

type StepFn<'a, T> = Box<dyn Fn() -> BoxFuture<'a, Result<T, ProviderError>> + Send + Sync + 'a>;

struct ChainStep<'a, T> {
    name: String,
    trigger: Trigger,
    call: StepFn<'a, T>,
}

/// An ordered list of named provider steps for one capability
pub struct FallbackChain<'a, T> {
    capability: &'static str,
    steps: Vec<ChainStep<'a, T>>,
    call_timeout: Duration,
}

impl<'a, T> FallbackChain<'a, T> {
    /// Creates an empty chain for a named capability
    pub fn new(capability: &'static str) -> Self {
        Self {
            capability,
            steps: Vec::new(),
            call_timeout: Duration::from_secs(PROVIDER_CALL_TIMEOUT_SECS),
        }
    }

    /// Overrides the per-call timeout
    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Appends an unconditional step
    pub fn step<F, Fut>(self, name: &str, call: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'a,
    {
        self.step_if(name, Trigger::Always, call)
    }

    /// Appends a step attempted only when its trigger matches the previous
    /// attempted step's failure
    pub fn step_if<F, Fut>(mut self, name: &str, trigger: Trigger, call: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'a,
    {
        self.steps.push(ChainStep {
            name: name.to_string(),
            trigger,
            call: Box::new(move || call().boxed()),
        });
        self
    }

    /// Runs the chain: first step to complete successfully within the
    /// per-call timeout wins. If every attempted step fails, the error
    /// carries all individual causes.
    pub async fn run(&self) -> Result<T, FetchError> {
        let mut causes: Vec<(String, ProviderError)> = Vec::new();
        let mut previous: Option<ProviderError> = None;

        for step in &self.steps {
            if !step.trigger.matches(previous.as_ref()) {
                tracing::debug!(
                    capability = self.capability,
                    step = %step.name,
                    "Skipping step, trigger condition not met"
                );
                continue;
            }

            let outcome = match timeout(self.call_timeout, (step.call)()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };

            match outcome {
                Ok(value) => {
                    tracing::debug!(
                        capability = self.capability,
                        step = %step.name,
                        "Provider step succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    tracing::warn!(
                        capability = self.capability,
                        step = %step.name,
                        error = %err,
                        "Provider step failed, falling through"
                    );
                    previous = Some(shallow_copy(&err));
                    causes.push((step.name.clone(), err));
                }
            }
        }

        Err(FetchError::exhausted(self.capability, causes))
    }
}

/// Copies the variant information needed by trigger predicates.
/// `reqwest::Error` is not cloneable, so network errors degrade to `Timeout`
/// here; no trigger distinguishes the two.
fn shallow_copy(err: &ProviderError) -> ProviderError {
    match err {
        ProviderError::RegionRestricted => ProviderError::RegionRestricted,
        ProviderError::UnsupportedParameter(s) => ProviderError::UnsupportedParameter(s.clone()),
        ProviderError::RateLimited => ProviderError::RateLimited,
        ProviderError::Decode(s) => ProviderError::Decode(s.clone()),
        ProviderError::Api { status, body } => ProviderError::Api {
            status: *status,
            body: body.clone(),
        },
        ProviderError::UnsupportedAsset(s) => ProviderError::UnsupportedAsset(s.clone()),
        ProviderError::Timeout | ProviderError::Network(_) => ProviderError::Timeout,
    }
}
