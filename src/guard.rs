//! Call guard wrapping protected operations with the rate limiter.
//!
//! A [`CallGuard`] ties together the limiter, a clock and the policy
//! configuration. Call sites ask it before running a protected operation,
//! or hand the operation to [`CallGuard::run`] and let it decide.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::error::{GuardError, Result};
use crate::ratelimit::{
    operation_path, Clock, Decision, LimiterKey, Policy, PolicyResolver, RateLimiter,
    Rejection, SystemClock,
};

/// Message shown to a caller whose call was rejected, e.g.
/// `The number of Controller.main() calls must not exceed 5 request(s) per 1 minute(s)!`
pub fn rejection_message(rejection: &Rejection) -> String {
    format!(
        "The number of {} calls must not exceed {} request(s) per {}!",
        rejection.key.operation_label(),
        rejection.policy.rate,
        rejection.policy.window_label()
    )
}

/// Result of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub decision: Decision,
    /// `None` when the caller could not be identified
    pub key: Option<LimiterKey>,
    /// Policy in effect for the call. For a known key the rate is the one its
    /// ring was created with, which may differ from the resolved policy.
    pub policy: Policy,
}

/// Explicit wrapper applying rate limits to named operations.
#[derive(Clone)]
pub struct CallGuard {
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    policies: Arc<PolicyResolver>,
}

impl CallGuard {
    /// Create a guard using the system clock.
    pub fn new(limiter: Arc<RateLimiter>, policies: PolicyResolver) -> Self {
        Self::with_clock(limiter, policies, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(
        limiter: Arc<RateLimiter>,
        policies: PolicyResolver,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter,
            clock,
            policies: Arc::new(policies),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn policies(&self) -> &PolicyResolver {
        &self.policies
    }

    /// Check whether `caller` may invoke `target.operation` now.
    ///
    /// `call_site` carries limits declared where the operation is defined;
    /// zero fields fall back to the configured policy. Unknown callers are
    /// not limited.
    pub fn check(
        &self,
        caller: Option<&str>,
        target: &str,
        operation: &str,
        call_site: Option<Policy>,
    ) -> Result<Outcome> {
        let path = operation_path(target, operation);
        let policy = self.policies.resolve(&path, call_site);

        let caller = match caller.map(str::trim).filter(|c| !c.is_empty()) {
            Some(caller) => caller,
            None => {
                debug!(operation = %path, "No caller identity, skipping limiter");
                return Ok(Outcome {
                    decision: Decision::Bypass,
                    key: None,
                    policy,
                });
            }
        };

        let key = LimiterKey::new(caller, target, operation);
        let decision = self.limiter.decide(&key, policy, self.clock.now_millis())?;
        let policy = match &decision {
            Decision::Reject(rejection) => rejection.policy,
            Decision::Admit => Policy {
                rate: self.limiter.enforced_rate(&key).unwrap_or(policy.rate),
                ..policy
            },
            Decision::Bypass => policy,
        };

        Ok(Outcome {
            decision,
            key: Some(key),
            policy,
        })
    }

    /// Run `f` if the call is admitted.
    ///
    /// On rejection `f` is not called and [`GuardError::LimitExceeded`] is
    /// returned.
    pub fn run<F, T>(
        &self,
        caller: Option<&str>,
        target: &str,
        operation: &str,
        call_site: Option<Policy>,
        f: F,
    ) -> std::result::Result<T, GuardError>
    where
        F: FnOnce() -> T,
    {
        match self.check(caller, target, operation, call_site)?.decision {
            Decision::Reject(rejection) => Err(GuardError::LimitExceeded(rejection)),
            Decision::Admit | Decision::Bypass => Ok(f()),
        }
    }

    /// Async counterpart of [`CallGuard::run`].
    ///
    /// The future is only created once the call is admitted.
    pub async fn run_async<F, Fut, T>(
        &self,
        caller: Option<&str>,
        target: &str,
        operation: &str,
        call_site: Option<Policy>,
        f: F,
    ) -> std::result::Result<T, GuardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.check(caller, target, operation, call_site)?.decision {
            Decision::Reject(rejection) => Err(GuardError::LimitExceeded(rejection)),
            Decision::Admit | Decision::Bypass => Ok(f().await),
        }
    }
}
