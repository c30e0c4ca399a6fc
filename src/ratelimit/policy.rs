//! Rate limit policies and their resolution.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How many calls are allowed within a trailing window.
///
/// A zero rate or a zero window means limiting is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    /// Maximum calls per window
    #[serde(default)]
    pub rate: u32,
    /// Window length in seconds
    #[serde(default)]
    pub window_secs: u64,
}

impl Policy {
    pub const fn new(rate: u32, window_secs: u64) -> Self {
        Self { rate, window_secs }
    }

    /// A policy that never limits.
    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }

    pub fn is_disabled(&self) -> bool {
        self.rate == 0 || self.window_secs == 0
    }

    /// Window length in milliseconds.
    pub fn window_millis(&self) -> i64 {
        i64::try_from(self.window_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    /// Fill each zero field from `fallback`.
    pub fn overlay(self, fallback: Policy) -> Policy {
        Policy {
            rate: if self.rate != 0 { self.rate } else { fallback.rate },
            window_secs: if self.window_secs != 0 {
                self.window_secs
            } else {
                fallback.window_secs
            },
        }
    }

    /// Human readable window, e.g. `1 minute(s)` or `90 second(s)`.
    pub fn window_label(&self) -> String {
        if self.window_secs % 60 == 0 {
            format!("{} minute(s)", self.window_secs / 60)
        } else {
            format!("{} second(s)", self.window_secs)
        }
    }
}

/// Resolves the policy for an operation.
///
/// Each field is taken from the first nonzero source: the call site, the
/// configured per-operation policy, then the global default. Operation names
/// match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PolicyResolver {
    default: Policy,
    operations: HashMap<String, Policy>,
}

impl PolicyResolver {
    pub fn new(default: Policy) -> Self {
        Self {
            default,
            operations: HashMap::new(),
        }
    }

    /// Register a policy for an operation path such as `Controller.main`.
    pub fn with_operation(mut self, operation: impl Into<String>, policy: Policy) -> Self {
        self.operations
            .insert(operation.into().to_ascii_lowercase(), policy);
        self
    }

    pub fn with_operations<I>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = (String, Policy)>,
    {
        self.operations.extend(
            operations
                .into_iter()
                .map(|(name, policy)| (name.to_ascii_lowercase(), policy)),
        );
        self
    }

    pub fn default_policy(&self) -> Policy {
        self.default
    }

    pub fn resolve(&self, operation: &str, call_site: Option<Policy>) -> Policy {
        let configured = self
            .operations
            .get(&operation.to_ascii_lowercase())
            .copied()
            .unwrap_or_default()
            .overlay(self.default);

        match call_site {
            Some(policy) => policy.overlay(configured),
            None => configured,
        }
    }
}
