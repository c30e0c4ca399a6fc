//! Limiter key generation.

/// A key that identifies who is being limited for which operation.
///
/// Two different keys never share limiter state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey {
    /// Caller identity, usually the client IP
    pub caller: String,
    /// Type or component that owns the operation
    pub target: String,
    /// Operation name
    pub operation: String,
}

impl LimiterKey {
    /// Create a new limiter key.
    pub fn new(
        caller: impl Into<String>,
        target: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            caller: caller.into(),
            target: target.into(),
            operation: operation.into(),
        }
    }

    /// Human readable name of the protected operation, e.g. `Controller.main()`.
    pub fn operation_label(&self) -> String {
        if self.target.is_empty() {
            format!("{}()", self.operation)
        } else {
            format!("{}.{}()", self.target, self.operation)
        }
    }

    /// Name used to look up per-operation policies, e.g. `Controller.main`.
    pub fn operation_path(&self) -> String {
        operation_path(&self.target, &self.operation)
    }
}

pub(crate) fn operation_path(target: &str, operation: &str) -> String {
    if target.is_empty() {
        operation.to_string()
    } else {
        format!("{}.{}", target, operation)
    }
}

impl std::fmt::Display for LimiterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.caller, self.target, self.operation)
    }
}
