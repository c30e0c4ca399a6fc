//! Error types for the Ipgate service.

use thiserror::Error;

use crate::ratelimit::{Rejection, RingError};

/// Main error type for Ipgate operations.
#[derive(Error, Debug)]
pub enum IpgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A timestamp ring was driven outside its contract
    #[error("Limiter invariant violated: {0}")]
    Ring(#[from] RingError),

    /// gRPC server errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for IpgateError {
    fn from(err: config::ConfigError) -> Self {
        IpgateError::Config(err.to_string())
    }
}

/// Result type alias for Ipgate operations.
pub type Result<T> = std::result::Result<T, IpgateError>;

/// Error returned by [`CallGuard::run`](crate::guard::CallGuard::run).
#[derive(Error, Debug)]
pub enum GuardError {
    /// Too many calls in the trailing window. The protected call was not made.
    #[error("{}", crate::guard::rejection_message(.0))]
    LimitExceeded(Rejection),

    /// The limiter itself failed, the call was not made.
    #[error(transparent)]
    Limiter(#[from] IpgateError),
}
