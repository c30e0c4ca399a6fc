//! Ipgate - Per-caller Call Limiter
//!
//! This crate implements a sliding-window call limiter keyed by caller and
//! operation. Each key keeps the timestamps of its most recent attempts in a
//! fixed-size ring, so no more than the configured number of calls is ever
//! admitted within any trailing window. Decisions are available in-process
//! through [`guard::CallGuard`] and over gRPC through [`grpc::GrpcServer`].

pub mod config;
pub mod error;
pub mod grpc;
pub mod guard;
pub mod identity;
pub mod ratelimit;
