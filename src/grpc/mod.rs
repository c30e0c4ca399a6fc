//! gRPC server module for the call limiter service.

mod server;
mod service;

pub use server::GrpcServer;
pub use service::CallLimiterService;

// Include the generated protobuf code
pub mod proto {
    pub mod ipgate {
        pub mod v1 {
            tonic::include_proto!("ipgate.v1");
        }
    }
}

// Re-export commonly used types
pub use proto::ipgate::v1::{
    call_limiter_client::CallLimiterClient, call_limiter_server::CallLimiterServer,
    DecideRequest, DecideResponse, Verdict,
};
