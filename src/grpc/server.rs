//! gRPC server implementation.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::ipgate::v1::call_limiter_server::CallLimiterServer;
use super::service::CallLimiterService;
use crate::error::{IpgateError, Result};
use crate::guard::CallGuard;
use crate::identity::CallerResolver;

/// gRPC server for the call limiter service.
pub struct GrpcServer {
    /// Address to bind to
    addr: SocketAddr,
    service: CallLimiterService,
}

impl GrpcServer {
    /// Create a new gRPC server deciding through `guard`.
    pub fn new(addr: SocketAddr, guard: CallGuard, callers: CallerResolver) -> Self {
        Self {
            addr,
            service: CallLimiterService::new(guard, callers),
        }
    }

    /// Start the gRPC server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        info!(addr = %self.addr, "Starting gRPC server for CallLimiter");

        Server::builder()
            .add_service(CallLimiterServer::new(self.service))
            .serve_with_shutdown(self.addr, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                IpgateError::Grpc(e)
            })
    }

    /// Serve on an already bound listener, ignoring the configured address.
    pub async fn serve_on_listener<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        info!(addr = ?listener.local_addr().ok(), "Starting gRPC server for CallLimiter");

        Server::builder()
            .add_service(CallLimiterServer::new(self.service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                IpgateError::Grpc(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{PolicyResolver, RateLimiter};
    use std::sync::Arc;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let guard = CallGuard::new(Arc::new(RateLimiter::new()), PolicyResolver::default());
        let _server = GrpcServer::new(addr, guard, CallerResolver::default());
    }
}
