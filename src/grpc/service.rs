//! Call limiter service implementation.

use tonic::{Request, Response, Status};
use tracing::{debug, error, instrument, warn};

use super::proto::ipgate::v1::{
    call_limiter_server::CallLimiter, DecideRequest, DecideResponse, Verdict,
};

use crate::guard::{rejection_message, CallGuard};
use crate::identity::{parse_peer, CallerResolver};
use crate::ratelimit::{Decision, Policy};

/// Implementation of the `CallLimiter` gRPC interface.
pub struct CallLimiterService {
    guard: CallGuard,
    callers: CallerResolver,
}

impl CallLimiterService {
    /// Create a new service deciding through `guard`.
    pub fn new(guard: CallGuard, callers: CallerResolver) -> Self {
        Self { guard, callers }
    }
}

#[tonic::async_trait]
impl CallLimiter for CallLimiterService {
    /// Decide whether one invocation of an operation may proceed.
    ///
    /// Rejections are regular responses. Errors are reserved for invalid
    /// requests and for limiter failures, in which case the call must not
    /// be admitted.
    #[instrument(
        skip(self, request),
        fields(
            target = %request.get_ref().target,
            operation = %request.get_ref().operation,
        )
    )]
    async fn decide(
        &self,
        request: Request<DecideRequest>,
    ) -> Result<Response<DecideResponse>, Status> {
        let transport_peer = request.remote_addr().map(|addr| addr.ip());
        let req = request.into_inner();

        if req.operation.is_empty() {
            warn!("Received decide request with empty operation");
            return Err(Status::invalid_argument("operation is required"));
        }

        let peer = parse_peer(&req.remote_addr).or(transport_peer);
        let caller = self.callers.resolve(&req.headers, peer);
        let call_site = Policy::new(req.rate, req.window_seconds);

        debug!(caller = ?caller, rate = req.rate, window_seconds = req.window_seconds, "Processing decide request");

        let outcome = self
            .guard
            .check(caller.as_deref(), &req.target, &req.operation, Some(call_site))
            .map_err(|e| {
                error!(error = %e, "Limiter failed, refusing call");
                Status::internal(e.to_string())
            })?;

        let (verdict, message) = match &outcome.decision {
            Decision::Admit => (Verdict::Admit, String::new()),
            Decision::Bypass => (Verdict::Bypass, String::new()),
            Decision::Reject(rejection) => (Verdict::Reject, rejection_message(rejection)),
        };

        debug!(verdict = ?verdict, "Decision made");

        Ok(Response::new(DecideResponse {
            verdict: verdict.into(),
            key: outcome.key.map(|k| k.to_string()).unwrap_or_default(),
            rate: outcome.policy.rate,
            window_seconds: outcome.policy.window_secs,
            message,
        }))
    }
}
