//! Decide calls over a real gRPC connection.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use ipgate::config::IpgateConfig;
use ipgate::grpc::{CallLimiterClient, DecideRequest, GrpcServer, Verdict};
use ipgate::guard::CallGuard;
use ipgate::ratelimit::RateLimiter;

fn decide_request(ip: &str) -> DecideRequest {
    DecideRequest {
        target: "Controller".to_string(),
        operation: "main".to_string(),
        headers: [("X-Forwarded-For".to_string(), ip.to_string())]
            .into_iter()
            .collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_decide_over_grpc() {
    let config = IpgateConfig::from_yaml("limiter:\n  rate: 3\n  window_secs: 60\n").unwrap();
    let guard = CallGuard::new(Arc::new(RateLimiter::new()), config.policy_resolver());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = GrpcServer::new(addr, guard, config.caller_resolver());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_on_listener(listener, async move {
        let _ = stop_rx.await;
    }));

    let mut client = CallLimiterClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    let mut verdicts = Vec::new();
    for _ in 0..4 {
        let response = client.decide(decide_request("192.168.0.1")).await.unwrap();
        verdicts.push(response.into_inner().verdict());
    }
    assert_eq!(
        verdicts,
        vec![Verdict::Admit, Verdict::Admit, Verdict::Admit, Verdict::Reject]
    );

    let other = client.decide(decide_request("192.168.0.2")).await.unwrap();
    assert_eq!(other.into_inner().verdict(), Verdict::Admit);

    let status = client
        .decide(DecideRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);

    stop_tx.send(()).unwrap();
    tokio_test::assert_ok!(handle.await.unwrap());
}
