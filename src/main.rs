use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ipgate::config::IpgateConfig;
use ipgate::grpc::GrpcServer;
use ipgate::guard::CallGuard;
use ipgate::ratelimit::{Clock, RateLimiter, SystemClock};

/// Per-caller sliding-window call limiter.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "IPGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the gRPC listen address
    #[arg(long)]
    grpc_addr: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Ipgate Call Limiter");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = IpgateConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.grpc_addr {
        config.server.grpc_addr = addr;
    }
    info!(
        grpc_addr = %config.server.grpc_addr,
        rate = config.limiter.rate,
        window_secs = config.limiter.window_secs,
        operations = config.operations.len(),
        "Configuration loaded"
    );
    if config.default_policy().is_disabled() {
        warn!("No global limit configured, only operations with their own limits are limited");
    }

    let rate_limiter = Arc::new(RateLimiter::new());
    let guard = CallGuard::new(Arc::clone(&rate_limiter), config.policy_resolver());
    info!("Rate limiter initialized");

    if config.limiter.purge_interval_secs > 0 {
        let period = Duration::from_secs(config.limiter.purge_interval_secs);
        tokio::spawn(purge_idle_keys(Arc::clone(&rate_limiter), period));
    }

    let grpc_server = GrpcServer::new(config.server.grpc_addr, guard, config.caller_resolver());

    grpc_server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Ipgate Call Limiter stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Periodically drop keys that have been idle for longer than their window.
async fn purge_idle_keys(rate_limiter: Arc<RateLimiter>, period: Duration) {
    let clock = SystemClock::new();
    let mut ticker = tokio::time::interval(period);
    info!(period_secs = period.as_secs(), "Idle key purge enabled");

    loop {
        ticker.tick().await;
        let purged = rate_limiter.purge_idle(clock.now_millis());
        debug!(purged = purged, tracked = rate_limiter.len(), "Idle key purge finished");
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
