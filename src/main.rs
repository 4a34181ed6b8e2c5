//! aerolru
//!
//! Keeps a capacity-bounded Aerospike set under its size limits by removing
//! its oldest entries whenever a node's share crosses the hard watermark.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            aerolru                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   Metrics    │───▶│     LRU      │───▶│   Eviction   │       │
//! │  │   Watcher    │    │  Controller  │    │  Dispatcher  │       │
//! │  │   (Eyes)     │    │   (Brain)    │    │   (Hands)    │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aerolru::adapters::{
    AerospikeCluster, AerospikeConfig, LoggingEventPublisher, UDF_FILENAME, UDF_SOURCE,
};
use aerolru::controller::{ControllerConfig, ControllerMetrics, LruController, ScannerConfig};
use aerolru::error::{Error, Result};
use aerolru::evictor::DispatcherConfig;
use aerolru::metrics::WatcherConfig;
use aerolru::policy::{
    WatermarkConfig, DEFAULT_GLOBAL_HARD_TARGET, DEFAULT_GLOBAL_SOFT_TARGET,
    DEFAULT_REPLICA_COUNT,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// aerolru - TTL eviction controller for capacity-bounded Aerospike sets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seed node host
    #[arg(long, env = "AEROSPIKE_HOSTNAME", default_value = "127.0.0.1")]
    host: String,

    /// Seed node port
    #[arg(long, env = "AEROSPIKE_PORT", default_value = "3000")]
    port: u16,

    /// Namespace holding the managed set
    #[arg(long, env = "AEROSPIKE_NAMESPACE", default_value = "persisted")]
    namespace: String,

    /// Managed set
    #[arg(long, env = "AEROSPIKE_SET", default_value = "lru")]
    set: String,

    /// Replication factor of the namespace
    #[arg(long, env = "REPLICA_COUNT", default_value_t = DEFAULT_REPLICA_COUNT)]
    replica_count: u32,

    /// Cluster-wide object count to shrink back to
    #[arg(long, env = "GLOBAL_SOFT_TARGET", default_value_t = DEFAULT_GLOBAL_SOFT_TARGET)]
    soft_target: u64,

    /// Cluster-wide object count that triggers eviction
    #[arg(long, env = "GLOBAL_HARD_TARGET", default_value_t = DEFAULT_GLOBAL_HARD_TARGET)]
    hard_target: u64,

    /// Minutes to sleep between passes
    #[arg(long, env = "INTERVAL_MINUTES", default_value = "20")]
    interval_minutes: u64,

    /// Socket timeout in seconds
    #[arg(long, env = "SOCKET_TIMEOUT_SECONDS", default_value = "300")]
    socket_timeout_seconds: u64,

    /// Nodes scanned concurrently
    #[arg(long, env = "MAX_CONCURRENT_SCANS", default_value = "1")]
    max_concurrent_scans: usize,

    /// Upper bound in minutes for one remove-by-age job
    #[arg(long, env = "DISPATCH_TIMEOUT_MINUTES", default_value = "20")]
    dispatch_timeout_minutes: u64,

    /// Enable dry-run mode (log only, no removals)
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Do not upload the Lua module at startup
    #[arg(long, env = "SKIP_UDF_REGISTRATION")]
    skip_udf_registration: bool,

    /// Seconds to wait for the Lua module to reach every node
    #[arg(long, env = "UDF_TIMEOUT_SECONDS", default_value = "60")]
    udf_timeout_seconds: u64,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

fn minutes(value: u64, flag: &str) -> Result<Duration> {
    value
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("--{} is out of range: {}", flag, value)))
}

impl Args {
    fn controller_config(&self) -> Result<ControllerConfig> {
        Ok(ControllerConfig {
            interval: minutes(self.interval_minutes, "interval-minutes")?,
            watermark: WatermarkConfig {
                replica_count: self.replica_count,
                global_soft_target: self.soft_target,
                global_hard_target: self.hard_target,
            },
            watcher: WatcherConfig {
                namespace: self.namespace.clone(),
                set_name: self.set.clone(),
                request_timeout: Duration::from_secs(self.socket_timeout_seconds),
            },
            scanner: ScannerConfig {
                max_concurrent_scans: self.max_concurrent_scans,
            },
            dispatcher: DispatcherConfig {
                namespace: self.namespace.clone(),
                dry_run: self.dry_run,
                call_timeout: minutes(self.dispatch_timeout_minutes, "dispatch-timeout-minutes")?,
            },
        })
    }

    fn aerospike_config(&self) -> Result<AerospikeConfig> {
        Ok(AerospikeConfig {
            seed_host: self.host.clone(),
            seed_port: self.port,
            socket_timeout: Duration::from_secs(self.socket_timeout_seconds),
            job_timeout: minutes(self.dispatch_timeout_minutes, "dispatch-timeout-minutes")?,
            ..Default::default()
        })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Start aero lru");
    info!("  Seed: {}:{}", args.host, args.port);
    info!("  Set: {}.{}", args.namespace, args.set);
    info!(
        "  Targets: soft {} / hard {} objects, {} replica(s)",
        args.soft_target, args.hard_target, args.replica_count
    );
    info!("  Interval: {} minutes", args.interval_minutes);
    info!("  Dry-run mode: {}", args.dry_run);

    let (config, aerospike_config) = args
        .controller_config()
        .and_then(|config| {
            config.validate()?;
            Ok((config, args.aerospike_config()?))
        })
        .map_err(|e| {
            error!("Invalid configuration: {}", e);
            Error::Startup(e.to_string())
        })?;

    let metrics = ControllerMetrics::new()?;
    let ready = Arc::new(AtomicBool::new(false));

    // Start health server
    let health_addr = args.health_addr.clone();
    let health_ready = ready.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_ready).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let served_metrics = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, served_metrics).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Connect to the cluster
    let cluster = Arc::new(AerospikeCluster::new(aerospike_config));
    cluster.probe().await.map_err(|e| {
        error!("Failed to connect to {}:{}: {}", args.host, args.port, e);
        e
    })?;

    if args.skip_udf_registration {
        info!("Skipping UDF registration");
    } else {
        info!("Register LRU UDF");
        cluster
            .register_udf(
                UDF_FILENAME,
                UDF_SOURCE,
                Duration::from_secs(args.udf_timeout_seconds),
            )
            .await
            .map_err(|e| {
                error!("UDF registration failed: {}", e);
                e
            })?;
    }

    ready.store(true, Ordering::SeqCst);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    let controller = LruController::new(
        config,
        cluster,
        Arc::new(LoggingEventPublisher::debug_level()),
    )
    .with_metrics(metrics);
    controller.run(cancel).await?;

    info!("aerolru shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = ["hyper=warn", "hyper_util=warn"]
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(level.into()),
            |filter, directive| filter.add_directive(directive),
        );

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

// =============================================================================
// HTTP Servers
// =============================================================================

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

async fn run_health_server(addr: &str, ready: Arc<AtomicBool>) -> Result<()> {
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::Request;
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Startup(format!("Invalid health server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Startup(format!("Failed to bind health server: {}", e)))?;

    info!("Health server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Health server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let ready = ready.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let ready = ready.load(Ordering::SeqCst);
                async move {
                    let response = match req.uri().path() {
                        "/healthz" | "/livez" => text_response(StatusCode::OK, "ok"),
                        "/readyz" if ready => text_response(StatusCode::OK, "ok"),
                        "/readyz" => text_response(StatusCode::SERVICE_UNAVAILABLE, "starting"),
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Health server connection error: {}", e);
            }
        });
    }
}

async fn run_metrics_server(addr: &str, metrics: ControllerMetrics) -> Result<()> {
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::Request;
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Startup(format!("Invalid metrics server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Startup(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Metrics server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let metrics = metrics.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match metrics.encode_text() {
                            Ok(buffer) => {
                                let mut response = text_response(StatusCode::OK, buffer);
                                response.headers_mut().insert(
                                    CONTENT_TYPE,
                                    HeaderValue::from_static(prometheus::TEXT_FORMAT),
                                );
                                response
                            }
                            Err(e) => {
                                error!("Failed to encode metrics: {}", e);
                                text_response(StatusCode::INTERNAL_SERVER_ERROR, "encoding failed")
                            }
                        },
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics server connection error: {}", e);
            }
        });
    }
}
