use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hostwatch::config::{HostwatchConfig, LoggingConfig};
use hostwatch::http::{router, ClientKeyExtractor, HttpServer};
use hostwatch::ratelimit::{IdleSweeper, RateLimiterBackend, SlidingWindowLimiter};
use hostwatch::telemetry::HostProbe;

/// Host telemetry over HTTP behind a per-client rate limiter.
#[derive(Parser, Debug)]
#[command(name = "hostwatch", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "HOSTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Address to serve HTTP on
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Maximum requests per client per window
    #[arg(long)]
    max_requests: Option<u64>,

    /// Rate limit window length in seconds
    #[arg(long)]
    window_secs: Option<u64>,

    /// Log filter directive, e.g. `debug` or `hostwatch=trace`
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command line overrides on top of loaded configuration.
    fn apply(&self, config: &mut HostwatchConfig) {
        if let Some(addr) = self.listen {
            config.server.http_addr = addr;
        }
        if let Some(max_requests) = self.max_requests {
            config.rate_limiting.max_requests = max_requests;
        }
        if let Some(window_secs) = self.window_secs {
            config.rate_limiting.window_secs = window_secs;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }

    /// Load file and environment configuration, apply flags, then validate.
    fn resolve_config(&self) -> hostwatch::error::Result<HostwatchConfig> {
        let mut config = HostwatchConfig::load(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    init_tracing(&config.logging);

    info!("Starting Hostwatch Telemetry Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        http_addr = %config.server.http_addr,
        max_requests = config.rate_limiting.max_requests,
        window_secs = config.rate_limiting.window_secs,
        "Configuration loaded"
    );

    // Initialize the rate limiter
    let limiter = Arc::new(SlidingWindowLimiter::new(
        config.rate_limiting.limit_config(),
    ));
    let sweeper = IdleSweeper::spawn(
        Arc::clone(&limiter),
        config.rate_limiting.eviction_interval(),
    );
    info!("Rate limiter initialized");

    let probe = Arc::new(tokio::task::spawn_blocking(HostProbe::new).await?);
    let backend: Arc<dyn RateLimiterBackend> = limiter;
    let app = router(
        probe,
        backend,
        ClientKeyExtractor::new(config.rate_limiting.trust_forwarded_for),
    );

    // Run the server with graceful shutdown on Ctrl+C
    HttpServer::new(config.server.http_addr, app)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;

    info!("Hostwatch Telemetry Service stopped");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
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
