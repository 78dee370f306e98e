//! Cadence - NEAR data-lake indexing runner.
//!
//! # Usage
//!
//! ```bash
//! # Start with default config
//! cadence
//!
//! # Start with environment overrides
//! REDIS_URL=redis://localhost:6379 DATABASE_URL=postgres://localhost/postgres cadence
//! ```

mod handler;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tonic::transport::Server;
use tracing::{debug, error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use cadence_cache::{RedisConfig, RedisStreamClient};
use cadence_core::error::{CacheError, ConsumerError};
use cadence_core::identity::IndexerConfig;
use cadence_core::metrics::init_metrics;
use cadence_core::ports::StreamStore;
use cadence_core::services::{ConsumerConfig, StreamConsumer};
use cadence_lake::{LakeClient, LakeConfig, ObjectStoreFetcher};
use cadence_provisioner::proto::provisioner_server::ProvisionerServer;
use cadence_provisioner::{
    HasuraClient, HasuraConfig, InMemoryTaskStore, Provisioner, ProvisionerConfig,
    ProvisionerService, TaskRegistry,
};

use handler::TracingBlockHandler;

/// Cadence CLI - NEAR data-lake indexing runner.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Cadence - NEAR data-lake indexing runner")]
#[command(version)]
struct Cli {
    /// Redis URL for the stream cache.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Network whose lake bucket to read (mainnet, testnet).
    #[arg(long, env = "NETWORK", default_value = "mainnet")]
    network: String,

    /// Endpoint override for S3-compatible lake storage.
    #[arg(long, env = "LAKE_ENDPOINT")]
    lake_endpoint: Option<String>,

    /// Administrative PostgreSQL URL for tenant database creation.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/postgres"
    )]
    database_url: String,

    /// Hasura endpoint.
    #[arg(long, env = "HASURA_ENDPOINT", default_value = "http://localhost:8080")]
    hasura_endpoint: String,

    /// Hasura admin secret.
    #[arg(long, env = "HASURA_ADMIN_SECRET", default_value = "")]
    hasura_admin_secret: String,

    /// Host tenant databases live on, as Hasura should reach it.
    #[arg(long, env = "PG_HOST", default_value = "localhost")]
    pg_host: String,

    /// Port of that host.
    #[arg(long, env = "PG_PORT", default_value = "5432")]
    pg_port: u16,

    /// Provisioning gRPC port.
    #[arg(long, env = "GRPC_PORT", default_value = "50051")]
    grpc_port: u16,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_enabled = match format!("0.0.0.0:{}", cli.metrics_port).parse::<std::net::SocketAddr>() {
        Ok(metrics_addr) => {
            match PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                Ok(()) => {
                    init_metrics();
                    true
                }
                Err(e) => {
                    warn!("⚠️  Failed to start metrics exporter: {}. Continuing without metrics.", e);
                    false
                }
            }
        }
        Err(e) => {
            warn!("⚠️  Invalid metrics address: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting Cadence");
    debug!(redis_url = %cli.redis_url, "Stream cache endpoint");
    debug!(database_url = %mask_password(&cli.database_url), "Admin database endpoint");
    debug!(hasura_endpoint = %cli.hasura_endpoint, "Hasura endpoint");

    // ─────────────────────────────────────────────────────────────────────────
    // 🗄️ STREAM CACHE & LAKE
    // ─────────────────────────────────────────────────────────────────────────
    info!("🗄️  Connecting to stream cache...");
    let redis = Arc::new(
        RedisStreamClient::connect(RedisConfig {
            url: cli.redis_url.clone(),
        })
        .await
        .context("Failed to connect to Redis")?,
    );

    let fetcher = Arc::new(
        ObjectStoreFetcher::new(LakeConfig {
            network: cli.network.clone(),
            endpoint: cli.lake_endpoint.clone(),
            ..Default::default()
        })
        .context("Failed to build object store fetcher")?,
    );
    let lake = Arc::new(LakeClient::new(redis.clone(), fetcher));
    info!(network = %cli.network, "🌊 Lake client ready");

    // ─────────────────────────────────────────────────────────────────────────
    // 🏗️ PROVISIONING
    // ─────────────────────────────────────────────────────────────────────────
    info!("🏗️  Connecting to admin database...");
    let admin_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&cli.database_url)
        .await
        .context("Failed to connect to admin database")?;

    let hasura = HasuraClient::new(HasuraConfig {
        endpoint: cli.hasura_endpoint.clone(),
        admin_secret: cli.hasura_admin_secret.clone(),
        ..Default::default()
    })
    .context("Failed to build Hasura client")?;

    let provisioner = Arc::new(Provisioner::new(
        hasura,
        admin_pool.clone(),
        ProvisionerConfig {
            pg_host: cli.pg_host.clone(),
            pg_port: cli.pg_port,
        },
    ));
    let registry = Arc::new(TaskRegistry::new(Arc::new(InMemoryTaskStore::new())));
    let provisioner_service = ProvisionerService::new(registry, provisioner);

    // ─────────────────────────────────────────────────────────────────────────
    // ⚡ SERVICES START
    // ─────────────────────────────────────────────────────────────────────────
    let (shutdown_tx, _) = watch::channel(false);

    let grpc_addr: std::net::SocketAddr = format!("0.0.0.0:{}", cli.grpc_port)
        .parse()
        .context("Invalid gRPC address")?;
    let mut grpc_shutdown_rx = shutdown_tx.subscribe();
    let grpc_handle = tokio::spawn(
        async move {
            let shutdown_signal = async move {
                while !*grpc_shutdown_rx.borrow() {
                    if grpc_shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            };

            if let Err(e) = Server::builder()
                .add_service(ProvisionerServer::new(provisioner_service))
                .serve_with_shutdown(grpc_addr, shutdown_signal)
                .await
            {
                error!(error = %e, "❌ gRPC server error");
            }
            debug!("gRPC server stopped");
        }
        .instrument(info_span!("grpc")),
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 📡 TENANT STREAM DISCOVERY
    // ─────────────────────────────────────────────────────────────────────────
    let streams = match redis.get_streams().await {
        Ok(streams) => streams,
        Err(e) => {
            warn!(error = %e, "⚠️  Stream discovery failed, starting with no consumers");
            Vec::new()
        }
    };
    info!("📡 Discovered {} tenant stream(s)", streams.len());

    let mut consumer_handles = Vec::new();
    for stream_key in streams {
        let storage = match redis.get_stream_storage(&stream_key).await {
            Ok(storage) => storage,
            Err(CacheError::NotFound(_)) => {
                warn!(stream = %stream_key, "⚠️  Stream has no storage metadata, skipping");
                continue;
            }
            Err(e) => {
                warn!(stream = %stream_key, error = %e, "⚠️  Storage lookup failed, skipping");
                continue;
            }
        };

        let config = IndexerConfig::from(storage);
        let identity = config.identity();
        info!(
            tenant = %identity,
            executor = %identity.executor_id(),
            stream = %stream_key,
            "▶️  Starting consumer"
        );

        let consumer = StreamConsumer::new(
            ConsumerConfig {
                stream_key: stream_key.clone(),
                ..Default::default()
            },
            identity.clone(),
            redis.clone(),
            lake.clone(),
            Arc::new(TracingBlockHandler::new(identity, config.log_level)),
        );

        let consumer_shutdown_rx = shutdown_tx.subscribe();
        consumer_handles.push(tokio::spawn(
            async move {
                if let Err(e) = consumer.run(consumer_shutdown_rx).await {
                    match e {
                        ConsumerError::ShutdownRequested => {}
                        _ => error!(error = ?e, "❌ Consumer error"),
                    }
                }
            }
            .instrument(info_span!("consumer", stream = %stream_key)),
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ READY
    // ─────────────────────────────────────────────────────────────────────────
    info!("✅ Cadence ready");
    info!("   🏗️ Provisioning gRPC: 0.0.0.0:{}", cli.grpc_port);
    if metrics_enabled {
        info!("   📊 Metrics:  http://localhost:{}/metrics", cli.metrics_port);
    } else {
        info!("   📊 Metrics:  disabled");
    }
    info!("   Press Ctrl+C to stop");

    shutdown_signal().await;

    // ─────────────────────────────────────────────────────────────────────────
    // 🛑 SHUTDOWN
    // ─────────────────────────────────────────────────────────────────────────
    info!("🛑 Shutting down...");
    let _ = shutdown_tx.send(true);

    let consumers = futures::future::join_all(consumer_handles);
    match tokio::time::timeout(Duration::from_secs(30), consumers).await {
        Ok(_) => debug!("Consumers stopped"),
        Err(_) => warn!("⚠️  Consumer shutdown timed out"),
    }

    match tokio::time::timeout(Duration::from_secs(10), grpc_handle).await {
        Ok(_) => debug!("gRPC server stopped"),
        Err(_) => warn!("⚠️  gRPC shutdown timed out"),
    }

    admin_pool.close().await;

    info!("🛑 Shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
