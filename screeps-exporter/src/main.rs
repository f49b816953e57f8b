//! Prometheus exporter for Screeps world state.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use screeps_exporter::{
    ALL_FAMILIES, Exporter, ExporterConfig, HttpServer, InMemoryRepository, MetricSink,
    MongoRepository, SnapshotRepository,
};

/// Prometheus exporter for Screeps world state.
#[derive(Parser, Debug)]
#[command(name = "screeps-exporter")]
#[command(about = "Export Screeps users and room objects as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// MongoDB connection string (overrides config).
    #[arg(long, env = "MONGO_URL")]
    mongo_url: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,

    /// Serve a JSON file of user and object documents instead of MongoDB.
    #[arg(long, conflicts_with = "mongo_url")]
    fixtures: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // CLI and environment override the file
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    } else if let Ok(port) = std::env::var("PORT") {
        let port = port
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid PORT {}: {}", port, e))?;
        config.override_port(port)?;
    }
    if let Some(url) = args.mongo_url {
        config.mongo.url = url;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    screeps_common::init_tracing(&config.logging)?;

    info!("Starting Screeps Prometheus Exporter");

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (repository, mongo): (Arc<dyn SnapshotRepository>, Option<Arc<MongoRepository>>) =
        match &args.fixtures {
            Some(path) => {
                info!(path = %path, "Serving fixture documents");
                let fixtures: Arc<dyn SnapshotRepository> =
                    Arc::new(InMemoryRepository::from_fixture_file(path)?);
                (fixtures, None)
            }
            None => {
                let mongo = Arc::new(MongoRepository::connect(&config.mongo).await?);
                if let Err(e) = mongo.ping().await {
                    warn!(error = %e, "MongoDB not reachable yet, scrapes will fail until it is");
                }
                let repository: Arc<dyn SnapshotRepository> = mongo.clone();
                (repository, Some(mongo))
            }
        };

    let sink = Arc::new(MetricSink::with_families(ALL_FAMILIES.iter()));
    let exporter = Arc::new(Exporter::new(
        repository,
        sink,
        config.metrics.unknown_user_label.clone(),
    ));

    let http_server = HttpServer::new(
        exporter.clone(),
        config.listen_addr()?,
        config.http.metrics_path.clone(),
    );

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    // Print final stats
    let stats = exporter.stats();
    info!(
        cycles_started = stats.cycles_started,
        cycles_succeeded = stats.cycles_succeeded,
        cycles_failed = stats.cycles_failed,
        users_loaded = stats.users_loaded,
        objects_processed = stats.objects_processed,
        generation = exporter.sink().generation(),
        series_count = exporter.sink().series_count(),
        "Final statistics"
    );

    // Exporter holds the last repository handle besides ours
    drop(exporter);
    if let Some(mongo) = mongo {
        match Arc::try_unwrap(mongo) {
            Ok(mongo) => mongo.shutdown().await,
            Err(_) => warn!("Repository still in use, skipping graceful close"),
        }
    }

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
