//! Module Registry Server
//!
//! Main entry point for the module registry HTTP server.
//! This binary wires the version registry, blob store, secret store and
//! source host into the services and serves the API with graceful shutdown.

mod config;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use module_registry_api::build_api_server;
use module_registry_db::{
    close_pool, create_pool, pool::mask_password, BlobStore, EnvSecretStore, FileSystemBlobStore,
    HandleSigner, InMemoryVersionRepository, PgPool, PoolConfig, PostgresVersionRepository,
    SecretStore, StaticSecretStore, VersionRepository,
};
use module_registry_service::{
    ArtifactPackager, Collaborators, GitSnapshotRetriever, IngestionSettings, ServiceRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use config::ServerConfig;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration directory
    #[arg(short, long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Server host
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Database URL, or `memory`
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Log raw webhook events
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = ServerConfig::load(&args.config_dir, &args.environment)
        .context("Failed to load configuration")?;

    // Command-line arguments win over files and environment
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database.url = database_url;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    config.logging.debug |= args.debug;

    telemetry::init_with_config(telemetry::TelemetryConfig::from(&config.logging));

    info!("Starting Module Registry Server");
    info!("Environment: {}", args.environment);
    info!("Server: {}", config.bind_address());
    info!("Version registry: {}", mask_password(&config.database.url));
    info!("Source host: {}", config.source.host);

    let secrets = setup_secrets(&config);
    let (versions, pool) = setup_versions(&config).await?;
    let blobs = setup_blobs(&config, secrets.as_ref()).await?;

    let snapshots = GitSnapshotRetriever::new(&config.source.host, secrets.clone())
        .context("Invalid source host")?
        .with_timeout(Duration::from_secs(config.source.fetch_timeout_seconds));

    let collaborators = Collaborators {
        versions,
        blobs,
        secrets,
        snapshots: Arc::new(snapshots),
        packager: ArtifactPackager::new(Duration::from_secs(
            config.source.package_timeout_seconds,
        )),
        debug: config.logging.debug,
    };
    let settings = IngestionSettings {
        provider: config.source.provider.clone(),
        scratch_root: config.source.scratch_root.clone(),
    };

    let services = ServiceRegistry::new(collaborators, settings);
    let app = build_api_server(services, config.logging.debug);

    let http_addr: SocketAddr = config
        .bind_address()
        .parse()
        .context("Invalid HTTP bind address")?;

    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .context("Failed to bind HTTP server")?;

    info!("HTTP Server listening on http://{}", http_addr);

    if config.server.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP Server error")?;
    } else {
        axum::serve(listener, app)
            .await
            .context("HTTP Server error")?;
    }

    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Secret store: inline values when configured, the environment otherwise
fn setup_secrets(config: &ServerConfig) -> Arc<dyn SecretStore> {
    if config.secrets.values.is_empty() {
        info!("Reading secrets from the environment");
        Arc::new(EnvSecretStore::new(config.secrets.prefix.clone()))
    } else {
        info!(count = config.secrets.values.len(), "Using configured secrets");
        Arc::new(StaticSecretStore::from(config.secrets.values.clone()))
    }
}

/// Version registry, with the pool when PostgreSQL is used
async fn setup_versions(
    config: &ServerConfig,
) -> Result<(Arc<dyn VersionRepository>, Option<PgPool>)> {
    if config.database.is_in_memory() {
        warn!("Using the in-memory version registry; registrations are lost on restart");
        return Ok((Arc::new(InMemoryVersionRepository::new()), None));
    }

    let pool_config = PoolConfig::new(&config.database.url)
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .connect_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .run_migrations(config.database.run_migrations)
        .enable_logging(config.logging.debug);

    let pool = create_pool(&pool_config)
        .await
        .context("Failed to create database connection pool")?;

    info!("Version registry connection established");
    Ok((Arc::new(PostgresVersionRepository::new(pool.clone())), Some(pool)))
}

/// Filesystem blob store with its handle signer
async fn setup_blobs(
    config: &ServerConfig,
    secrets: &dyn SecretStore,
) -> Result<Arc<dyn BlobStore>> {
    let public_url = config.server.public_url.as_str();

    let signer = match secrets
        .get_secret(&config.storage.signing_key_secret)
        .await
        .context("Failed to read the handle signing key")?
    {
        Some(key) => HandleSigner::new(key.as_bytes(), public_url)
            .context("Invalid handle signing configuration")?,
        None => {
            warn!(
                "No handle signing key configured; issued handles stop working on restart"
            );
            HandleSigner::generate(public_url).context("Invalid public URL")?
        }
    };

    tokio::fs::create_dir_all(&config.storage.root)
        .await
        .with_context(|| {
            format!(
                "Failed to create blob store root {}",
                config.storage.root.display()
            )
        })?;

    info!("Blob store: {}", config.storage.root.display());
    Ok(Arc::new(FileSystemBlobStore::new(
        config.storage.root.clone(),
        signer,
    )))
}

/// Graceful shutdown signal handler
///
/// Waits for SIGTERM or SIGINT (Ctrl+C).
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
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
