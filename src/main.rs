use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use event_photos::{
    api,
    config::{Config, StorageBackend},
    object_store as obj,
    storage::Database,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "event-photos starting");

    // Load configuration
    let config = Config::load()?;
    info!(
        bind_address = %config.node.bind_address,
        test_mode = config.test_mode,
        "Loaded configuration"
    );

    // Initialize database
    let db = Database::open(&config.node.data_dir)?;
    info!("Database opened at: {}", config.node.data_dir);

    // Initialize object store backend
    let object_store: Arc<dyn obj::ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let root = Path::new(&config.storage.local_storage_path).join(&config.storage.bucket);
            let store =
                obj::LocalStore::new(&root)?.with_public_base_url(&config.storage.public_base_url);
            info!("Using local storage backend at: {}", root.display());
            Arc::new(store)
        }
        StorageBackend::Gcs => {
            let bucket = config
                .storage
                .gcs_bucket
                .as_deref()
                .context("GCS_BUCKET must be set for the gcs backend")?;
            let store =
                obj::GcsStore::new(bucket, config.storage.gcs_credentials_file.as_deref()).await?;
            info!("Using GCS storage backend, bucket: {}", bucket);
            Arc::new(store)
        }
    };

    // Create shared state
    let state = Arc::new(AppState::new(config.clone(), db, object_store));

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
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

    info!("Shutdown signal received, draining connections");
}
