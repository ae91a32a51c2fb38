//! Moquette usage collector entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tower_http::trace::TraceLayer;

use moquette_collector::api::{create_routes, AppState};
use moquette_collector::client::XataClient;
use moquette_collector::config::{init_tracing, log_dotenv_status, APP_CONFIG};
use moquette_collector::error::AppResult;
use moquette_collector::geo::{ensure_database, MaxMindResolver};

// High-performance memory allocator for non-MSVC targets
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Entry point for the collector service.
#[tokio::main(flavor = "multi_thread")]
async fn main() {
    init_tracing("moquette_collector=info,collector=info,tower_http=info");
    log_dotenv_status();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Collector stopped");
        std::process::exit(e.exit_code());
    }

    tracing::info!("Shutdown complete");
}

async fn run() -> AppResult<()> {
    let config = &*APP_CONFIG;
    config.check()?;

    // GeoIP database (downloaded on first start)
    let db_path = load_geo_database().await?;
    let resolver = MaxMindResolver::open(&db_path)?;
    tracing::info!(path = %db_path.display(), "GeoIP lookup ready");

    // Create application state
    let xata = XataClient::new(config)?;
    tracing::info!(url = %xata.data_url(), "Forwarding notifications to Xata");
    let state = AppState::new(xata, Arc::new(resolver));

    let app = create_routes(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(port = config.server_port, "Listening for notifications");

    // ConnectInfo supplies the caller's address for the IP field
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutting down...");
    Ok(())
}

async fn load_geo_database() -> AppResult<PathBuf> {
    ensure_database(&APP_CONFIG).await.inspect_err(|e| {
        tracing::error!("Can't start GeoIP lookup: {}", e);
    })
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        },
    }
}
