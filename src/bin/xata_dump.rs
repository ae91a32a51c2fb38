//! Xata dump entry point.

use std::path::Path;

use tokio::signal;

use moquette_collector::client::XataClient;
use moquette_collector::config::{init_tracing, log_dotenv_status, APP_CONFIG};
use moquette_collector::error::AppResult;
use moquette_collector::services::{dump_to_file, DumpSummary};

// High-performance memory allocator for non-MSVC targets
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Exit code used when the run is interrupted with Ctrl+C.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    init_tracing("moquette_collector=info,xata_dump=info");
    log_dotenv_status();

    tokio::select! {
        result = run() => match result {
            Ok(summary) => {
                tracing::info!(
                    pages = summary.pages,
                    records = summary.records,
                    elapsed_ms = summary.elapsed_ms(),
                    output = %APP_CONFIG.output_file,
                    "Terminated"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Dump failed");
                std::process::exit(e.exit_code());
            }
        },
        () = interrupt_signal() => {
            tracing::warn!(
                output = %APP_CONFIG.output_file,
                "Interrupted, output holds the pages written so far"
            );
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}

async fn run() -> AppResult<DumpSummary> {
    let config = &*APP_CONFIG;
    config.check()?;

    let client = XataClient::new(config)?;
    tracing::info!(
        url = %client.query_url(),
        page_size = config.page_size,
        output = %config.output_file,
        "Starting dump"
    );

    dump_to_file(&client, Path::new(&config.output_file), config.page_size).await
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupt_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
