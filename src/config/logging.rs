//! Tracing setup shared by both binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::get_env;

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `default_directives`. `LOG_FORMAT=json` switches to
/// JSON lines. Only reads the environment (and `.env`) directly so that
/// configuration problems found later are logged.
pub fn init_tracing(default_directives: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives.into());
    let registry = tracing_subscriber::registry().with(filter);

    if is_json(&get_env("LOG_FORMAT", Some("text"))) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn is_json(format: &str) -> bool {
    format.trim().eq_ignore_ascii_case("json")
}
