//! Environment variable configuration module.
//!
//! Provides environment variable loading and the global `APP_CONFIG` instance.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::{Lazy, OnceCell};
use validator::Validate;

use crate::error::{AppError, AppResult, ValidationErrorExt};

/// Outcome of the one-time `.env` load.
static DOTENV: OnceCell<Result<PathBuf, String>> = OnceCell::new();

/// Largest page Xata accepts on the query endpoint.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Loads the .env file once and remembers the outcome.
///
/// Nothing is logged here because this can run before the tracing
/// subscriber exists; see [`log_dotenv_status`].
pub fn dotenv_status() -> &'static Result<PathBuf, String> {
    DOTENV.get_or_init(|| dotenvy::dotenv().map_err(|e| e.to_string()))
}

/// Reports how the .env load went. Call after tracing is initialized.
pub fn log_dotenv_status() {
    match dotenv_status() {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env file"),
        Err(e) => tracing::debug!("Warning: .env file not found or error loading: {}", e),
    }
}

/// Retrieves an environment variable by key.
///
/// If the variable is not set, returns the provided default value.
/// If no default is provided and the variable is not set, returns an empty string.
pub fn get_env(key: &str, default: Option<&str>) -> String {
    let _ = dotenv_status();
    env::var(key).unwrap_or_else(|_| default.unwrap_or("").to_string())
}

/// Parses `key` from `lookup`, falling back to `default` only when the
/// variable is unset or empty. Malformed values are recorded in `errors`.
fn parse_var<T, F>(lookup: &F, key: &str, default: T, errors: &mut Vec<String>) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            errors.push(format!("{key} has an invalid value '{raw}'"));
            default
        }),
        _ => default,
    }
}

/// Application configuration loaded from environment variables.
///
/// Shared by the collector server and the dump tool.
#[derive(Clone, Validate)]
pub struct AppConfig {
    // Xata credentials and location
    #[validate(length(min = 1, message = "API_KEY must be set"))]
    pub api_key: String,
    #[validate(length(min = 1, message = "WORKSPACE must be set"))]
    pub workspace: String,
    #[validate(length(min = 1, message = "REGION must be set"))]
    pub region: String,
    #[validate(length(min = 1, message = "XATA_DATABASE must not be empty"))]
    pub database: String,
    #[validate(length(min = 1, message = "XATA_TABLE must not be empty"))]
    pub table: String,
    #[validate(url(message = "XATA_BASE_URL must be an absolute URL"))]
    pub base_url: Option<String>,

    // Collector server
    pub server_port: u16,

    // GeoLite2 database
    pub geolite_license_key: String,
    #[validate(length(min = 1, message = "GEOLITE_DIR must not be empty"))]
    pub geolite_dir: String,
    #[validate(url(message = "GEOLITE_DOWNLOAD_URL must be an absolute URL"))]
    pub geolite_download_url: String,

    // Paging and output (dump tool)
    #[validate(range(min = 1, max = 200, message = "PAGE_SIZE must be between 1 and 200"))]
    pub page_size: u32,
    #[validate(length(min = 1, message = "OUTPUT_FILE must not be empty"))]
    pub output_file: String,

    // HTTP behaviour
    #[validate(range(min = 1, message = "HTTP_TIMEOUT_SECS must be positive"))]
    pub http_timeout_secs: u64,
    pub max_redirects: usize,

    /// Variables that were set but could not be parsed.
    pub parse_errors: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("workspace", &self.workspace)
            .field("region", &self.region)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("base_url", &self.base_url)
            .field("server_port", &self.server_port)
            .field("geolite_license_key", &"<redacted>")
            .field("geolite_dir", &self.geolite_dir)
            .field("geolite_download_url", &self.geolite_download_url)
            .field("page_size", &self.page_size)
            .field("output_file", &self.output_file)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_redirects", &self.max_redirects)
            .field("parse_errors", &self.parse_errors)
            .finish()
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` from environment variables.
    pub fn from_env() -> Self {
        let _ = dotenv_status();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Creates an `AppConfig` from any key lookup.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let mut parse_errors = Vec::new();

        let base_url = get("XATA_BASE_URL", "");

        Self {
            api_key: get("API_KEY", ""),
            workspace: get("WORKSPACE", ""),
            region: get("REGION", ""),
            database: get("XATA_DATABASE", "moquette_instances:main"),
            table: get("XATA_TABLE", "runs"),
            base_url: if base_url.is_empty() {
                None
            } else {
                Some(base_url)
            },

            server_port: parse_var(&lookup, "SERVER_PORT", 8080, &mut parse_errors),

            geolite_license_key: get("GEOLITE2_LICENSE_KEY", ""),
            geolite_dir: get("GEOLITE_DIR", "geolite"),
            geolite_download_url: get(
                "GEOLITE_DOWNLOAD_URL",
                "https://download.maxmind.com/app/geoip_download",
            ),

            page_size: parse_var(&lookup, "PAGE_SIZE", MAX_PAGE_SIZE, &mut parse_errors),
            output_file: get("OUTPUT_FILE", "rows.json"),

            http_timeout_secs: parse_var(&lookup, "HTTP_TIMEOUT_SECS", 30, &mut parse_errors),
            max_redirects: parse_var(&lookup, "MAX_REDIRECTS", 5, &mut parse_errors),

            parse_errors,
        }
    }

    /// Validates the configuration, reporting the first offending field.
    pub fn check(&self) -> AppResult<()> {
        if let Some(first) = self.parse_errors.first() {
            return Err(AppError::Config(first.clone()));
        }
        self.validate().map_err(|e| e.to_config_error())
    }

    /// Xata host for the configured workspace and region.
    pub fn host(&self) -> String {
        format!("{}.{}.xata.sh", self.workspace, self.region)
    }

    /// Base URL of the configured table, e.g. `https://host/db/{db}/tables/{table}`.
    pub fn table_url(&self) -> String {
        let base = self.base_url.as_deref().map_or_else(
            || format!("https://{}", self.host()),
            |b| b.trim_end_matches('/').to_string(),
        );
        format!("{base}/db/{}/tables/{}", self.database, self.table)
    }

    /// Full URL of the table query endpoint.
    pub fn query_url(&self) -> String {
        format!("{}/query", self.table_url())
    }

    /// Full URL of the record insert endpoint.
    pub fn data_url(&self) -> String {
        format!("{}/data", self.table_url())
    }
}

/// Global application configuration instance.
pub static APP_CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);
