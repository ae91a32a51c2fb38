//! GeoIP 모듈.

pub mod bootstrap;
pub mod resolver;

pub use bootstrap::{ensure_database, extract_tar_gz, DATABASE_FILE};
pub use resolver::{GeoLocation, GeoResolver, MaxMindResolver};
