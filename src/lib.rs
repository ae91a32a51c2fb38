//! Moquette usage collector.
//!
//! Receives startup notifications from Moquette brokers, enriches them with
//! the caller's address and a GeoIP location, and stores them in a Xata
//! table. The `xata-dump` binary exports that table as JSON lines.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod services;
