//! Application state module.
//!
//! Contains the Xata client and GeoIP resolver shared by handlers.

use std::sync::Arc;

use crate::client::XataClient;
use crate::geo::GeoResolver;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Client for the `runs` table
    pub xata: XataClient,
    /// GeoIP lookup, called on the blocking pool
    pub geo: Arc<dyn GeoResolver>,
}

impl AppState {
    /// Creates a new `AppState` instance.
    #[must_use]
    pub fn new(xata: XataClient, geo: Arc<dyn GeoResolver>) -> Self {
        Self { xata, geo }
    }
}
