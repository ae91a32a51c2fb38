//! API module.
//!
//! Contains the collector's HTTP handlers, routes and shared state.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_routes;
pub use state::AppState;
