//! 라우트 설정 모듈.

use axum::{routing::post, Router};

use crate::api::handlers::notify_handler;
use crate::api::state::AppState;

/// Creates and configures all collector routes.
///
/// # Routes
///
/// ## API Routes (v1)
/// - `POST /api/v1/notify` - Collect a broker startup notification
pub fn create_routes(state: AppState) -> Router {
    let v1_routes = Router::new().route("/notify", post(notify_handler));

    Router::new().nest("/api/v1", v1_routes).with_state(state)
}
