//! HTTP request handler module.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{Map, Value};

use crate::api::state::AppState;
use crate::error::AppResult;
use crate::geo::GeoLocation;
use crate::models::{build_payload, format_startup_date};

/// Broker startup notification handler.
///
/// Enriches the notification with the caller's address, the current time
/// and the location of the reported `remote_ip`, then inserts it into Xata.
/// Xata answering 201 gives 200; any other Xata status gives 404; failing
/// to reach Xata gives 502.
///
/// # Route
///
/// `POST /api/v1/notify`
pub async fn notify_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(request): Json<Map<String, Value>>,
) -> AppResult<StatusCode> {
    let startup_date = format_startup_date(Utc::now());
    tracing::info!(peer = %peer.ip(), startup_date = %startup_date, "Collecting notification");

    let location = lookup_location(&state, request.get("remote_ip")).await;
    if let Some(location) = &location {
        tracing::debug!(?location, "Location data");
    }

    let payload = build_payload(
        &peer.ip().to_string(),
        &startup_date,
        location.as_ref(),
        &request,
    )?;

    let (status, body) = state.xata.insert_record(&Value::Object(payload)).await?;
    if status == StatusCode::CREATED {
        tracing::info!("Body response: {}", body);
        Ok(StatusCode::OK)
    } else {
        tracing::warn!(
            status = status.as_u16(),
            body = %body,
            "Problem reaching Xata"
        );
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Resolves the reported `remote_ip`.
///
/// A missing or unparsable address, an address not in the database and a
/// failed lookup all yield `None`; the record is stored without location.
async fn lookup_location(state: &AppState, remote_ip: Option<&Value>) -> Option<GeoLocation> {
    let raw = remote_ip.and_then(Value::as_str)?;
    let Ok(ip) = raw.trim().parse::<IpAddr>() else {
        tracing::warn!(remote_ip = %raw, "remote_ip is not an IP address, skipping GeoIP lookup");
        return None;
    };

    let geo = state.geo.clone();
    match tokio::task::spawn_blocking(move || geo.resolve(ip)).await {
        Ok(Ok(location)) => location,
        Ok(Err(e)) => {
            tracing::warn!(%ip, "GeoIP lookup failed: {}", e);
            None
        }
        Err(e) => {
            tracing::warn!(%ip, "GeoIP lookup task failed: {}", e);
            None
        }
    }
}
