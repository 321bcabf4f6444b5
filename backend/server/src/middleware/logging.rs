use std::{net::SocketAddr, time::Instant};

use axum::{body::Body, extract::ConnectInfo, http::Request, middleware::Next, response::Response};
use tracing::{debug, error, trace, warn};

use super::correlation::CorrelationId;

pub async fn logging_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();
    let correlation_id = req
        .extensions()
        .get::<CorrelationId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    if path == "/health" {
        trace!(target: "http", %correlation_id, %client_ip, %method, %path, status, duration_ms, "health check");
    } else if response.status().is_server_error() {
        error!(target: "http", %correlation_id, %client_ip, %method, %path, status, duration_ms, "request failed");
    } else if response.status().is_client_error() {
        warn!(target: "http", %correlation_id, %client_ip, %method, %path, status, duration_ms, "request rejected");
    } else {
        debug!(target: "http", %correlation_id, %client_ip, %method, %path, status, duration_ms, "request");
    }

    response
}
