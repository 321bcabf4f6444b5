//! Backend of Share-Wear, a marketplace where donors list second-hand items and recipients
//! request them.
//!
//!
//!
//! # General Infrastructure
//! - One axum server exposes the REST API under `/api` plus the uploaded images under `/uploads`
//! - Documents live in Redis when `REDIS_URL` is set, otherwise in process memory
//! - Uploaded images are resized on disk in `UPLOAD_DIR`
//! - Emails go out through an HTTP relay when `MAIL_RELAY_URL` is set, otherwise they are only logged
//!
//!
//!
//! # Donation Flow
//!
//! - Donor lists an item, it starts `available`
//! - A recipient requests it, the donor approves or rejects
//! - Either side may chat and agree on a pickup slot in the meantime
//! - The donor marks it donated after pickup, after which the recipient may rate the donor
//!
//! Each step notifies the counterparty in-app, and donation decisions also by email.
//!
//!
//!
//! # Preventing Server Overload
//!
//! - Every `/api` request counts against a fixed per-IP window (`RATE_LIMIT_MAX` per
//!   `RATE_LIMIT_WINDOW_SECS`)
//! - Behind a proxy (`TRUST_PROXY`), the last `X-Forwarded-For` entry, appended by that proxy, is the client
//! - Upload bodies are capped at 5 files of 5 MiB each
//!
//!
//!
//! # Notes
//!
//! ## Redis
//! Documents are stored as JSON, one hash per collection. Updates are optimistic: the handler reads a
//! document, applies the change, and only writes it back if nobody else wrote in between. Uniqueness
//! (emails, one conversation per donation and requester, one rating per rater) rides on `HSETNX`
//! claims rather than scans, so two racing requests cannot both win.
//!
//!
//!
//! # Setup
//!
//! Run against an in-memory store.
//! ```sh
//! JWT_SECRET=dev RUST_LOG=info cargo run -p sharewear
//! ```
//!
//! Seed a running server.
//! ```sh
//! cargo run -p seed -- http://localhost:5001 backend/seed/fixture.json
//! ```
use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod images;
pub mod mailer;
pub mod middleware;
pub mod notify;
pub mod populate;
pub mod routes;
pub mod state;
pub mod utils;

use images::{MAX_FILE_SIZE, MAX_FILES};
use middleware::{
    correlation::correlation_middleware, logging::logging_middleware,
    rate_limit::rate_limit_middleware,
};
use routes::health::health_handler;
use state::AppState;

/// Room for multipart boundaries and headers on top of the file bytes.
const MULTIPART_SLACK: usize = 64 * 1024;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");
    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.client_origin.clone())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    let api = Router::new()
        .nest("/users", routes::users::router())
        .nest("/donations", routes::donations::router())
        .nest(
            "/upload",
            routes::uploads::router()
                .layer(DefaultBodyLimit::max(MAX_FILES * MAX_FILE_SIZE + MULTIPART_SLACK)),
        )
        .nest("/notifications", routes::notifications::router())
        .nest("/conversations", routes::conversations::router())
        .nest("/slots", routes::slots::router())
        .nest("/ratings", routes::ratings::router())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_handler))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(from_fn(logging_middleware))
        .layer(from_fn(correlation_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
