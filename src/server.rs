//! Axum router construction and route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and returns
//! a ready-to-serve [`axum::Router`].

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::errors::generate_request_id;
use crate::handlers::{filesystem, network, objects, system};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Build the axum [`Router`] with all routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Landing + informational pages.
        .route("/", get(system::root))
        .route("/home", get(system::home))
        .route("/about", get(system::about))
        .route("/rip", get(system::rip_debug))
        .route("/error", get(system::error_debug))
        // Liveness toggle + readiness.
        .route("/health", get(system::health).post(system::toggle_health))
        .route("/readyz", get(system::readyz))
        // Logging and crash demos.
        .route("/log-stdout", post(system::log_stdout))
        .route("/log-stderr", post(system::log_stderr))
        .route("/crash", post(system::crash))
        // Mounted resources.
        .route("/filesystem", get(filesystem::browse))
        .route("/create-file", post(filesystem::create_file))
        .route("/secrets", get(filesystem::secrets))
        .route("/configmaps", get(filesystem::configmaps))
        .route("/env-variables", get(system::env_variables))
        // Object storage (wildcard key captures slashes).
        .route("/storage", get(objects::browse))
        .route("/storage/view/*key", get(objects::view))
        .route("/storage/upload", post(objects::upload))
        // Networking + autoscaling demos.
        .route("/network", get(network::page).post(network::resolve))
        .route("/network/colors", get(network::colors))
        .route("/autoscaling", get(network::autoscaling))
        .route("/hpa", get(network::hpa))
        // Prometheus metrics endpoint.
        .route("/metrics", get(metrics_handler))
        // Application state shared across all handlers.
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        // common_headers_middleware stamps every response.
        .layer(middleware::from_fn(common_headers_middleware))
        // metrics_middleware is outer (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
        // Request traces outermost.
        .layer(TraceLayer::new_for_http())
}

// -- Common headers middleware -----------------------------------------------

/// Middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `podbay`
async fn common_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        headers.insert("x-request-id", HeaderValue::from_str(&request_id).unwrap());
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    headers.insert("date", HeaderValue::from_str(&date).unwrap());
    headers.insert("server", HeaderValue::from_static("podbay"));

    response
}

// -- Tests -------------------------------------------------------------------
