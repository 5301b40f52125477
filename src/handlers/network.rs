//! Networking demo handlers: DNS lookups and the sibling-microservice
//! relay used by the autoscaling walkthrough.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::pages;
use crate::AppState;

/// Form payload for the DNS lookup.
#[derive(Debug, Deserialize)]
pub struct DnsForm {
    #[serde(rename = "dnsHost")]
    pub dns_host: Option<String>,
}

/// `GET /network`
pub async fn page() -> Response {
    Html(pages::network_page(None, None)).into_response()
}

/// `POST /network` -- resolve the submitted hostname and render the
/// addresses, one per line.
pub async fn resolve(Form(form): Form<DnsForm>) -> Response {
    let Some(host) = form.dns_host.filter(|h| !h.is_empty()) else {
        error!("Empty form POSTed to /network");
        return Html(pages::network_page(
            Some(""),
            Some("Please provide a hostname"),
        ))
        .into_response();
    };

    info!("DNS lookup on: {}", host);
    let result = match tokio::net::lookup_host((host.as_str(), 0u16)).await {
        Ok(addrs) => {
            let mut lines: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
            lines.dedup();
            if lines.is_empty() {
                "no addresses found".to_string()
            } else {
                lines.join("\n")
            }
        }
        Err(e) => e.to_string(),
    };

    Html(pages::network_page(Some(&host), Some(&result))).into_response()
}

/// `GET /network/colors` -- relay the microservice's `/` response.
pub async fn colors(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let base = state
        .config
        .microservice
        .base_url()
        .ok_or(AppError::MicroserviceUnavailable)?;

    let resp = state
        .http
        .get(format!("{base}/"))
        .send()
        .await
        .map_err(|e| {
            error!("microservice endpoint not available: {e}");
            AppError::MicroserviceUnavailable
        })?;

    let body = resp
        .text()
        .await
        .map_err(|_| AppError::MicroserviceUnavailable)?;

    info!("msg from microservice: {}", body);
    Ok(([("content-type", "application/json")], body).into_response())
}

/// `GET /autoscaling`
pub async fn autoscaling() -> Response {
    Html(pages::autoscaling_page()).into_response()
}

/// `GET /hpa` -- fire a request at the microservice to generate load,
/// answering immediately regardless of the outcome.
pub async fn hpa(State(state): State<Arc<AppState>>) -> Response {
    if let Some(base) = state.config.microservice.base_url() {
        let http = state.http.clone();
        tokio::spawn(async move {
            if let Err(e) = http.get(format!("{base}/hpa")).send().await {
                error!("microservice endpoint not available: {e}");
            }
        });
    } else {
        error!("microservice endpoint not available");
    }

    "done".into_response()
}
