//! Pod-level handlers: landing page, liveness/readiness, log demos,
//! the crash demo, and the environment dump.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use regex::Regex;
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::pages;
use crate::{AppState, APP_VERSION};

/// Form payload for the log and crash demos.
#[derive(Debug, Deserialize)]
pub struct MessageForm {
    pub message: Option<String>,
}

impl MessageForm {
    fn message_or_default(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or("No message")
    }
}

/// `GET /` -- redirect to the landing page.
pub async fn root() -> Redirect {
    Redirect::to("/home")
}

/// `GET /home` -- the landing page.
pub async fn home(State(state): State<Arc<AppState>>) -> Response {
    Html(pages::home_page(
        &state.config.identity.pod,
        APP_VERSION,
        state.gateway.mode(),
        state.mounts,
        health_status(&state),
    ))
    .into_response()
}

/// `GET /about`
pub async fn about() -> Response {
    Html(pages::about_page(APP_VERSION)).into_response()
}

/// `GET /rip` -- debug render of the crash page.
pub async fn rip_debug() -> Response {
    info!("Rendering /rip for debugging");
    Html(pages::rip_page(None)).into_response()
}

/// `GET /error` -- debug render of the error page.
pub async fn error_debug() -> Response {
    info!("Rendering /error for debugging");
    Html(pages::error_page("Debug", "nothing is actually wrong")).into_response()
}

fn health_status(state: &AppState) -> &'static str {
    if state.healthy.load(Ordering::Relaxed) {
        "I'm feeling OK."
    } else {
        "I'm not feeling all that well."
    }
}

/// `GET /health` -- liveness text, 200 when healthy, 500 when not.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let status = if state.healthy.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, health_status(&state).to_string()).into_response()
}

/// `POST /health` -- flip the liveness flag.
pub async fn toggle_health(State(state): State<Arc<AppState>>) -> Redirect {
    state.healthy.fetch_xor(true, Ordering::Relaxed);
    info!(
        "Updating pod, {}, health: {}",
        state.config.identity.pod,
        health_status(&state)
    );
    Redirect::to("/home")
}

/// `GET /readyz` -- ready once the capability probe has published.
///
/// Cloud storage routes answer `WrongPlatform` until then; a readiness
/// probe pointed here keeps traffic away during that window.
pub async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    if state.gateway.is_resolved() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "capability probe pending").into_response()
    }
}

/// `POST /log-stdout`
pub async fn log_stdout(Form(form): Form<MessageForm>) -> Redirect {
    info!("stdout: {}", form.message_or_default());
    Redirect::to("/home")
}

/// `POST /log-stderr`
pub async fn log_stderr(Form(form): Form<MessageForm>) -> Redirect {
    error!("stderr: {}", form.message_or_default());
    Redirect::to("/home")
}

/// `POST /crash` -- render the memorial page, then abort the process
/// two seconds later so the response still reaches the browser.
pub async fn crash(State(state): State<Arc<AppState>>, Form(form): Form<MessageForm>) -> Response {
    let msg = form.message_or_default().to_string();
    error!("pod, {}, crashing: {}", state.config.identity.pod, msg);

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        std::process::abort();
    });

    Html(pages::rip_page(Some(&msg))).into_response()
}

/// `GET /env-variables` -- the process environment as pretty JSON, with
/// IAM role ARN account numbers redacted.
pub async fn env_variables() -> Result<Response, AppError> {
    let env: BTreeMap<String, String> = std::env::vars().collect();
    let json = serde_json::to_string_pretty(&env).map_err(anyhow::Error::from)?;
    Ok(Html(pages::env_page(&redact_role_arns(&json))).into_response())
}

/// Replace `<account>:role/<name>` fragments so IAM role ARNs in the
/// environment never render verbatim.
fn redact_role_arns(text: &str) -> String {
    static ROLE_ARN: OnceLock<Regex> = OnceLock::new();
    let re = ROLE_ARN.get_or_init(|| {
        Regex::new(r#"\d{9,12}:role/[^"\\]*"#).expect("role ARN pattern is valid")
    });
    re.replace_all(text, "*********:role/<redacted>").into_owned()
}

// -- Tests -------------------------------------------------------------------
