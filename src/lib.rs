//! podbay library -- Kubernetes workload demo service.
//!
//! This crate provides the components for running the demo server:
//! runtime capability detection, a unified object-storage façade over
//! AWS S3 / Azure Blob, the mounted-resource browsers, and the
//! networking demos.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub mod capability;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod pages;
pub mod server;
pub mod storage;

use crate::capability::MountCapabilities;
use crate::config::Config;
use crate::storage::gateway::StorageGateway;

/// Application version, surfaced on the landing page and in logs.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration, read from the environment at startup.
    pub config: Config,
    /// Liveness flag toggled by the health demo.
    pub healthy: AtomicBool,
    /// Mounted-resource capabilities detected at startup.
    pub mounts: MountCapabilities,
    /// Object-storage façade; resolution is published by the probe.
    pub gateway: Arc<StorageGateway>,
    /// HTTP client for the microservice relay.
    pub http: reqwest::Client,
}
