//! Unified object-storage façade.
//!
//! [`StorageGateway`] holds the process-wide resolution produced by the
//! capability probe: which cloud backend (if any) is live.  The
//! resolution is written exactly once into a [`OnceLock`], so after
//! publication every request handler reads it without synchronization.
//!
//! Until the probe publishes -- and forever, when it resolves to
//! [`RuntimeMode::None`] -- every operation returns
//! [`StorageError::WrongPlatform`] before any network I/O happens.

use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

use super::backend::{ObjectContent, ObjectListing, StorageBackend};
use crate::errors::StorageError;

/// The resolved, process-lifetime-stable choice of cloud backend.
///
/// `AwsS3` and `AzureBlob` are mutually exclusive; the probe that
/// succeeds first wins and the mode never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    /// No cloud backend is reachable.
    None,
    /// The namespace S3 bucket is reachable.
    AwsS3,
    /// The namespace Blob container is reachable.
    AzureBlob,
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::None => write!(f, "none"),
            RuntimeMode::AwsS3 => write!(f, "aws-s3"),
            RuntimeMode::AzureBlob => write!(f, "azure-blob"),
        }
    }
}

/// The probe's published outcome: a mode plus, for cloud modes, the
/// backend instance bound to the namespace resource.
///
/// Modeled as one enum so "mode says cloud but no backend exists" is
/// unrepresentable.
pub enum Resolution {
    /// Neither cloud backend is usable.
    None,
    /// S3 won the probe.
    AwsS3(Arc<dyn StorageBackend>),
    /// Azure won the probe (after S3 failed).
    AzureBlob(Arc<dyn StorageBackend>),
}

impl Resolution {
    /// The mode this resolution carries.
    pub fn mode(&self) -> RuntimeMode {
        match self {
            Resolution::None => RuntimeMode::None,
            Resolution::AwsS3(_) => RuntimeMode::AwsS3,
            Resolution::AzureBlob(_) => RuntimeMode::AzureBlob,
        }
    }

    fn backend(&self) -> Option<&Arc<dyn StorageBackend>> {
        match self {
            Resolution::None => None,
            Resolution::AwsS3(b) | Resolution::AzureBlob(b) => Some(b),
        }
    }
}

/// Single public entry point for object storage, shared across all
/// request handlers.
pub struct StorageGateway {
    /// Upper bound applied to every delegated backend call.
    operation_timeout: Duration,
    /// Written once by the capability probe, read-only thereafter.
    resolution: OnceLock<Resolution>,
}

impl StorageGateway {
    pub fn new(operation_timeout: Duration) -> Self {
        Self {
            operation_timeout,
            resolution: OnceLock::new(),
        }
    }

    /// Publish the probe's resolution.  The first publication wins; a
    /// second one is a probe bug and is dropped with a warning.
    pub fn publish(&self, resolution: Resolution) {
        let mode = resolution.mode();
        if self.resolution.set(resolution).is_err() {
            warn!("storage resolution already published; ignoring {mode}");
        }
    }

    /// Whether the capability probe has published a resolution yet.
    /// Readiness probes key off this.
    pub fn is_resolved(&self) -> bool {
        self.resolution.get().is_some()
    }

    /// The resolved mode, or `None` while the probe is still running.
    pub fn mode(&self) -> Option<RuntimeMode> {
        self.resolution.get().map(Resolution::mode)
    }

    /// The active backend, or `WrongPlatform` when there is none.
    ///
    /// An unresolved gateway answers the same as mode `None`: early
    /// requests during the startup race see `WrongPlatform` rather than
    /// blocking on the probe.
    fn active_backend(&self) -> Result<&Arc<dyn StorageBackend>, StorageError> {
        self.resolution
            .get()
            .and_then(Resolution::backend)
            .ok_or(StorageError::WrongPlatform)
    }

    /// Run a delegated call under the operation timeout.
    async fn bounded<T>(
        &self,
        context: &str,
        fut: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::TransientFailure(format!(
                "{context} timed out after {:?}",
                self.operation_timeout
            ))),
        }
    }

    /// List objects in the active container.
    pub async fn list(&self) -> Result<ObjectListing, StorageError> {
        let backend = self.active_backend()?;
        self.bounded("list", backend.list()).await
    }

    /// Fetch one object from the active container.
    pub async fn get(&self, key: &str) -> Result<ObjectContent, StorageError> {
        let backend = self.active_backend()?;
        self.bounded("get", backend.get(key)).await
    }

    /// Create or overwrite one object in the active container.
    pub async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let backend = self.active_backend()?;
        self.bounded("put", backend.put(key, data, content_type))
            .await
    }
}

// -- Tests -------------------------------------------------------------------
