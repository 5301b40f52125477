//! Runtime capability detection.
//!
//! At startup the pod may or may not have: a persistent volume, a
//! mounted secret, a mounted config file, and at most one reachable
//! cloud object store.  The mount checks are synchronous stats done
//! once before the listener starts; the cloud checks run as a
//! background task ([`CapabilityProbe`]) so that an unreachable or slow
//! cloud API can never delay serving traffic.
//!
//! Probe order is fixed: AWS first, then Azure, short-circuiting on the
//! first success.  A deployment is expected to carry credentials or
//! mounts for at most one provider, so the order only matters in
//! mis-configured environments, where AWS wins.  Every probe error --
//! missing resource, access denied, timeout -- just marks that provider
//! unavailable; probing never fails startup.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{Config, MountConfig};
use crate::storage::backend::StorageBackend;
use crate::storage::blob::BlobBackend;
use crate::storage::gateway::{Resolution, StorageGateway};
use crate::storage::s3::S3Backend;

/// Which of the optional mounts are present.  Detected once at startup;
/// the corresponding routes render a "not mounted" notice when false.
#[derive(Debug, Clone, Copy)]
pub struct MountCapabilities {
    /// Persistent volume directory exists.
    pub filesystem: bool,
    /// Secret file is mounted.
    pub secret: bool,
    /// Config file is mounted.
    pub config_map: bool,
}

impl MountCapabilities {
    /// Stat the three mount paths.  These are fast local-disk checks and
    /// are the only probing allowed to run before the listener binds.
    pub fn detect(mounts: &MountConfig) -> Self {
        Self {
            filesystem: mounts.data_dir.exists(),
            secret: mounts.secret_file.exists(),
            config_map: mounts.config_file.exists(),
        }
    }
}

/// One-shot detection of the active cloud backend.
pub struct CapabilityProbe;

impl CapabilityProbe {
    /// Spawn the probe as a background task.  Fire-and-forget: requests
    /// served before it publishes observe an unresolved gateway and get
    /// `WrongPlatform`, which is the documented startup race.
    pub fn spawn(config: &Config, gateway: Arc<StorageGateway>) {
        let namespace = config.identity.namespace_or_empty().to_string();
        let connection_string_file = config.mounts.azure_connection_string_file.clone();
        let probe_timeout = config.storage.probe_timeout;

        tokio::spawn(async move {
            let resolution = Self::resolve(
                || Self::probe_aws(namespace.clone(), probe_timeout),
                || Self::probe_azure(connection_string_file, namespace.clone(), probe_timeout),
            )
            .await;

            info!("runtime mode resolved: {}", resolution.mode());
            gateway.publish(resolution);
        });
    }

    /// Run the ordered, short-circuiting detection sequence.
    ///
    /// Generic over the two checks so tests can drive it with fakes.
    /// The Azure check is a closure precisely so it is never evaluated
    /// when AWS succeeds.
    pub(crate) async fn resolve<A, FA, B, FB>(aws: A, azure: B) -> Resolution
    where
        A: FnOnce() -> FA,
        FA: Future<Output = Result<Arc<dyn StorageBackend>, String>>,
        B: FnOnce() -> FB,
        FB: Future<Output = Result<Arc<dyn StorageBackend>, String>>,
    {
        match aws().await {
            Ok(backend) => {
                info!("object storage: S3 bucket reachable, AWS mode enabled");
                Resolution::AwsS3(backend)
            }
            Err(reason) => {
                info!("object storage: AWS unavailable ({reason})");
                match azure().await {
                    Ok(backend) => {
                        info!("object storage: Blob container reachable, Azure mode enabled");
                        Resolution::AzureBlob(backend)
                    }
                    Err(reason) => {
                        info!("object storage: Azure unavailable ({reason})");
                        Resolution::None
                    }
                }
            }
        }
    }

    /// Existence check against the namespace S3 bucket.
    async fn probe_aws(
        namespace: String,
        probe_timeout: Duration,
    ) -> Result<Arc<dyn StorageBackend>, String> {
        match tokio::time::timeout(probe_timeout, S3Backend::detect(&namespace)).await {
            Ok(Ok(backend)) => Ok(Arc::new(backend)),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("bucket check timed out after {probe_timeout:?}")),
        }
    }

    /// Existence check against the namespace Blob container, driven by
    /// the mounted connection-string secret.
    async fn probe_azure(
        connection_string_file: PathBuf,
        namespace: String,
        probe_timeout: Duration,
    ) -> Result<Arc<dyn StorageBackend>, String> {
        let raw = read_connection_string(&connection_string_file)?;

        let backend =
            BlobBackend::from_connection_string(&raw, &namespace).map_err(|e| e.to_string())?;

        match tokio::time::timeout(probe_timeout, backend.container_exists()).await {
            Ok(Ok(true)) => Ok(Arc::new(backend)),
            Ok(Ok(false)) => Err(format!(
                "container {}-container not found",
                namespace.as_str()
            )),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("container check timed out after {probe_timeout:?}")),
        }
    }
}

/// Read the mounted connection-string secret.  An absent or unreadable
/// file means Azure is unavailable, not an error.
fn read_connection_string(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| format!("connection string secret not readable at {}: {e}", path.display()))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::doubles::MemoryBackend;
    use crate::storage::gateway::{RuntimeMode, StorageGateway};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn memory_backend(container: &str) -> Arc<dyn StorageBackend> {
        Arc::new(MemoryBackend::new(container))
    }

    #[tokio::test]
    async fn test_aws_wins_when_both_available() {
        let azure_probed = AtomicBool::new(false);

        let resolution = CapabilityProbe::resolve(
            || async { Ok(memory_backend("demo-bucket")) },
            || async {
                azure_probed.store(true, Ordering::SeqCst);
                Ok(memory_backend("demo-container"))
            },
        )
        .await;

        assert_eq!(resolution.mode(), RuntimeMode::AwsS3);
        // Short-circuit: Azure must never be probed when AWS succeeds.
        assert!(!azure_probed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_azure_selected_when_aws_fails() {
        let resolution = CapabilityProbe::resolve(
            || async { Err("NoSuchBucket".to_string()) },
            || async { Ok(memory_backend("demo-container")) },
        )
        .await;

        assert_eq!(resolution.mode(), RuntimeMode::AzureBlob);
    }

    #[tokio::test]
    async fn test_neither_available_resolves_to_none() {
        let resolution = CapabilityProbe::resolve(
            || async { Err("dispatch failure: dns error".to_string()) },
            || async { Err("connection string secret not readable".to_string()) },
        )
        .await;

        assert_eq!(resolution.mode(), RuntimeMode::None);
    }

    #[tokio::test]
    async fn test_probe_is_lenient_to_every_error_class() {
        // Not-found, access-denied and timeout all resolve, never crash
        // or hang the probe.
        for reason in ["NoSuchBucket", "AccessDenied", "timed out after 10s"] {
            let resolution = CapabilityProbe::resolve(
                || async { Err(reason.to_string()) },
                || async { Err(reason.to_string()) },
            )
            .await;
            assert_eq!(resolution.mode(), RuntimeMode::None);
        }
    }

    #[tokio::test]
    async fn test_probe_azure_without_mounted_secret() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("connectionsecret");

        let err =
            CapabilityProbe::probe_azure(missing, "demo".to_string(), Duration::from_secs(1))
                .await
                .err()
                .unwrap();
        assert!(err.contains("connection string secret not readable"));
    }

    #[tokio::test]
    async fn test_probe_azure_with_malformed_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connectionsecret");
        std::fs::write(&path, "not-a-connection-string").unwrap();

        let err = CapabilityProbe::probe_azure(path, "demo".to_string(), Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(err.contains("AccountName"));
    }

    #[tokio::test]
    async fn test_concrete_scenario_azure_fallback() {
        // namespace "demo": bucket check fails with NoSuchBucket, the
        // connection string is mounted and demo-container exists.
        let gateway = StorageGateway::new(Duration::from_secs(5));

        let resolution = CapabilityProbe::resolve(
            || async { Err("NoSuchBucket: demo-bucket".to_string()) },
            || async { Ok(memory_backend("demo-container")) },
        )
        .await;
        gateway.publish(resolution);

        assert_eq!(gateway.mode(), Some(RuntimeMode::AzureBlob));

        gateway
            .put("notes.txt", Bytes::from("hello"), "text/plain")
            .await
            .unwrap();

        let listing = gateway.list().await.unwrap();
        assert!(listing.items.iter().any(|o| o.key == "notes.txt"));

        let content = gateway.get("notes.txt").await.unwrap();
        assert_eq!(content.bytes, Bytes::from("hello"));

        assert!(matches!(
            gateway.get("missing.txt").await.unwrap_err(),
            crate::errors::StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_concrete_scenario_no_cloud() {
        let gateway = StorageGateway::new(Duration::from_secs(5));

        let resolution = CapabilityProbe::resolve(
            || async { Err("NoSuchBucket: demo-bucket".to_string()) },
            || async { Err("connection string secret not readable".to_string()) },
        )
        .await;
        gateway.publish(resolution);

        assert_eq!(gateway.mode(), Some(RuntimeMode::None));
        for result in [
            gateway.list().await.map(|_| ()),
            gateway.get("x").await.map(|_| ()),
            gateway.put("x", Bytes::new(), "text/plain").await,
        ] {
            assert!(matches!(
                result.unwrap_err(),
                crate::errors::StorageError::WrongPlatform
            ));
        }
    }

    #[test]
    fn test_mount_detection() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("demo_files");
        let secret = dir.path().join("secret.txt");
        std::fs::create_dir(&data_dir).unwrap();
        std::fs::write(&secret, "s3cr3t").unwrap();

        let mounts = MountConfig {
            config_file: dir.path().join("missing-config.json"),
            secret_file: secret,
            data_dir,
            azure_connection_string_file: dir.path().join("connectionsecret"),
        };

        let caps = MountCapabilities::detect(&mounts);
        assert!(caps.filesystem);
        assert!(caps.secret);
        assert!(!caps.config_map);
    }
}
