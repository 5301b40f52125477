//! Abstract storage backend trait and the values it exchanges.
//!
//! Every cloud backend must implement [`StorageBackend`].  The trait
//! works in terms of opaque keys and byte buffers so callers do not need
//! to know which provider is active.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

use crate::errors::StorageError;

/// Objects returned per list call.  Matches the fixed page size the S3
/// listing has always used; the Azure listing requests the same cap so
/// the two backends present a symmetric view.
pub const LIST_PAGE_SIZE: u32 = 10;

/// Identifies one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Opaque, backend-defined key (filename-like).
    pub key: String,
    /// Size in bytes, when the backend reports it in listings.
    pub size_hint: Option<u64>,
}

/// The result of a list call.
///
/// Item order is whatever the backend returned; no sorting is applied.
#[derive(Debug, Clone)]
pub struct ObjectListing {
    /// The bucket/container the listing came from.
    pub container_name: String,
    /// The listed objects, at most one page worth.
    pub items: Vec<ObjectRef>,
}

/// The result of a get call: one object's full contents in memory.
#[derive(Debug, Clone)]
pub struct ObjectContent {
    /// The key that was fetched.
    pub key: String,
    /// Raw bytes of the object.
    pub bytes: Bytes,
}

/// Async object storage contract, implemented once per cloud provider.
///
/// Error semantics the implementations must honor:
/// - an empty container is a successful, empty listing, never an error;
/// - a provider-specific "object not found" signal maps to
///   [`StorageError::NotFound`], distinct from transport failures;
/// - `put` creates or overwrites with last-writer-wins semantics.
pub trait StorageBackend: Send + Sync + 'static {
    /// List at most [`LIST_PAGE_SIZE`] objects.
    fn list(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectListing, StorageError>> + Send + '_>>;

    /// Read the full object at `key` into memory.
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectContent, StorageError>> + Send + '_>>;

    /// Write `data` to `key` with the given content type.
    fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>>;
}

// -- Test doubles ------------------------------------------------------------

#[cfg(test)]
pub(crate) mod doubles {
    //! Backend doubles shared by the gateway and probe tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stores puts in a hash map; the round-trip double.
    pub struct MemoryBackend {
        container: String,
        objects: tokio::sync::RwLock<HashMap<String, Bytes>>,
        /// Keys in insertion order so listings are deterministic.
        order: tokio::sync::RwLock<Vec<String>>,
    }

    impl MemoryBackend {
        pub fn new(container: &str) -> Self {
            Self {
                container: container.to_string(),
                objects: tokio::sync::RwLock::new(HashMap::new()),
                order: tokio::sync::RwLock::new(Vec::new()),
            }
        }
    }

    impl StorageBackend for MemoryBackend {
        fn list(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<ObjectListing, StorageError>> + Send + '_>>
        {
            Box::pin(async move {
                let objects = self.objects.read().await;
                let order = self.order.read().await;
                let items = order
                    .iter()
                    .map(|key| ObjectRef {
                        key: key.clone(),
                        size_hint: objects.get(key).map(|d| d.len() as u64),
                    })
                    .collect();
                Ok(ObjectListing {
                    container_name: self.container.clone(),
                    items,
                })
            })
        }

        fn get(
            &self,
            key: &str,
        ) -> Pin<Box<dyn Future<Output = Result<ObjectContent, StorageError>> + Send + '_>>
        {
            let key = key.to_string();
            Box::pin(async move {
                let objects = self.objects.read().await;
                match objects.get(&key) {
                    Some(data) => Ok(ObjectContent {
                        key,
                        bytes: data.clone(),
                    }),
                    None => Err(StorageError::NotFound),
                }
            })
        }

        fn put(
            &self,
            key: &str,
            data: Bytes,
            _content_type: &str,
        ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
            let key = key.to_string();
            Box::pin(async move {
                let mut objects = self.objects.write().await;
                if objects.insert(key.clone(), data).is_none() {
                    self.order.write().await.push(key);
                }
                Ok(())
            })
        }
    }

    /// Counts invocations; used to prove the gateway performs zero
    /// backend calls when no mode is active.
    pub struct RecordingBackend {
        pub calls: AtomicUsize,
    }

    impl RecordingBackend {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StorageBackend for RecordingBackend {
        fn list(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<ObjectListing, StorageError>> + Send + '_>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok(ObjectListing {
                    container_name: "recording".to_string(),
                    items: Vec::new(),
                })
            })
        }

        fn get(
            &self,
            key: &str,
        ) -> Pin<Box<dyn Future<Output = Result<ObjectContent, StorageError>> + Send + '_>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = key.to_string();
            Box::pin(async move {
                Ok(ObjectContent {
                    key,
                    bytes: Bytes::new(),
                })
            })
        }

        fn put(
            &self,
            _key: &str,
            _data: Bytes,
            _content_type: &str,
        ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(()) })
        }
    }

    /// Fails every operation with a transport-level error.
    pub struct FailingBackend;

    impl StorageBackend for FailingBackend {
        fn list(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<ObjectListing, StorageError>> + Send + '_>>
        {
            Box::pin(async move {
                Err(StorageError::TransientFailure(
                    "connection reset".to_string(),
                ))
            })
        }

        fn get(
            &self,
            _key: &str,
        ) -> Pin<Box<dyn Future<Output = Result<ObjectContent, StorageError>> + Send + '_>>
        {
            Box::pin(async move {
                Err(StorageError::TransientFailure(
                    "connection reset".to_string(),
                ))
            })
        }

        fn put(
            &self,
            _key: &str,
            _data: Bytes,
            _content_type: &str,
        ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
            Box::pin(async move {
                Err(StorageError::TransientFailure(
                    "connection reset".to_string(),
                ))
            })
        }
    }
}

// -- Tests -------------------------------------------------------------------
