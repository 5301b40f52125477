//! AWS S3 storage backend.
//!
//! Maps the storage contract onto a single S3 bucket whose name is
//! derived from the pod's namespace as `<namespace>-bucket`.
//!
//! Credentials are resolved via the standard AWS credential chain
//! (profile, env vars, web-identity token file, `~/.aws/credentials`,
//! IAM role) -- this module never handles credentials itself.

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use super::backend::{ObjectContent, ObjectListing, ObjectRef, StorageBackend, LIST_PAGE_SIZE};
use crate::errors::StorageError;

/// Derive the bucket name from a namespace.
pub fn bucket_name(namespace: &str) -> String {
    format!("{namespace}-bucket")
}

/// Storage backend bound to one S3 bucket.
pub struct S3Backend {
    /// AWS S3 SDK client.
    client: Client,
    /// The bucket name, fixed for the process lifetime.
    bucket: String,
}

impl S3Backend {
    /// Detect whether the namespace bucket is reachable and, if so,
    /// return a backend bound to it.
    ///
    /// Issues a `HeadBucket` existence check.  Any failure -- missing
    /// bucket, access denied, transport error -- means S3 is unusable
    /// here; the caller treats the error as "backend unavailable", never
    /// as fatal.
    pub async fn detect(namespace: &str) -> anyhow::Result<Self> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let client = Client::new(&sdk_config);
        let bucket = bucket_name(namespace);

        client
            .head_bucket()
            .bucket(&bucket)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("head_bucket {}: {}", bucket, DisplayErrorContext(e)))?;

        info!("S3 backend initialized: bucket={}", bucket);

        Ok(Self { client, bucket })
    }

    /// Map a transport-level SDK failure to `TransientFailure` and
    /// everything else to `BackendUnavailable`.
    fn map_sdk_error<E, R>(context: &str, err: SdkError<E, R>) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug + Send + Sync + 'static,
    {
        let transient = matches!(&err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_));
        let detail = format!("S3 {context}: {}", DisplayErrorContext(err));
        if transient {
            StorageError::TransientFailure(detail)
        } else {
            StorageError::BackendUnavailable(detail)
        }
    }
}

impl StorageBackend for S3Backend {
    fn list(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectListing, StorageError>> + Send + '_>> {
        Box::pin(async move {
            debug!("S3 list_objects_v2: bucket={}", self.bucket);

            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .max_keys(LIST_PAGE_SIZE as i32)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;

            let items = resp
                .contents()
                .iter()
                .filter_map(|obj| {
                    obj.key().map(|k| ObjectRef {
                        key: k.to_string(),
                        size_hint: obj.size().map(|s| s as u64),
                    })
                })
                .collect();

            Ok(ObjectListing {
                container_name: self.bucket.clone(),
                items,
            })
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectContent, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 get_object: bucket={} key={}", self.bucket, key);

            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| {
                    if matches!(&e, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
                        return StorageError::TransientFailure(format!(
                            "S3 get_object: {}",
                            DisplayErrorContext(e)
                        ));
                    }
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        StorageError::NotFound
                    } else {
                        StorageError::BackendUnavailable(format!("S3 get_object: {service_err}"))
                    }
                })?;

            let body = resp
                .body
                .collect()
                .await
                .map_err(|e| StorageError::TransientFailure(format!("S3 get_object body: {e}")))?
                .into_bytes();

            Ok(ObjectContent {
                key,
                bytes: Bytes::from(body.to_vec()),
            })
        })
    }

    fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            debug!(
                "S3 put_object: bucket={} key={} bytes={}",
                self.bucket,
                key,
                data.len()
            );

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type(&content_type)
                .body(aws_sdk_s3::primitives::ByteStream::from(data))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e))?;

            Ok(())
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // We can't construct an S3Backend in unit tests without credentials
    // and a reachable endpoint, but the name derivation is pure.

    #[test]
    fn test_bucket_name_derivation() {
        assert_eq!(bucket_name("demo"), "demo-bucket");
        assert_eq!(bucket_name("team-a"), "team-a-bucket");
    }

    #[test]
    fn test_bucket_name_empty_namespace_is_malformed() {
        // A missing namespace degrades to "-bucket"; the SDK rejects it
        // at call time, which is the documented failure path.
        assert_eq!(bucket_name(""), "-bucket");
    }
}
