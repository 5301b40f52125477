//! Azure Blob Storage backend.
//!
//! Maps the storage contract onto a single Blob container named
//! `<namespace>-container`, speaking the Azure Blob REST API over
//! `reqwest` with Shared Key request signing.
//!
//! Unlike the AWS side, Azure credentials do not come from an ambient
//! chain: the platform mounts a storage-account connection string as a
//! secret file, and the backend is constructed from its contents
//! (AccountName / AccountKey / optional BlobEndpoint).

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use sha2::Sha256;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use super::backend::{ObjectContent, ObjectListing, ObjectRef, StorageBackend, LIST_PAGE_SIZE};
use crate::errors::StorageError;

/// Azure REST API version used for all requests.
const AZURE_API_VERSION: &str = "2023-11-03";

/// Derive the container name from a namespace.
pub fn container_name(namespace: &str) -> String {
    format!("{namespace}-container")
}

/// Storage backend bound to one Azure Blob container.
pub struct BlobBackend {
    /// HTTP client for Azure Blob REST API calls.
    client: reqwest::Client,
    /// The container name, fixed for the process lifetime.
    container: String,
    /// Azure storage account name.
    account: String,
    /// Decoded storage account key for Shared Key signing.
    key_bytes: Vec<u8>,
    /// Base URL for the Blob service endpoint.
    base_url: String,
}

/// Fields extracted from a storage-account connection string.
#[derive(Debug, PartialEq, Eq)]
struct ConnectionInfo {
    account: String,
    key_bytes: Vec<u8>,
    base_url: String,
}

/// Parse an Azure Storage connection string.
///
/// Recognized fields: `AccountName`, `AccountKey`, `BlobEndpoint`,
/// `EndpointSuffix`, `DefaultEndpointsProtocol`.  `AccountName` and
/// `AccountKey` are required.
fn parse_connection_string(raw: &str) -> anyhow::Result<ConnectionInfo> {
    let mut account = None;
    let mut key = None;
    let mut blob_endpoint = None;
    let mut suffix = "core.windows.net".to_string();
    let mut protocol = "https".to_string();

    for part in raw.trim().split(';') {
        // AccountKey is base64 and may itself contain '='; split on the
        // first '=' only.
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        match name.trim() {
            "AccountName" => account = Some(value.to_string()),
            "AccountKey" => key = Some(value.to_string()),
            "BlobEndpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
            "EndpointSuffix" => suffix = value.to_string(),
            "DefaultEndpointsProtocol" => protocol = value.to_string(),
            _ => {}
        }
    }

    let account =
        account.ok_or_else(|| anyhow::anyhow!("connection string missing AccountName"))?;
    let key = key.ok_or_else(|| anyhow::anyhow!("connection string missing AccountKey"))?;
    let key_bytes = BASE64_STANDARD
        .decode(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid AccountKey (not valid base64): {e}"))?;

    let base_url =
        blob_endpoint.unwrap_or_else(|| format!("{protocol}://{account}.blob.{suffix}"));

    Ok(ConnectionInfo {
        account,
        key_bytes,
        base_url,
    })
}

/// Percent-encoding set for Azure blob names: encode everything except
/// unreserved characters and '/'.
const AZURE_BLOB_ENCODE_SET: percent_encoding::AsciiSet = percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

impl BlobBackend {
    /// Construct a backend from a connection string.
    ///
    /// Does not touch the network; reachability is established by the
    /// caller via [`container_exists`](Self::container_exists).
    pub fn from_connection_string(raw: &str, namespace: &str) -> anyhow::Result<Self> {
        let info = parse_connection_string(raw)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {e}"))?;

        let container = container_name(namespace);

        info!(
            "Azure Blob backend constructed: container={} account={}",
            container, info.account
        );

        Ok(Self {
            client,
            container,
            account: info.account,
            key_bytes: info.key_bytes,
            base_url: info.base_url,
        })
    }

    /// Check whether the namespace container exists.
    pub async fn container_exists(&self) -> anyhow::Result<bool> {
        let url = format!("{}/{}?restype=container", self.base_url, self.container);
        let date = Self::rfc1123_date();
        let query_params = [("restype".to_string(), "container".to_string())];

        let auth = self.sign_container_request("GET", &date, &query_params)?;

        let resp = self
            .client
            .get(&url)
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("Authorization", auth)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("container existence check failed: {e}"))?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => {
                let body = resp.text().await.unwrap_or_default();
                Err(anyhow::anyhow!(
                    "container existence check: HTTP {s} - {body}"
                ))
            }
        }
    }

    /// Build the full URL for a blob operation.
    fn blob_url(&self, blob_name: &str) -> String {
        let encoded =
            percent_encoding::utf8_percent_encode(blob_name, &AZURE_BLOB_ENCODE_SET).to_string();
        format!("{}/{}/{}", self.base_url, self.container, encoded)
    }

    /// Get the current UTC date in RFC 1123 format for Azure headers.
    fn rfc1123_date() -> String {
        httpdate::fmt_http_date(std::time::SystemTime::now())
    }

    /// Sign a blob-level request with Shared Key authentication and
    /// return the Authorization header value.
    ///
    /// String-to-sign layout (headers we never send stay empty):
    /// `VERB\n\n\nContent-Length\n\nContent-Type\n\n\n\n\n\n\n` followed
    /// by the canonicalized `x-ms-*` headers and resource.
    fn sign_blob_request(
        &self,
        method: &str,
        blob_name: &str,
        content_length: Option<usize>,
        content_type: &str,
        date: &str,
        extra_headers: &[(String, String)],
        query_params: &[(String, String)],
    ) -> anyhow::Result<String> {
        // Content-Length signs as empty for 0 or absent (GET/HEAD).
        let content_length_str = match content_length {
            Some(0) | None => String::new(),
            Some(len) => len.to_string(),
        };

        // Canonicalized x-ms-* headers, sorted by name.
        let mut ms_headers: Vec<(String, String)> = vec![
            ("x-ms-date".to_string(), date.to_string()),
            ("x-ms-version".to_string(), AZURE_API_VERSION.to_string()),
        ];
        for (k, v) in extra_headers {
            let lk = k.to_lowercase();
            if lk.starts_with("x-ms-") && lk != "x-ms-date" && lk != "x-ms-version" {
                ms_headers.push((lk, v.clone()));
            }
        }
        ms_headers.sort_by(|a, b| a.0.cmp(&b.0));

        let canonicalized_headers: String = ms_headers
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join("\n");

        // Canonicalized resource uses the un-encoded blob name.
        let mut canonicalized_resource =
            format!("/{}/{}/{}", self.account, self.container, blob_name);
        if !query_params.is_empty() {
            let mut sorted = query_params.to_vec();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            for (k, v) in &sorted {
                canonicalized_resource.push_str(&format!("\n{}:{}", k.to_lowercase(), v));
            }
        }

        let string_to_sign = format!(
            "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}\n{}",
            method, content_length_str, content_type, canonicalized_headers, canonicalized_resource
        );

        self.hmac_signature(&string_to_sign)
    }

    /// Sign a container-level request (List Blobs, existence check).
    fn sign_container_request(
        &self,
        method: &str,
        date: &str,
        query_params: &[(String, String)],
    ) -> anyhow::Result<String> {
        let ms_headers = format!("x-ms-date:{}\nx-ms-version:{}", date, AZURE_API_VERSION);

        let mut canonicalized_resource = format!("/{}/{}", self.account, self.container);
        if !query_params.is_empty() {
            let mut sorted = query_params.to_vec();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            for (k, v) in &sorted {
                canonicalized_resource.push_str(&format!("\n{}:{}", k.to_lowercase(), v));
            }
        }

        let string_to_sign = format!(
            "{}\n\n\n\n\n\n\n\n\n\n\n\n{}\n{}",
            method, ms_headers, canonicalized_resource
        );

        self.hmac_signature(&string_to_sign)
    }

    /// HMAC-SHA256 the string-to-sign and format the header value.
    fn hmac_signature(&self, string_to_sign: &str) -> anyhow::Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(&self.key_bytes)
            .map_err(|e| anyhow::anyhow!("HMAC key error: {e}"))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{}", self.account, signature))
    }

    /// Map a reqwest transport error to `TransientFailure`.
    fn map_transport_error(context: &str, err: reqwest::Error) -> StorageError {
        StorageError::TransientFailure(format!("Azure {context}: {err}"))
    }

    /// Map a non-success Azure response to a `StorageError`.
    fn map_status_error(context: &str, status: StatusCode, body: &str) -> StorageError {
        StorageError::BackendUnavailable(format!("Azure {context}: HTTP {status} - {body}"))
    }
}

/// Undo the XML escaping Azure applies to blob names in listings.
fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Extract blob names and sizes from a List Blobs XML response.
///
/// The response shape is stable enough that a string scan over
/// `<Blob>`/`<Name>`/`<Content-Length>` windows suffices; pulling in an
/// XML parser for this one document is not worth it.
fn parse_list_blobs(body: &str) -> Vec<ObjectRef> {
    let mut items = Vec::new();
    let mut search_from = 0;

    while let Some(blob_start) = body[search_from..].find("<Blob>") {
        let blob_start = search_from + blob_start;
        let Some(blob_len) = body[blob_start..].find("</Blob>") else {
            break;
        };
        let blob_xml = &body[blob_start..blob_start + blob_len];

        if let Some(name) = extract_tag(blob_xml, "Name") {
            let size_hint = extract_tag(blob_xml, "Content-Length").and_then(|v| v.parse().ok());
            items.push(ObjectRef {
                key: xml_unescape(name),
                size_hint,
            });
        }

        search_from = blob_start + blob_len;
    }

    items
}

/// Return the text between `<tag>` and `</tag>` within `fragment`.
fn extract_tag<'a>(fragment: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = fragment.find(&open)? + open.len();
    let len = fragment[start..].find(&close)?;
    Some(&fragment[start..start + len])
}

impl StorageBackend for BlobBackend {
    fn list(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectListing, StorageError>> + Send + '_>> {
        Box::pin(async move {
            let url = format!(
                "{}/{}?restype=container&comp=list&maxresults={}",
                self.base_url, self.container, LIST_PAGE_SIZE
            );
            let date = Self::rfc1123_date();
            let query_params = [
                ("comp".to_string(), "list".to_string()),
                ("maxresults".to_string(), LIST_PAGE_SIZE.to_string()),
                ("restype".to_string(), "container".to_string()),
            ];

            debug!("Azure list_blobs: container={}", self.container);

            let auth = self
                .sign_container_request("GET", &date, &query_params)
                .map_err(|e| StorageError::BackendUnavailable(format!("Azure list: {e}")))?;

            let resp = self
                .client
                .get(&url)
                .header("x-ms-date", &date)
                .header("x-ms-version", AZURE_API_VERSION)
                .header("Authorization", auth)
                .send()
                .await
                .map_err(|e| Self::map_transport_error("list", e))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status_error("list", status, &body));
            }

            let body = resp
                .text()
                .await
                .map_err(|e| Self::map_transport_error("list body", e))?;

            Ok(ObjectListing {
                container_name: self.container.clone(),
                items: parse_list_blobs(&body),
            })
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectContent, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let url = self.blob_url(&key);
            let date = Self::rfc1123_date();

            debug!("Azure get blob: container={} blob={}", self.container, key);

            let auth = self
                .sign_blob_request("GET", &key, None, "", &date, &[], &[])
                .map_err(|e| StorageError::BackendUnavailable(format!("Azure get: {e}")))?;

            let resp = self
                .client
                .get(&url)
                .header("x-ms-date", &date)
                .header("x-ms-version", AZURE_API_VERSION)
                .header("Authorization", auth)
                .send()
                .await
                .map_err(|e| Self::map_transport_error("get", e))?;

            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                // Distinguish a missing blob from a missing container:
                // only BlobNotFound means the object itself is absent.
                let error_code = resp
                    .headers()
                    .get("x-ms-error-code")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("BlobNotFound")
                    .to_string();
                return if error_code == "BlobNotFound" {
                    Err(StorageError::NotFound)
                } else {
                    Err(StorageError::BackendUnavailable(format!(
                        "Azure get: HTTP 404 - {error_code}"
                    )))
                };
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status_error("get", status, &body));
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| Self::map_transport_error("get body", e))?;

            Ok(ObjectContent { key, bytes })
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
            let url = self.blob_url(&key);
            let date = Self::rfc1123_date();
            let extra_headers = [("x-ms-blob-type".to_string(), "BlockBlob".to_string())];

            debug!(
                "Azure put blob: container={} blob={} bytes={}",
                self.container,
                key,
                data.len()
            );

            let auth = self
                .sign_blob_request(
                    "PUT",
                    &key,
                    Some(data.len()),
                    &content_type,
                    &date,
                    &extra_headers,
                    &[],
                )
                .map_err(|e| StorageError::BackendUnavailable(format!("Azure put: {e}")))?;

            let resp = self
                .client
                .put(&url)
                .header("x-ms-date", &date)
                .header("x-ms-version", AZURE_API_VERSION)
                .header("x-ms-blob-type", "BlockBlob")
                .header("Content-Type", &content_type)
                .header("Content-Length", data.len())
                .header("Authorization", auth)
                .body(data.to_vec())
                .send()
                .await
                .map_err(|e| Self::map_transport_error("put", e))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status_error("put", status, &body));
            }

            Ok(())
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "c2VjcmV0LWtleQ=="; // base64("secret-key")

    fn test_backend() -> BlobBackend {
        let conn = format!(
            "DefaultEndpointsProtocol=https;AccountName=demoacct;AccountKey={};EndpointSuffix=core.windows.net",
            TEST_KEY
        );
        BlobBackend::from_connection_string(&conn, "demo").unwrap()
    }

    #[test]
    fn test_container_name_derivation() {
        assert_eq!(container_name("demo"), "demo-container");
        assert_eq!(container_name(""), "-container");
    }

    #[test]
    fn test_parse_connection_string_full() {
        let conn = format!(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey={};EndpointSuffix=core.windows.net",
            TEST_KEY
        );
        let info = parse_connection_string(&conn).unwrap();
        assert_eq!(info.account, "acct");
        assert_eq!(info.key_bytes, b"secret-key");
        assert_eq!(info.base_url, "https://acct.blob.core.windows.net");
    }

    #[test]
    fn test_parse_connection_string_blob_endpoint_wins() {
        let conn = format!(
            "AccountName=acct;AccountKey={};BlobEndpoint=http://127.0.0.1:10000/acct/",
            TEST_KEY
        );
        let info = parse_connection_string(&conn).unwrap();
        assert_eq!(info.base_url, "http://127.0.0.1:10000/acct");
    }

    #[test]
    fn test_parse_connection_string_key_keeps_padding() {
        // The first '=' splits name from value; padding stays in the value.
        let conn = format!("AccountName=acct;AccountKey={}", TEST_KEY);
        let info = parse_connection_string(&conn).unwrap();
        assert_eq!(info.key_bytes, b"secret-key");
    }

    #[test]
    fn test_parse_connection_string_missing_key() {
        let err = parse_connection_string("AccountName=acct").unwrap_err();
        assert!(err.to_string().contains("AccountKey"));
    }

    #[test]
    fn test_parse_connection_string_missing_account() {
        let err = parse_connection_string(&format!("AccountKey={}", TEST_KEY)).unwrap_err();
        assert!(err.to_string().contains("AccountName"));
    }

    #[test]
    fn test_blob_url_preserves_slashes_encodes_spaces() {
        let backend = test_backend();
        let url = backend.blob_url("dir/key with spaces.txt");
        assert!(url.contains("/demo-container/dir/key%20with%20spaces.txt"));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let backend = test_backend();
        let date = "Fri, 07 Aug 2026 10:00:00 GMT";
        let a = backend
            .sign_blob_request("GET", "blob.txt", None, "", date, &[], &[])
            .unwrap();
        let b = backend
            .sign_blob_request("GET", "blob.txt", None, "", date, &[], &[])
            .unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("SharedKey demoacct:"));
    }

    #[test]
    fn test_signature_changes_with_method() {
        let backend = test_backend();
        let date = "Fri, 07 Aug 2026 10:00:00 GMT";
        let get = backend
            .sign_blob_request("GET", "blob.txt", None, "", date, &[], &[])
            .unwrap();
        let put = backend
            .sign_blob_request("PUT", "blob.txt", Some(5), "text/plain", date, &[], &[])
            .unwrap();
        assert_ne!(get, put);
    }

    #[test]
    fn test_parse_list_blobs() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults>
  <Blobs>
    <Blob><Name>notes.txt</Name><Properties><Content-Length>5</Content-Length></Properties></Blob>
    <Blob><Name>dir/nested.txt</Name><Properties><Content-Length>42</Content-Length></Properties></Blob>
  </Blobs>
</EnumerationResults>"#;
        let items = parse_list_blobs(body);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, "notes.txt");
        assert_eq!(items[0].size_hint, Some(5));
        assert_eq!(items[1].key, "dir/nested.txt");
        assert_eq!(items[1].size_hint, Some(42));
    }

    #[test]
    fn test_parse_list_blobs_empty() {
        let body = r#"<?xml version="1.0"?><EnumerationResults><Blobs></Blobs></EnumerationResults>"#;
        assert!(parse_list_blobs(body).is_empty());
    }

    #[test]
    fn test_parse_list_blobs_unescapes_names() {
        let body = "<Blob><Name>a&amp;b.txt</Name></Blob>";
        let items = parse_list_blobs(body);
        assert_eq!(items[0].key, "a&b.txt");
        assert_eq!(items[0].size_hint, None);
    }

    #[test]
    fn test_rfc1123_date_format() {
        let date = BlobBackend::rfc1123_date();
        assert!(date.ends_with("GMT"));
        assert!(date.contains(','));
    }
}
