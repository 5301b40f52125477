//! Configuration loading and types for podbay.
//!
//! The hosting platform injects configuration through environment
//! variables and mounted files, so there is no config file of our own:
//! [`Config::from_env`] reads the environment once at startup.  Each
//! subsection governs a different part of the system: networking, pod
//! identity, mounted resources, the sibling microservice, and storage
//! timeouts.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Pod identity (name + namespace).
    pub identity: IdentityConfig,

    /// Mounted-resource paths (persistent volume, secret, config map,
    /// Azure connection-string secret).
    pub mounts: MountConfig,

    /// Sibling microservice addressing for the networking demos.
    pub microservice: MicroserviceConfig,

    /// Object storage probing and per-operation timeouts.
    pub storage: StorageTimeouts,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host address.
    pub host: String,

    /// Bind port (`PORT`).
    pub port: u16,
}

/// Pod identity, as injected by the platform.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Pod name (`HOSTNAME`).
    pub pod: String,

    /// Namespace (`NAMESPACE`).  Absence is not validated here: storage
    /// resource names derived from a missing namespace simply fail at
    /// probe/call time with a backend error.
    pub namespace: Option<String>,
}

impl IdentityConfig {
    /// The namespace string used to derive storage resource names.
    pub fn namespace_or_empty(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

/// Paths to resources the platform may or may not have mounted.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Mounted config file (`CONFIG_FILE`).
    pub config_file: PathBuf,

    /// Mounted secret file (`SECRET_FILE`).
    pub secret_file: PathBuf,

    /// Persistent volume directory (`PERSISTENT_DIRECTORY`).
    pub data_dir: PathBuf,

    /// Azure Storage connection-string secret
    /// (`AZURE_CONNECTION_STRING_LOCATION`).
    pub azure_connection_string_file: PathBuf,
}

/// Addressing for the sibling microservice used by the networking and
/// autoscaling demos.
///
/// Host resolution order matches the platform convention: an explicit
/// `MICROSERVICE_IP` wins, then the `<NAME>_SERVICE_HOST` variable the
/// cluster injects for the named service.  Ports follow the same order
/// with a default of 8080.
#[derive(Debug, Clone)]
pub struct MicroserviceConfig {
    /// Service name (`MICROSERVICE_NAME`).
    pub name: Option<String>,

    /// Resolved service host, if any.
    pub host: Option<String>,

    /// Resolved service port.
    pub port: u16,
}

impl MicroserviceConfig {
    /// Base URL of the microservice, if a host is known.
    pub fn base_url(&self) -> Option<String> {
        self.host
            .as_ref()
            .map(|h| format!("http://{}:{}", h, self.port))
    }
}

/// Timeouts applied to the capability probe and to every delegated
/// storage operation.
#[derive(Debug, Clone)]
pub struct StorageTimeouts {
    /// Upper bound on each existence check during capability probing.
    pub probe_timeout: Duration,

    /// Upper bound on each list/get/put delegated to a backend.
    pub operation_timeout: Duration,
}

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_pod() -> String {
    "Unknown pod".to_string()
}

fn default_config_file() -> &'static str {
    "/var/config/config.json"
}

fn default_secret_file() -> &'static str {
    "/var/secret/secret.txt"
}

fn default_data_dir() -> &'static str {
    "/var/demo_files"
}

fn default_azure_connection_string_file() -> &'static str {
    "/mnt/secrets-store/connectionsecret"
}

fn default_microservice_port() -> u16 {
    8080
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(10)
}

// -- Loader ------------------------------------------------------------------

/// Read an environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve a possibly-relative mount path against the working directory.
fn absolute(path: String) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}

fn env_path(name: &str, default: &str) -> PathBuf {
    absolute(env_var(name).unwrap_or_else(|| default.to_string()))
}

fn env_secs(name: &str, default: Duration) -> Duration {
    env_var(name)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl Config {
    /// Build the full configuration from the process environment.
    pub fn from_env() -> Self {
        let name = env_var("MICROSERVICE_NAME");

        let host = env_var("MICROSERVICE_IP").or_else(|| {
            name.as_ref()
                .and_then(|n| env_var(&format!("{}_SERVICE_HOST", n)))
        });

        let port = env_var("MICROSERVICE_PORT")
            .or_else(|| {
                name.as_ref()
                    .and_then(|n| env_var(&format!("{}_SERVICE_PORT", n)))
            })
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or_else(default_microservice_port);

        Self {
            server: ServerConfig {
                host: default_host(),
                port: env_var("PORT")
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or_else(default_port),
            },
            identity: IdentityConfig {
                pod: env_var("HOSTNAME").unwrap_or_else(default_pod),
                namespace: env_var("NAMESPACE"),
            },
            mounts: MountConfig {
                config_file: env_path("CONFIG_FILE", default_config_file()),
                secret_file: env_path("SECRET_FILE", default_secret_file()),
                data_dir: env_path("PERSISTENT_DIRECTORY", default_data_dir()),
                azure_connection_string_file: env_path(
                    "AZURE_CONNECTION_STRING_LOCATION",
                    default_azure_connection_string_file(),
                ),
            },
            microservice: MicroserviceConfig { name, host, port },
            storage: StorageTimeouts {
                probe_timeout: env_secs("PROBE_TIMEOUT_SECS", default_probe_timeout()),
                operation_timeout: env_secs("STORAGE_TIMEOUT_SECS", default_operation_timeout()),
            },
        }
    }
}

// -- Tests -------------------------------------------------------------------
