//! Configuration for the volume manager.
//!
//! - [`ManagerOptions`]: where the storage root is and the raw bootstrap map
//! - [`BootstrapOptions`]: host-supplied `quobyte.*` keys
//! - [`ManagerConfig`]: the persisted manager configuration record
//! - [`ApiSettings`]: remote API endpoint and credentials for this process

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use dirs::home_dir;
use quovol_shared::errors::{QuovolError, QuovolResult};
use serde::{Deserialize, Serialize};

use crate::runtime::constants::{bootstrap as keys, defaults, envs as const_envs, records};
use crate::runtime::layout::dirs as const_dirs;
use crate::store::Record;

// ============================================================================
// Manager Options
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManagerOptions {
    /// Storage root holding records, default mount points and logs.
    pub root_dir: PathBuf,
    pub bootstrap: BootstrapOptions,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        let root_dir = std::env::var(const_envs::QUOVOL_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut path = home_dir().unwrap_or_else(|| PathBuf::from("."));
                path.push(const_dirs::QUOVOL_DIR);
                path
            });

        Self {
            root_dir,
            bootstrap: BootstrapOptions::default(),
        }
    }
}

// ============================================================================
// Bootstrap Options
// ============================================================================

/// Host-supplied bootstrap map (`quobyte.apiurl`, `quobyte.registries`, ...).
///
/// Empty values are treated as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BootstrapOptions {
    values: HashMap<String, String>,
}

impl BootstrapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    fn require(&self, key: &str) -> QuovolResult<&str> {
        self.get(key)
            .ok_or_else(|| QuovolError::Config(format!("missing required parameter: {key}")))
    }

    fn timeout_secs(&self, key: &str, default: u64) -> QuovolResult<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Ok(secs),
                _ => Err(QuovolError::Config(format!(
                    "{key} must be a positive number of seconds, got {raw:?}"
                ))),
            },
        }
    }
}

impl From<HashMap<String, String>> for BootstrapOptions {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

// ============================================================================
// Manager Configuration (persisted)
// ============================================================================

/// Manager-wide configuration, persisted as `quobyte.cfg` in the storage root.
///
/// Created once from validated bootstrap options and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub root: PathBuf,
    /// Comma-separated `host:port` registry addresses, as supplied.
    pub registries: String,
    /// Owner applied to new volumes.
    pub user: String,
    /// Owning group applied to new volumes.
    pub group: String,
    /// Volume configuration template applied to new volumes.
    pub volume_config: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default = "default_api_user")]
    pub api_user: String,
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    #[serde(default = "default_mount_timeout_secs")]
    pub mount_timeout_secs: u64,
}

fn default_api_user() -> String {
    defaults::API_USER.to_string()
}

fn default_remote_timeout_secs() -> u64 {
    defaults::REMOTE_TIMEOUT_SECS
}

fn default_mount_timeout_secs() -> u64 {
    defaults::MOUNT_TIMEOUT_SECS
}

impl ManagerConfig {
    /// Validate bootstrap options and build a fresh configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if:
    /// - `quobyte.apiurl` or `quobyte.registries` is missing
    /// - any registry is not a valid `host:port` or does not resolve
    /// - a timeout is not a positive integer
    pub async fn from_bootstrap(
        root: PathBuf,
        options: &BootstrapOptions,
        resolver: &dyn HostResolver,
    ) -> QuovolResult<Self> {
        let api_url = options.require(keys::API_URL)?;
        let registries = options.require(keys::REGISTRIES)?;

        for registry in parse_registries(registries)? {
            if registry.host.parse::<IpAddr>().is_ok() {
                continue;
            }
            if !resolver.resolves(&registry.host, registry.port).await {
                return Err(QuovolError::Config(format!(
                    "invalid or unresolvable registry address: {}",
                    registry.host
                )));
            }
        }

        Ok(Self {
            root,
            registries: registries.to_string(),
            user: options.get_or(keys::DEFAULT_USER, defaults::USER).to_string(),
            group: options.get_or(keys::DEFAULT_GROUP, defaults::GROUP).to_string(),
            volume_config: options
                .get_or(keys::DEFAULT_VOLUME_CONFIG, defaults::VOLUME_CONFIG)
                .to_string(),
            api_url: api_url.to_string(),
            api_user: options
                .get_or(keys::API_USER, defaults::API_USER)
                .to_string(),
            remote_timeout_secs: options
                .timeout_secs(keys::REMOTE_TIMEOUT, defaults::REMOTE_TIMEOUT_SECS)?,
            mount_timeout_secs: options
                .timeout_secs(keys::MOUNT_TIMEOUT, defaults::MOUNT_TIMEOUT_SECS)?,
        })
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn mount_timeout(&self) -> Duration {
        Duration::from_secs(self.mount_timeout_secs)
    }
}

impl Record for ManagerConfig {
    const PREFIX: &'static str = records::CONFIG_PREFIX;
    const SUFFIX: &'static str = records::CONFIG_SUFFIX;

    fn id(&self) -> &str {
        ""
    }
}

// ============================================================================
// API Settings (per process, never persisted whole)
// ============================================================================

/// Remote API endpoint and credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub url: String,
    pub user: String,
    pub password: String,
}

impl ApiSettings {
    /// Combine the persisted configuration with this start's bootstrap map.
    ///
    /// Bootstrap values win; the password is never persisted and falls back
    /// to the placeholder default.
    pub fn resolve(config: &ManagerConfig, options: &BootstrapOptions) -> QuovolResult<Self> {
        let url = options
            .get(keys::API_URL)
            .unwrap_or(&config.api_url)
            .to_string();
        if url.is_empty() {
            return Err(QuovolError::Config(format!(
                "missing required parameter: {}",
                keys::API_URL
            )));
        }

        Ok(Self {
            url,
            user: options
                .get(keys::API_USER)
                .unwrap_or(&config.api_user)
                .to_string(),
            password: options
                .get_or(keys::API_PASSWORD, defaults::API_PASSWORD)
                .to_string(),
        })
    }
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Registry address validation
// ============================================================================

/// One `host:port` registry entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryAddress {
    pub host: String,
    pub port: u16,
}

/// Parse a comma-separated registry list, checking syntax only.
pub fn parse_registries(list: &str) -> QuovolResult<Vec<RegistryAddress>> {
    list.split(',')
        .map(|entry| parse_registry(entry.trim()))
        .collect()
}

fn parse_registry(entry: &str) -> QuovolResult<RegistryAddress> {
    let invalid = |why: &str| {
        QuovolError::Config(format!(
            "invalid or unresolvable address {entry:?}: {why}"
        ))
    };

    let (host, port) = split_host_port(entry).ok_or_else(|| invalid("expected host:port"))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| invalid("port must be a number between 0 and 65535"))?;

    if host.parse::<IpAddr>().is_err() && !is_valid_hostname(host) {
        return Err(invalid("not a valid hostname or IP address"));
    }

    Ok(RegistryAddress {
        host: host.to_string(),
        port,
    })
}

/// Split `host:port` or `[v6]:port`.
fn split_host_port(entry: &str) -> Option<(&str, &str)> {
    if let Some(rest) = entry.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        return Some((host, port));
    }

    let (host, port) = entry.rsplit_once(':')?;
    if host.is_empty() || host.contains(':') {
        return None;
    }
    Some((host, port))
}

/// RFC 1123 hostname check.
fn is_valid_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

/// Resolves registry hostnames during bootstrap validation.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolves(&self, host: &str, port: u16) -> bool;
}

/// [`HostResolver`] backed by the system resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolves(&self, host: &str, port: u16) -> bool {
        match tokio::net::lookup_host((host, port)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                tracing::debug!(host, "Registry lookup failed: {}", e);
                false
            }
        }
    }
}
