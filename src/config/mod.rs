//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::resolver::FallbackPolicy;

mod cli;

pub use cli::{
    CliArgs, Command, PostsArgs, PostsCommand, PostsListArgs, PostsShowArgs, ServeArgs,
    ServeOverrides, SnapshotArgs, SnapshotCheckArgs, SnapshotCommand, SourceOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PROBE_TTL_SECS: u64 = 30;
const DEFAULT_CACHE_CAPACITY: usize = 512;
const DEFAULT_LIST_TTL_SECS: u64 = 300;
const DEFAULT_DETAIL_TTL_SECS: u64 = 600;
const DEFAULT_TAGS_TTL_SECS: u64 = 1800;
const DEFAULT_COMMENTS_TTL_SECS: u64 = 120;
const DEFAULT_STALE_RETENTION_SECS: u64 = 300;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
    pub probe: ProbeSettings,
    pub cache: CacheSettings,
    pub resolver: ResolverSettings,
    pub snapshot: SnapshotSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// `None` runs without a live backend; every read is served statically.
    pub url: Option<Url>,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub ttl_seconds: u64,
}

impl ProbeSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub list_ttl_seconds: u64,
    pub detail_ttl_seconds: u64,
    pub tags_ttl_seconds: u64,
    pub comments_ttl_seconds: u64,
    pub stale_retention_seconds: u64,
    pub stale_while_revalidate: bool,
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub fallback_policy: FallbackPolicy,
}

#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    /// Replaces the snapshot compiled into the binary.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_source_overrides(&cli.source);
    if let Some(Command::Serve(args)) = cli.command.as_ref() {
        raw.apply_serve_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    backend: RawBackendSettings,
    probe: RawProbeSettings,
    cache: RawCacheSettings,
    resolver: RawResolverSettings,
    snapshot: RawSnapshotSettings,
}

impl RawSettings {
    fn apply_source_overrides(&mut self, overrides: &SourceOverrides) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.url = Some(url.clone());
        }
        if overrides.offline {
            self.backend.url = None;
        }
        if let Some(timeout) = overrides.backend_timeout_ms {
            self.backend.timeout_ms = Some(timeout);
        }
        if let Some(path) = overrides.snapshot_path.as_ref() {
            self.snapshot.path = Some(path.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(ttl) = overrides.probe_ttl_seconds {
            self.probe.ttl_seconds = Some(ttl);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            backend,
            probe,
            cache,
            resolver,
            snapshot,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            backend: build_backend_settings(backend)?,
            probe: ProbeSettings {
                ttl_seconds: probe.ttl_seconds.unwrap_or(DEFAULT_PROBE_TTL_SECS),
            },
            cache: build_cache_settings(cache)?,
            resolver: ResolverSettings {
                fallback_policy: resolver.fallback_policy.unwrap_or_default(),
            },
            snapshot: build_snapshot_settings(snapshot)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "admin listener must not share the public address",
        ));
    }

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let url = match non_blank(backend.url) {
        Some(value) => {
            let url = Url::parse(&value)
                .map_err(|err| LoadError::invalid("backend.url", format!("{err}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "backend.url",
                    "scheme must be http or https",
                ));
            }
            Some(url)
        }
        None => None,
    };

    let timeout_ms = backend.timeout_ms.unwrap_or(DEFAULT_BACKEND_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "backend.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(BackendSettings {
        url,
        api_key: non_blank(backend.api_key),
        timeout_ms,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "cache.capacity",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        list_ttl_seconds: cache.list_ttl_seconds.unwrap_or(DEFAULT_LIST_TTL_SECS),
        detail_ttl_seconds: cache.detail_ttl_seconds.unwrap_or(DEFAULT_DETAIL_TTL_SECS),
        tags_ttl_seconds: cache.tags_ttl_seconds.unwrap_or(DEFAULT_TAGS_TTL_SECS),
        comments_ttl_seconds: cache
            .comments_ttl_seconds
            .unwrap_or(DEFAULT_COMMENTS_TTL_SECS),
        stale_retention_seconds: cache
            .stale_retention_seconds
            .unwrap_or(DEFAULT_STALE_RETENTION_SECS),
        stale_while_revalidate: cache.stale_while_revalidate.unwrap_or(true),
    })
}

fn build_snapshot_settings(snapshot: RawSnapshotSettings) -> Result<SnapshotSettings, LoadError> {
    if let Some(path) = snapshot.path.as_ref()
        && path.as_os_str().is_empty()
    {
        return Err(LoadError::invalid("snapshot.path", "path must not be empty"));
    }
    Ok(SnapshotSettings {
        path: snapshot.path,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    url: Option<String>,
    api_key: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProbeSettings {
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    list_ttl_seconds: Option<u64>,
    detail_ttl_seconds: Option<u64>,
    tags_ttl_seconds: Option<u64>,
    comments_ttl_seconds: Option<u64>,
    stale_retention_seconds: Option<u64>,
    stale_while_revalidate: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawResolverSettings {
    fallback_policy: Option<FallbackPolicy>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSnapshotSettings {
    path: Option<PathBuf>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests;
