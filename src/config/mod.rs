//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::metadata::DEFAULT_FALLBACK_MARKER;
use crate::cache::DEFAULT_ARTIFACT_TTL_SECS;

mod cli;

pub use cli::{
    CliArgs, Command, PipelineOverrides, RenderArgs, ServeArgs, ServeOverrides, WarmArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "ogcache";
const ENV_PREFIX: &str = "OGCACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ROUTE: &str = "/og-image";
const DEFAULT_METADATA_PATH: &str = "public/og-metadata.json";
const DEFAULT_BRAND: &str = "ogcache";
pub(crate) const DEFAULT_RENDER_PROGRAM: &str = "og-render";
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STORE_DIRECTORY: &str = "og-cache";
const DEFAULT_STORE_MEMORY_LIMIT: usize = 512;
const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub metadata: MetadataSettings,
    pub render: RenderSettings,
    pub store: StoreSettings,
    pub response: ResponseSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub route: String,
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
pub struct MetadataSettings {
    pub path: PathBuf,
    pub fallback: String,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub brand: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Filesystem,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "filesystem" | "fs" => Ok(Self::Filesystem),
            other => Err(format!(
                "unknown backend `{other}` (expected `memory` or `filesystem`)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub directory: PathBuf,
    pub memory_limit: NonZeroUsize,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct ResponseSettings {
    pub max_age: NonZeroU64,
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

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(" ")
            .with_list_parse_key("render.args")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_pipeline_overrides(&args.overrides),
        Some(Command::Warm(args)) => raw.apply_pipeline_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    metadata: RawMetadataSettings,
    render: RawRenderSettings,
    store: RawStoreSettings,
    response: RawResponseSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(route) = overrides.server_route.as_ref() {
            self.server.route = Some(route.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.response_max_age_seconds {
            self.response.max_age_seconds = Some(seconds);
        }

        self.apply_pipeline_overrides(&overrides.pipeline);
    }

    fn apply_pipeline_overrides(&mut self, overrides: &PipelineOverrides) {
        if let Some(path) = overrides.metadata_path.as_ref() {
            self.metadata.path = Some(path.clone());
        }
        if let Some(program) = overrides.render_program.as_ref() {
            self.render.program = Some(program.clone());
        }
        if let Some(brand) = overrides.render_brand.as_ref() {
            self.render.brand = Some(brand.clone());
        }
        if let Some(backend) = overrides.store_backend.as_ref() {
            self.store.backend = Some(backend.clone());
        }
        if let Some(directory) = overrides.store_directory.as_ref() {
            self.store.directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            metadata,
            render,
            store,
            response,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let metadata = build_metadata_settings(metadata)?;
        let render = build_render_settings(render)?;
        let store = build_store_settings(store)?;
        let response = build_response_settings(response)?;

        Ok(Self {
            server,
            logging,
            metadata,
            render,
            store,
            response,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let route = server.route.unwrap_or_else(|| DEFAULT_ROUTE.to_string());
    let route = route.trim().to_string();
    if !route.starts_with('/') || route.len() < 2 {
        return Err(LoadError::invalid(
            "server.route",
            format!("route `{route}` must start with `/` and name a path"),
        ));
    }

    Ok(ServerSettings { addr, route })
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

fn build_metadata_settings(metadata: RawMetadataSettings) -> Result<MetadataSettings, LoadError> {
    let path = metadata
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_METADATA_PATH));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid("metadata.path", "path must not be empty"));
    }

    let fallback = metadata
        .fallback
        .unwrap_or_else(|| DEFAULT_FALLBACK_MARKER.to_string());
    if fallback.trim().is_empty() {
        return Err(LoadError::invalid(
            "metadata.fallback",
            "fallback marker must not be blank",
        ));
    }

    Ok(MetadataSettings { path, fallback })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let brand = render.brand.unwrap_or_else(|| DEFAULT_BRAND.to_string());

    let program = render
        .program
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDER_PROGRAM));
    if program.as_os_str().is_empty() {
        return Err(LoadError::invalid("render.program", "path must not be empty"));
    }

    let timeout_secs = render
        .timeout_seconds
        .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "render.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RenderSettings {
        brand,
        program,
        args: render.args.unwrap_or_default(),
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let backend = match store.backend {
        Some(value) => StoreBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("store.backend", reason))?,
        None => StoreBackend::Memory,
    };

    let directory = store
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIRECTORY));
    if backend == StoreBackend::Filesystem && directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "store.directory",
            "path must not be empty for the filesystem backend",
        ));
    }

    let memory_limit = NonZeroUsize::new(
        store.memory_limit.unwrap_or(DEFAULT_STORE_MEMORY_LIMIT),
    )
    .ok_or_else(|| LoadError::invalid("store.memory_limit", "must be greater than zero"))?;

    let ttl_secs = store.ttl_seconds.unwrap_or(DEFAULT_ARTIFACT_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "store.ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(StoreSettings {
        backend,
        directory,
        memory_limit,
        ttl: Duration::from_secs(ttl_secs),
    })
}

fn build_response_settings(response: RawResponseSettings) -> Result<ResponseSettings, LoadError> {
    let max_age = NonZeroU64::new(response.max_age_seconds.unwrap_or(DEFAULT_MAX_AGE_SECS))
        .ok_or_else(|| {
            LoadError::invalid("response.max_age_seconds", "must be greater than zero")
        })?;

    Ok(ResponseSettings { max_age })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    route: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMetadataSettings {
    path: Option<PathBuf>,
    fallback: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    brand: Option<String>,
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<String>,
    directory: Option<PathBuf>,
    memory_limit: Option<usize>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawResponseSettings {
    max_age_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
