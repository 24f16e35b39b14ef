use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the ogcache binary.
#[derive(Debug, Parser)]
#[command(name = "ogcache", version, about = "Open Graph image cache")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "OGCACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the OG image HTTP service.
    Serve(Box<ServeArgs>),
    /// Generate (or fetch from the store) one card and write it to a file.
    Render(RenderArgs),
    /// Populate the artifact store for every known identifier.
    Warm(WarmArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: PipelineOverrides,

    /// Content identifier (page path) to render.
    #[arg(value_name = "IDENTIFIER")]
    pub identifier: String,

    /// File the image bytes are written to.
    #[arg(value_name = "OUTPUT", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct WarmArgs {
    #[command(flatten)]
    pub overrides: PipelineOverrides,

    /// Maximum number of concurrent render tasks.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(usize))]
    pub concurrency: usize,
}

/// Overrides shared by every command that runs the generate pipeline.
#[derive(Debug, Args, Default, Clone)]
pub struct PipelineOverrides {
    /// Override the metadata table path.
    #[arg(long = "metadata-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub metadata_path: Option<PathBuf>,

    /// Override the renderer executable.
    #[arg(long = "render-program", value_name = "PATH")]
    pub render_program: Option<PathBuf>,

    /// Override the site title drawn on every card.
    #[arg(long = "render-brand", value_name = "TEXT")]
    pub render_brand: Option<String>,

    /// Override the artifact store backend (memory|filesystem).
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub store_backend: Option<String>,

    /// Override the filesystem store directory.
    #[arg(long = "store-directory", value_name = "PATH")]
    pub store_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub pipeline: PipelineOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the route serving OG images.
    #[arg(long = "server-route", value_name = "PATH")]
    pub server_route: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the client-facing Cache-Control max-age.
    #[arg(long = "response-max-age-seconds", value_name = "SECONDS")]
    pub response_max_age_seconds: Option<u64>,
}
