use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the folio binary.
#[derive(Debug, Parser)]
#[command(
    name = "folio",
    version,
    about = "Portfolio and blog content server with static fallback"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "FOLIO_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub source: SourceOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Query published posts through the resolver.
    Posts(PostsArgs),
    /// List the tags of published posts.
    Tags,
    /// Report whether the live backend is reachable and which source answers.
    Source,
    /// Static snapshot utilities.
    Snapshot(SnapshotArgs),
}

/// Where content comes from; accepted by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct SourceOverrides {
    /// Override the live backend base URL.
    #[arg(long = "backend-url", value_name = "URL", global = true)]
    pub backend_url: Option<String>,

    /// Ignore any configured backend and answer from the snapshot only.
    #[arg(long = "offline", action = clap::ArgAction::SetTrue, global = true)]
    pub offline: bool,

    /// Override the backend request timeout.
    #[arg(long = "backend-timeout-ms", value_name = "MILLIS", global = true)]
    pub backend_timeout_ms: Option<u64>,

    /// Override the static snapshot file.
    #[arg(
        long = "snapshot-path",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub snapshot_path: Option<PathBuf>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the availability probe TTL.
    #[arg(long = "probe-ttl-seconds", value_name = "SECONDS")]
    pub probe_ttl_seconds: Option<u64>,

    /// Toggle the query cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the query cache capacity.
    #[arg(long = "cache-capacity", value_name = "ENTRIES")]
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct PostsArgs {
    #[command(subcommand)]
    pub command: PostsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum PostsCommand {
    /// List published posts, newest first.
    List(PostsListArgs),
    /// Show a single post by slug.
    Show(PostsShowArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct PostsListArgs {
    /// Only posts carrying any of these tags (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Case-insensitive substring over title, excerpt and body.
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

#[derive(Debug, Args, Clone)]
pub struct PostsShowArgs {
    pub slug: String,

    /// Include drafts; requires the live backend.
    #[arg(long = "include-unpublished", action = clap::ArgAction::SetTrue)]
    pub include_unpublished: bool,
}

#[derive(Debug, Args, Clone)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SnapshotCommand {
    /// Load and validate a snapshot file, then print a summary.
    Check(SnapshotCheckArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SnapshotCheckArgs {
    /// File to check; defaults to the configured or bundled snapshot.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,
}
