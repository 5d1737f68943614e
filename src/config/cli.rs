use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the blobgate binary.
#[derive(Debug, Parser)]
#[command(
    name = "blobgate",
    version,
    about = "Object store gateway with a cache-aside read layer"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BLOBGATE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP gateway.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Override the shared secret required on PUT and DELETE.
    #[arg(long = "auth-secret", env = "BLOBGATE_AUTH_SECRET", value_name = "SECRET")]
    pub auth_secret: Option<String>,

    /// Override the header carrying the shared secret.
    #[arg(long = "auth-header", value_name = "NAME")]
    pub auth_header: Option<String>,

    /// Override the object store backend (filesystem|memory).
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub store_backend: Option<String>,

    /// Override the filesystem store directory.
    #[arg(long = "store-directory", value_name = "PATH")]
    pub store_directory: Option<PathBuf>,

    /// Toggle the in-memory cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the number of cached keys.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<u64>,

    /// Override the largest blob the cache will hold, in bytes.
    #[arg(long = "cache-max-entry-bytes", value_name = "BYTES")]
    pub cache_max_entry_bytes: Option<u64>,

    /// Override how PUT reconciles the cache (write_through|invalidate|write_around).
    #[arg(long = "cache-write-policy", value_name = "POLICY")]
    pub cache_write_policy: Option<String>,

    /// Override the maximum PUT body size in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Override the multipart field carrying the object.
    #[arg(long = "uploads-file-field", value_name = "NAME")]
    pub uploads_file_field: Option<String>,
}
