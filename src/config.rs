//! Configuration management for facematch.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `FACEMATCH_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Commands
//!
//! - `facematch serve` - Run the HTTP API
//! - `facematch token` - Mint a bearer token offline
//! - `facematch check` - Verify database and queue connectivity
//!
//! # Environment Variables
//!
//! - `FACEMATCH_HOST` - Server bind address (default: 0.0.0.0)
//! - `FACEMATCH_PORT` - Server port (default: 5000)
//! - `FACEMATCH_DATABASE` - SQLite database file (default: facematch.db)
//! - `FACEMATCH_UPLOAD_DIR` - Upload directory (default: images/input)
//! - `FACEMATCH_ALLOWED_EXTENSIONS` - Comma-separated allow-list (default: jpg)
//! - `FACEMATCH_MAX_UPLOAD_BYTES` - Request body limit (default: 16 MiB)
//! - `FACEMATCH_QUEUE_NAME` - Processing queue name (required)
//! - `FACEMATCH_QUEUE_ENDPOINT` - Custom SQS endpoint (ElasticMQ, LocalStack)
//! - `FACEMATCH_QUEUE_REGION` - AWS region (default: us-east-1)
//! - `FACEMATCH_ENQUEUE_ON_UPLOAD` - Queue uploads immediately (default: true)
//! - `FACEMATCH_AUTH_ENABLED` - Require credentials on /api (default: true)
//! - `FACEMATCH_AUTH_SECRET` - HMAC secret for bearer tokens
//! - `FACEMATCH_TOKEN_TTL` - Token lifetime in seconds (default: 600)
//! - `FACEMATCH_CORS_ORIGINS` - Allowed CORS origins (default: any)
//! - `FACEMATCH_LOG_LEVEL` - Log level (default: info)

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::server::DEFAULT_MAX_UPLOAD_BYTES;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default SQLite database path.
pub const DEFAULT_DATABASE: &str = "facematch.db";

/// Default upload directory.
pub const DEFAULT_UPLOAD_DIR: &str = "images/input";

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default bearer token lifetime in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 600;

/// Upper bound on bearer token lifetime (one year).
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// CLI Arguments
// =============================================================================

/// facematch - upload photos and query face matches.
///
/// Accepts image uploads, queues them for an external face processing
/// worker, and serves the worker's results from SQLite.
#[derive(Parser, Debug, Clone)]
#[command(name = "facematch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeConfig),

    /// Print a bearer token for a user
    Token(TokenConfig),

    /// Check database and queue connectivity
    Check(CheckConfig),
}

impl Cli {
    /// Consume the parsed arguments, returning the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Options for `facematch serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "FACEMATCH_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "FACEMATCH_PORT")]
    pub port: u16,

    /// SQLite database file.
    #[arg(long, default_value = DEFAULT_DATABASE, env = "FACEMATCH_DATABASE")]
    pub database: PathBuf,

    // =========================================================================
    // Upload Configuration
    // =========================================================================
    /// Directory uploaded images are written to.
    #[arg(long, default_value = DEFAULT_UPLOAD_DIR, env = "FACEMATCH_UPLOAD_DIR")]
    pub upload_dir: PathBuf,

    /// Accepted file extensions (comma-separated, case-insensitive).
    #[arg(
        long,
        default_value = "jpg",
        env = "FACEMATCH_ALLOWED_EXTENSIONS",
        value_delimiter = ','
    )]
    pub allowed_extensions: Vec<String>,

    /// Largest accepted request body in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "FACEMATCH_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // Queue Configuration
    // =========================================================================
    /// Name of the processing queue.
    #[arg(long, env = "FACEMATCH_QUEUE_NAME")]
    pub queue_name: String,

    /// Custom SQS endpoint URL for SQS-compatible services.
    ///
    /// If not specified, uses the default AWS endpoint for the region.
    #[arg(long, env = "FACEMATCH_QUEUE_ENDPOINT")]
    pub queue_endpoint: Option<String>,

    /// AWS region of the queue.
    #[arg(long, default_value = DEFAULT_REGION, env = "FACEMATCH_QUEUE_REGION")]
    pub queue_region: String,

    /// Queue each upload for processing as soon as it is stored.
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "FACEMATCH_ENQUEUE_ON_UPLOAD")]
    pub enqueue_on_upload: bool,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Require Basic or Bearer credentials on /api routes.
    ///
    /// WARNING: Only disable authentication in development/testing.
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "FACEMATCH_AUTH_ENABLED")]
    pub auth_enabled: bool,

    /// Secret key for signing bearer tokens.
    ///
    /// If not provided and auth is enabled, the server will fail to start.
    #[arg(long, env = "FACEMATCH_AUTH_SECRET")]
    pub auth_secret: Option<String>,

    /// Bearer token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_SECS, env = "FACEMATCH_TOKEN_TTL")]
    pub token_ttl: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "FACEMATCH_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Log level for facematch and tower-http.
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "FACEMATCH_LOG_LEVEL")]
    pub log_level: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.auth_enabled && self.auth_secret.as_deref().map_or(true, str::is_empty) {
            return Err(
                "Authentication is enabled but no secret provided. \
                 Set --auth-secret or FACEMATCH_AUTH_SECRET, or disable auth with --auth-enabled=false"
                    .to_string(),
            );
        }

        if self.queue_name.trim().is_empty() {
            return Err(
                "Queue name is required. Set --queue-name or FACEMATCH_QUEUE_NAME".to_string(),
            );
        }

        if self.allowed_extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err("allowed_extensions must name at least one extension".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        if self.token_ttl == 0 {
            return Err("token_ttl must be greater than 0".to_string());
        }

        if self.token_ttl > MAX_TOKEN_TTL_SECS {
            return Err(format!(
                "token_ttl must be at most {} seconds",
                MAX_TOKEN_TTL_SECS
            ));
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the auth secret, or "" if unset (call validate() first).
    pub fn auth_secret_or_empty(&self) -> &str {
        self.auth_secret.as_deref().unwrap_or("")
    }

    /// Bearer token lifetime.
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl)
    }

    /// Log level after applying `--verbose`.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

/// Options for `facematch token`.
#[derive(Args, Debug, Clone)]
pub struct TokenConfig {
    /// Secret key the server signs tokens with.
    #[arg(long, env = "FACEMATCH_AUTH_SECRET")]
    pub secret: String,

    /// User the token is issued to.
    #[arg(long)]
    pub username: String,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub ttl: u64,
}

impl TokenConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret must not be empty".to_string());
        }
        if self.username.is_empty() {
            return Err("Username must not be empty".to_string());
        }
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }
        if self.ttl > MAX_TOKEN_TTL_SECS {
            return Err(format!("ttl must be at most {} seconds", MAX_TOKEN_TTL_SECS));
        }
        Ok(())
    }
}

/// Options for `facematch check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// SQLite database file.
    #[arg(long, default_value = DEFAULT_DATABASE, env = "FACEMATCH_DATABASE")]
    pub database: PathBuf,

    /// Name of the processing queue.
    #[arg(long, env = "FACEMATCH_QUEUE_NAME")]
    pub queue_name: String,

    /// Custom SQS endpoint URL.
    #[arg(long, env = "FACEMATCH_QUEUE_ENDPOINT")]
    pub queue_endpoint: Option<String>,

    /// AWS region of the queue.
    #[arg(long, default_value = DEFAULT_REGION, env = "FACEMATCH_QUEUE_REGION")]
    pub queue_region: String,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
