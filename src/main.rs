//! facematch - face matching upload and query API.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use facematch::{
    config::{CheckConfig, Cli, Command, ServeConfig, TokenConfig},
    queue::{create_sqs_client, ImageQueue, SqsImageQueue},
    server::{create_router, AppState, RouterConfig, TokenSigner},
    store::Database,
    upload::UploadDir,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Token(config) => run_token(config),
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.effective_log_level());

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    let uploads = UploadDir::new(&config.upload_dir, &config.allowed_extensions);

    info!("Configuration:");
    info!("  Database: {}", config.database.display());
    info!("  Upload dir: {}", uploads.root().display());
    info!("  Allowed extensions: {}", uploads.allowed_extensions().join(", "));
    info!("  Max upload: {} bytes", config.max_upload_bytes);
    info!("  Queue: {} ({})", config.queue_name, config.queue_region);
    if let Some(ref endpoint) = config.queue_endpoint {
        info!("  Queue endpoint: {}", endpoint);
    }
    if !config.enqueue_on_upload {
        info!("  Uploads are queued only via POST /api/process_image");
    }

    if config.auth_enabled {
        info!("  Auth: enabled (tokens valid for {}s)", config.token_ttl);
    } else {
        warn!("  Auth: DISABLED - all endpoints are publicly accessible");
        warn!("        Enable for production: --auth-enabled=true --auth-secret=<secret>");
    }

    let db = match Database::open(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {}", config.database.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(uploads.root()).await {
        error!(
            "Failed to create upload directory {}: {}",
            uploads.root().display(),
            e
        );
        return ExitCode::FAILURE;
    }

    info!("");
    info!("Connecting to queue...");
    let client = create_sqs_client(config.queue_endpoint.as_deref(), &config.queue_region).await;
    let queue = match SqsImageQueue::declare(client, &config.queue_name).await {
        Ok(queue) => {
            info!("  Queue ready: {}", queue.url());
            queue
        }
        Err(e) => {
            error!("  {}", e);
            error!("");
            error!("  Please check:");
            error!("    - Your AWS credentials are configured correctly");
            error!("    - The queue endpoint is correct (if using ElasticMQ/LocalStack)");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(db, queue, uploads).with_enqueue_on_upload(config.enqueue_on_upload);
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    if config.auth_enabled {
        info!("    curl -d username=<u> -d password=<p> http://{}/api/register_user", addr);
        info!("    curl -u <u>:<p> http://{}/api/token", addr);
    }
    info!("    curl -F file=@photo.jpg http://{}/api/upload_image", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("┌─┐┌─┐┌─┐┌─┐┌┬┐┌─┐┌┬┐┌─┐┬ ┬");
    info!("├┤ ├─┤│  ├┤ │││├─┤ │ │  ├─┤");
    info!("└  ┴ ┴└─┘└─┘┴ ┴┴ ┴ ┴ └─┘┴ ┴");
    info!("                     v{}", version);
    info!("");
}

/// Initialize the tracing/logging subsystem.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(level: &str) {
    let env_filter = format!("facematch={level},tower_http={level}");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = if config.auth_enabled {
        RouterConfig::new(config.auth_secret_or_empty()).with_token_ttl(config.token_ttl())
    } else {
        RouterConfig::without_auth()
    };

    router_config = router_config.with_max_upload_bytes(config.max_upload_bytes);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Token Command
// =============================================================================

fn run_token(config: TokenConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let signer = TokenSigner::new(&config.secret, std::time::Duration::from_secs(config.ttl));
    let (token, expiry) = signer.issue(&config.username);

    println!("{}", token);
    eprintln!();
    eprintln!("Expires at {} (unix seconds). Use it as:", expiry);
    eprintln!("  Authorization: Bearer {}", token);

    ExitCode::SUCCESS
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging("debug");
    }

    println!("facematch Configuration Check");
    println!("═════════════════════════════");
    println!();

    print!("Opening database {}... ", config.database.display());
    match Database::open(&config.database).await {
        Ok(_) => println!("✓ schema ready"),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if config.queue_name.trim().is_empty() {
        println!("✗ Queue: name is required (--queue-name or FACEMATCH_QUEUE_NAME)");
        return ExitCode::FAILURE;
    }
    if let Some(ref endpoint) = config.queue_endpoint {
        println!("✓ Queue endpoint: {}", endpoint);
    }
    println!("✓ Region: {}", config.queue_region);

    print!("Declaring queue '{}'... ", config.queue_name);
    let client = create_sqs_client(config.queue_endpoint.as_deref(), &config.queue_region).await;
    match SqsImageQueue::declare(client, &config.queue_name).await {
        Ok(queue) => println!("✓ {} ({})", queue.name(), queue.url()),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - Your AWS credentials are configured correctly");
            if config.queue_endpoint.is_some() {
                println!("  - The queue endpoint is correct and reachable");
            }
            return ExitCode::FAILURE;
        }
    }

    println!();
    println!("═════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
