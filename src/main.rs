use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use discourse_post_mirror::config::{Config, TenantRegistration};
use discourse_post_mirror::db::{self, Database};
use discourse_post_mirror::discourse::DiscourseClient;
use discourse_post_mirror::sync::{self, Registration};

#[derive(Debug, Parser)]
#[command(name = "discourse-post-mirror")]
#[command(about = "Mirror Discourse forum posts into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sync every registered forum once and exit (cron entry point)
    Run,
    /// Sync every registered forum, then again every SYNC_INTERVAL_SECS
    Watch,
    /// Register the forum described by TENANT_NAME, API_BASE_URL, DISCOURSE_API_KEY, ...
    Register,
    /// Mirror a forum's history from its newest post downwards
    Backfill {
        /// Name of the registered forum
        #[arg(long)]
        tenant: String,
        /// Start below this post id instead of the newest post
        #[arg(long)]
        before: Option<i64>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let client = DiscourseClient::from_config(&config)?;
            let summary = sync::run_once(&client, &db, &config).await?;
            if !summary.is_success() {
                anyhow::bail!("{} of {} tenants failed", summary.failed(), summary.tenants.len());
            }
        }
        Commands::Watch => {
            let client = DiscourseClient::from_config(&config)?;
            sync::watch(&client, &db, &config, shutdown_signal()).await;
        }
        Commands::Register => {
            let registration =
                TenantRegistration::from_env().context("Failed to load tenant registration")?;
            match sync::register_tenant(&db, &registration).await? {
                Registration::Created(tenant) => {
                    info!(tenant = %tenant.name, id = tenant.id, "Tenant created");
                }
                Registration::Existing(tenant) => {
                    warn!(tenant = %tenant.name, "Tenant already exists, nothing changed");
                }
            }
        }
        Commands::Backfill { tenant, before } => {
            let tenant = db::get_tenant_by_name(db.pool(), &tenant)
                .await?
                .with_context(|| format!("No tenant named '{tenant}'"))?;
            let client = DiscourseClient::from_config(&config)?;
            sync::backfill_tenant(&client, &db, &config, &tenant, before).await?;
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,discourse_post_mirror=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
