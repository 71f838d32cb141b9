use std::fs;
use std::sync::Arc;

use anyhow::bail;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::RngCore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beacon::auth::TokenGenerator;
use beacon::config::ServerConfig;
use beacon::core::Core;
use beacon::server::{AppState, create_router};
use beacon::storage::FsObjectStore;
use beacon::store::{SqliteStore, Store};
use beacon::types::Plan;

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Backend for hosted code workspaces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and object storage
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, seed plans, generate the admin secret)
    Init {
        /// Data directory for database and object storage
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

/// Plan catalog seeded at init. Limits are bytes; prices are cents per
/// month.
fn plan_catalog() -> Vec<Plan> {
    const GIB: i64 = 1024 * 1024 * 1024;
    let now = Utc::now();
    let plan = |id: &str, price_cents: i32, storage_limit_bytes: i64, max_members: i32| Plan {
        id: id.to_string(),
        name: id.to_string(),
        price_cents,
        storage_limit_bytes,
        max_members,
        created_at: now,
    };

    vec![
        plan("free", 0, GIB, 1),
        plan("haste_i", 900, 10 * GIB, 5),
        plan("haste_ii", 2900, 50 * GIB, 15),
        plan("haste_iii", 9900, 250 * GIB, 50),
    ]
}

fn generate_admin_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn run_init(data_dir: String) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let secret_file = config.admin_secret_path();
    if secret_file.exists() {
        bail!(
            "Server already initialized. Admin secret exists at: {}",
            secret_file.display()
        );
    }

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    for plan in plan_catalog() {
        store.create_plan(&plan)?;
    }

    let secret = generate_admin_secret();
    fs::write(&secret_file, &secret)?;

    #[cfg(unix)]
    set_restrictive_permissions(&secret_file);

    println!();
    println!("========================================");
    println!("Admin secret (save this, it won't be shown again):");
    println!();
    println!("  {secret}");
    println!();
    println!("Secret also written to: {}", secret_file.display());
    println!("Pass it in the 'x-admin-secret' header for admin endpoints");
    println!("and the billing webhook.");
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let secret_file = config.admin_secret_path();
    let Ok(admin_secret) = fs::read_to_string(&secret_file) else {
        bail!(
            "Server not initialized. Run 'beacon admin init' first to create the database and admin secret."
        );
    };

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let objects = FsObjectStore::new(&config.data_dir);
    let core = Core::new(Arc::new(store), Arc::new(objects));

    let state = Arc::new(AppState {
        core,
        tokens: TokenGenerator::new(),
        admin_secret: admin_secret.trim().to_string(),
    });

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("beacon=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => {
                run_init(data_dir)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
            };
            run_serve(config).await?;
        }
    }

    Ok(())
}
