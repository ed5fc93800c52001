// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Entry point: serve the security endpoints or provision accounts.
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use recipe_backend_lib::{
    auth::{validate_password_strength, PasswordHasher},
    config::{Settings, DEFAULT_CONFIG_PATH},
    create_router,
    identity::Identity,
    storage::{CredentialStore, FlatFileStorage},
    AppState,
};
use recipe_common::DEFAULT_ROLE;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zeroize::Zeroize;

#[derive(Debug, Parser)]
#[command(name = "recipe-server", version, about = "Recipe catalog security server")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an account in the credential store
    Provision(ProvisionArgs),
}

#[derive(Debug, Args)]
struct ProvisionArgs {
    #[arg(long)]
    username: String,

    /// Plaintext password, read from the environment so it stays out of shell history
    #[arg(long, env = "RECIPE_PROVISION_PASSWORD", hide_env_values = true)]
    password: String,

    /// Role to grant (repeatable)
    #[arg(long = "role", default_value = DEFAULT_ROLE)]
    roles: Vec<String>,

    /// Replace the password of an existing account instead of leaving it untouched
    #[arg(long)]
    reset_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    init_tracing(&settings);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::Provision(args) => provision(settings, args).await,
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_ascii_lowercase()));
    let registry = tracing_subscriber::registry().with(filter);

    if settings.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.server.bind_addr;
    let purge_interval = Duration::from_secs(settings.session.purge_interval_secs);

    let state = Arc::new(AppState::from_settings(settings)?);
    info!(rules = state.policy.len(), "route policy loaded");

    // Expired sessions and stale lockouts are dropped in the background
    let reaper_state = state.clone();
    let reaper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        loop {
            ticker.tick().await;
            let purged = reaper_state.sessions.purge_expired().await;
            if purged > 0 {
                info!(purged, "expired sessions purged");
            }
            reaper_state.rate_limiter.cleanup();
        }
    });

    let app = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    reaper.abort();
    info!("server stopped");
    Ok(())
}

async fn provision(settings: Settings, args: ProvisionArgs) -> anyhow::Result<()> {
    let ProvisionArgs {
        username,
        mut password,
        roles,
        reset_password,
    } = args;

    if !validate_password_strength(&password, &settings.password_policy) {
        password.zeroize();
        bail!("password does not meet the configured password policy");
    }

    let hasher = PasswordHasher::new(settings.hashing.cost)?;
    let hash = hasher.hash_secure(&mut password)?;
    let store = FlatFileStorage::new(&settings.storage.data_dir)?;

    let identity = Identity::new(&username, &hash, &roles)?;
    if store.provision(&identity).await? {
        info!(%username, "account created");
        return Ok(());
    }

    if reset_password {
        store.update_password(&username, &hash).await?;
        info!(%username, "password reset");
    } else {
        warn!(%username, "account already exists, left unchanged (pass --reset-password to replace its password)");
    }
    Ok(())
}
