//! QuillHub API server

use std::sync::Arc;

use anyhow::Context;
use quillhub_api::{
    auth::{BotIdentity, CredentialStore, PasswordHasher, PgCredentialStore},
    config::Config,
    routes::create_router,
    state::{build_auth_service, AppState},
    telemetry,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Missing or weak secrets stop the process here, before any request
    let config = Config::from_env().context("Invalid configuration")?;
    telemetry::init_tracing(config.log_format);

    let pool = quillhub_shared::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    quillhub_shared::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let store: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool));
    let auth_service = build_auth_service(&config, store.clone(), PasswordHasher::default())
        .context("Failed to initialize auth service")?;

    let bot = auth_service
        .ensure_bot_account(&BotIdentity::default())
        .await
        .context("Failed to provision bot account")?;
    tracing::info!(account_id = %bot.id, "Bot account ready");

    let bind_address = config.bind_address.clone();
    let app = create_router(AppState::new(config, store, auth_service));

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(address = %bind_address, "QuillHub API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Shutdown listener failed");
            }
        })
        .await
        .context("Server error")?;

    tracing::info!("QuillHub API stopped");
    Ok(())
}
