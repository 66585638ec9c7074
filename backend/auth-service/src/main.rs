use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use token_codec::{SecretStrength, TokenCodec};
use tracing::{info, warn};

use auth_service::config::Settings;
use auth_service::db::PgCredentialStore;
use auth_service::revocation::{spawn_sweeper, RevocationStore};
use auth_service::routes::build_router;
use auth_service::services::{AuthOrchestrator, FederationService, TokenService};
use auth_service::{telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let settings = Settings::load().context("Failed to load configuration")?;

    // Fail fast on an unusable signing secret rather than at first login.
    match token_codec::validate_secret(&settings.jwt.secret) {
        Ok(SecretStrength::Strong) => {}
        Ok(SecretStrength::Acceptable) => {
            warn!("JWT_SECRET meets the minimum length but 64+ bytes is recommended");
        }
        Err(e) => anyhow::bail!("JWT_SECRET rejected: {}", e),
    }
    let codec = TokenCodec::new(&settings.jwt.secret).context("Failed to build token codec")?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");

    let store: Arc<dyn auth_service::db::CredentialStore> =
        Arc::new(PgCredentialStore::new(pool));

    let revocations = Arc::new(RevocationStore::new());
    let _sweeper = spawn_sweeper(
        revocations.clone(),
        Duration::from_secs(settings.auth.sweep_interval_secs),
    );

    let tokens = Arc::new(TokenService::new(
        codec,
        store.clone(),
        settings.jwt.access_ttl_secs,
        settings.jwt.refresh_ttl_secs,
    ));
    let auth = Arc::new(AuthOrchestrator::new(
        store.clone(),
        tokens.clone(),
        revocations.clone(),
    ));
    let federation = Arc::new(FederationService::new(
        settings.oauth.clone(),
        store.clone(),
    ));

    let state = AppState {
        store,
        tokens,
        revocations,
        auth,
        federation,
        public_prefixes: Arc::new(settings.auth.public_prefixes.clone()),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("auth-service listening on {}", addr);

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
