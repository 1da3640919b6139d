use relief_app::infrastructure::auth::{GoogleIdentity, IdentityProvider, StaticIdentity};
use relief_app::infrastructure::db::{create_connection, run_migrations, SeaOrmStore};
use relief_app::infrastructure::store::{MemoryStore, StationStore};
use relief_app::{AppConfig, AppContext};
use relief_errors::{AppError, AppResult};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // Loading first lets RUST_LOG come from .env.
    let config = AppConfig::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let result = match config {
        Ok(config) => run(config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!("relief-api failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    match config.database_url.as_deref() {
        Some(url) => {
            let db = create_connection(url)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            tracing::info!("Connected to database");

            if config.run_migrations {
                run_migrations(&db)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
            serve(SeaOrmStore::new(db), &config).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(MemoryStore::new(), &config).await
        }
    }
}

async fn serve<S: StationStore>(store: S, config: &AppConfig) -> AppResult<()> {
    let identity: Arc<dyn IdentityProvider> = match config.dev_tokens.as_deref() {
        Some(tokens) => {
            tracing::warn!("DEV_TOKENS set, bearer tokens are not checked against Google");
            Arc::new(StaticIdentity::parse(tokens)?)
        }
        None => Arc::new(GoogleIdentity::new(
            config.userinfo_url.clone(),
            store.clone(),
        )),
    };

    let app = relief_api::router(AppContext::new(store, identity, config));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| AppError::Config(format!("bind {}: {e}", config.bind_addr)))?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}
