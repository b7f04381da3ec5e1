use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use automation_backend::{
    build_router,
    config::{Config, StoreBackend},
    database,
    store::{AutomationStore, MemoryStore, PgAutomationStore},
    workflows::{AutomationEngine, EventDispatcher},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (store, db_pool): (Arc<dyn AutomationStore>, Option<sqlx::PgPool>) = match config.store {
        StoreBackend::Postgres => {
            let pool = database::create_pool(&config.database_url).await?;
            database::migrate(&pool).await?;
            (Arc::new(PgAutomationStore::new(pool.clone())), Some(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory automation store; nothing is persisted");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let engine = AutomationEngine::new(Arc::clone(&store)).strict(config.strict_mode);
    if config.strict_mode {
        tracing::info!("Strict mode: unknown action types and operators will fail");
    }

    let mut state = AppState::new(store, EventDispatcher::new(engine));
    if let Some(pool) = db_pool {
        state = state.with_pool(pool);
    }

    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
