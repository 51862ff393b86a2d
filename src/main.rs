//! Agent Studio - HTTP Server Entry Point
//!
//! Opens the database, seeds the admin account and serves the API.

use std::sync::Arc;

use agent_studio::{
    agents::Orchestrator,
    api::{self, AppState},
    config::Config,
    llm::{ChatOptions, OpenRouterClient},
    store::{seed_admin, AppStore, SqliteStore},
    tools::ToolRegistry,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_studio=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, db={}",
        config.model.default_model,
        config.db_path.display()
    );
    if config.auth.uses_dev_secret() {
        warn!("JWT_SECRET not set, using the development secret");
    }

    let store: Arc<dyn AppStore> = Arc::new(SqliteStore::open(config.db_path.clone()).await?);
    seed_admin(
        store.as_ref(),
        &config.admin,
        config.auth.password_hash_rounds,
    )
    .await?;

    let orchestrator = match config.model.api_key.clone() {
        Some(api_key) => {
            let options = ChatOptions {
                reasoning_max_tokens: config.model.reasoning_max_tokens(),
                ..Default::default()
            };
            Some(Arc::new(Orchestrator::new(
                Arc::new(OpenRouterClient::new(api_key)),
                Arc::new(ToolRegistry::new()),
                config.model.default_model.clone(),
                options,
                config.model.max_iterations,
            )))
        }
        None => {
            warn!("OPENROUTER_API_KEY not set, agent runs are disabled");
            None
        }
    };

    let state = Arc::new(AppState::new(config, store, orchestrator));
    api::serve(state).await?;

    Ok(())
}
