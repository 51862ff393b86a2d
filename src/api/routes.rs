//! Router assembly and server lifecycle.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agents::Orchestrator;
use crate::config::Config;
use crate::store::AppStore;
use crate::thoughts::SessionRegistry;

use super::admin;
use super::agent;
use super::auth;
use super::sessions;
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn AppStore>,
    /// Live per-session thought streams
    pub sessions: SessionRegistry,
    /// Agent runtime; `None` when no model is configured
    pub orchestrator: Option<Arc<Orchestrator>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn AppStore>,
        orchestrator: Option<Arc<Orchestrator>>,
    ) -> Self {
        Self {
            config,
            store,
            sessions: SessionRegistry::new(),
            orchestrator,
        }
    }
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/auth/validate", get(auth::validate))
        .route("/api/auth/logout", post(auth::logout))
        // Sessions
        .route(
            "/api/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/api/sessions/:id",
            get(sessions::get_session)
                .put(sessions::update_session)
                .delete(sessions::delete_session),
        )
        // Agent turns and live state
        .route("/api/sessions/:id/run", post(agent::run))
        .route("/api/sessions/:id/state", get(agent::get_state))
        .route("/api/sessions/:id/stream", get(agent::stream))
        // User management
        .route(
            "/api/admin/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route(
            "/api/admin/users/:id",
            axum::routing::put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/api/admin/users/:id/reset-password",
            post(admin::reset_password),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Wait for SIGTERM/SIGINT, then persist live session state.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, saving live sessions...");

    let live = state.sessions.all().await;
    let mut saved = 0usize;
    for session in live {
        let snapshot = session.snapshot().await;
        match state
            .store
            .save_session_state(session.session_id(), &snapshot)
            .await
        {
            Ok(()) => saved += 1,
            Err(e) => tracing::error!(
                "Failed to save session {}: {}",
                session.session_id(),
                e
            ),
        }
    }

    tracing::info!("Saved {} live sessions, shutdown complete", saved);
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        agents_enabled: state.orchestrator.is_some(),
        model: state.config.model.default_model.clone(),
        persistent_store: state.store.is_persistent(),
    })
}
