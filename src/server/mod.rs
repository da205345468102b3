pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::jwt::TokenService;
use crate::auth::UserStore;
use crate::summarize::{SummarizeOptions, Summarizer};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub summarizer: Arc<Summarizer>,
    pub users: Arc<UserStore>,
    pub tokens: Arc<TokenService>,
    pub options: SummarizeOptions,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(summarizer: Summarizer, tokens: TokenService, options: SummarizeOptions) -> Self {
        Self {
            summarizer: Arc::new(summarizer),
            users: Arc::new(UserStore::new()),
            tokens: Arc::new(tokens),
            options,
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn router(state: AppState) -> Router {
    // allow all origins during development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/summarize", post(handlers::summarize))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
