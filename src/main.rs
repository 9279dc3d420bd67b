mod config;
mod error;
mod handlers;
mod metrics;
mod middleware;
mod models;
mod rate_limit;
mod state;
mod store;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use clap::Parser;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::handlers::{
    create_note, delete_note, get_note, health_handler, list_notes, metrics_handler, update_note,
};
use crate::middleware::admission_gate;
use crate::rate_limit::{AdmissionController, RateLimitConfig};
use crate::state::AppState;
use crate::store::{BudgetStore, MemoryBudgetStore, RemoteBudgetStore};

// this is main async function with tokio
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();

    if args.rate_limit == 0 || args.rate_window == 0 {
        panic!("rate limit and window must be non-zero");
    }

    // budget store: remote key-value service if configured, in-memory otherwise
    let budget_store: Arc<dyn BudgetStore> = match &args.budget_store_url {
        Some(url) => Arc::new(RemoteBudgetStore::new(
            url.clone(),
            args.budget_store_token.clone(),
            Duration::from_millis(args.budget_store_timeout_ms),
        )),
        None => Arc::new(MemoryBudgetStore::new()),
    };

    let admission = AdmissionController::new(
        budget_store,
        RateLimitConfig {
            max_tokens: args.rate_limit,
            window: Duration::from_secs(args.rate_window),
        },
    );

    // creating shared state
    let state = Arc::new(AppState {
        notes: DashMap::new(),
        admission,
        rate_scope: args.rate_scope,
        fail_policy: args.fail_policy(),
    });

    // note routes sit behind the admission gate
    let api = Router::new()
        .route("/api/notes", get(list_notes).post(create_note))
        .route(
            "/api/notes/{id}",
            get(get_note).put(update_note).delete(delete_note),
        )
        .route_layer(from_fn_with_state(state.clone(), admission_gate));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // operational endpoints and the bundled client bypass the gate
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .fallback_service(ServeDir::new(&args.static_dir))
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    info!("Server running on http://localhost:{}", args.port);
    info!(
        "Rate limit: {} requests per {} seconds ({:?} scope, fail-{})",
        args.rate_limit,
        args.rate_window,
        args.rate_scope,
        if args.fail_open { "open" } else { "closed" }
    );
    info!("Serving client from {}", args.static_dir);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
