pub mod analyzer;
pub mod cache;
pub mod concurrency;
pub mod config;
pub mod fetcher;
pub mod interfaces;
pub mod jobs;
pub mod models;
pub mod progress;
pub mod search;
pub mod server;
pub mod time;
pub mod validator;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::jobs::JobManager;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub job_manager: Arc<JobManager>,
}

pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let authenticated_routes = Router::new()
        .route("/api/v1/jobs/:tenant", post(server::routes::create_job))
        .route("/api/v1/jobs/:tenant/stop", post(server::routes::stop_job))
        .route(
            "/api/v1/jobs/:tenant/status",
            get(server::routes::get_job_status),
        )
        .route(
            "/api/v1/jobs/:tenant/progress",
            get(server::routes::get_job_progress),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            server::auth::verify_hmac,
        ));

    let public_routes = Router::new().route("/api/v1/health", get(server::routes::health));

    Router::new()
        .merge(authenticated_routes)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
