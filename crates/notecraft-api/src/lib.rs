//! NoteCraft notes API
//!
//! Provides:
//! - Per-request session resolution against a Supabase-compatible provider
//! - Owner-scoped notes CRUD under `/api/notes`
//! - Current-user lookup at `/api/auth/user`
//! - Credentialed CORS for the configured browser origins

pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod supabase;

use std::sync::Arc;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::get,
    Router,
};
use notecraft_core::ClientFactory;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;

/// Shared application state
pub struct AppState {
    pub config: Config,
    /// `None` when the provider URL or key was not supplied; every `/api`
    /// request then fails with a configuration error.
    pub factory: Option<Arc<dyn ClientFactory>>,
}

impl AppState {
    pub fn new(config: Config, factory: Option<Arc<dyn ClientFactory>>) -> Self {
        Self { config, factory }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let notes = Router::new()
        .route("/notes", get(routes::notes::list).post(routes::notes::create))
        .route(
            "/notes/{id}",
            get(routes::notes::get)
                .put(routes::notes::update)
                .delete(routes::notes::delete),
        )
        .route_layer(middleware::from_fn(session::require_principal));

    let api = Router::new()
        .route("/auth/user", get(routes::auth::current_user))
        .merge(notes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::scope_client,
        ));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
}
