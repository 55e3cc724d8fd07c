//! Session middleware: per-request identity resolution.
//!
//! Two layers, applied in order:
//! 1. `scope_client` (all `/api/*`): builds a provider client bound to the
//!    request's `Authorization` header. An absent header means anonymous.
//! 2. `require_principal` (notes routes): asks the provider who the credential
//!    belongs to and binds the `Principal` for handlers, or answers 401 before
//!    any handler runs.
//!
//! Nothing is cached between requests; every request resolves afresh.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use notecraft_core::{BearerToken, NotesService, Principal, ProviderClient};

use crate::error::ApiError;
use crate::AppState;

/// The provider client for the current request.
#[derive(Clone)]
pub struct ScopedClient(pub Arc<dyn ProviderClient>);

/// Extract a bearer credential from request headers.
///
/// Missing, non-UTF-8 or non-Bearer headers all yield `None`.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<BearerToken> {
    let value = headers.get(AUTHORIZATION)?;
    match value.to_str() {
        Ok(s) => BearerToken::from_header(s),
        Err(_) => {
            tracing::debug!("Invalid Authorization header encoding");
            None
        }
    }
}

pub async fn scope_client(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let factory = state.factory.as_ref().ok_or(ApiError::ConfigMissing)?;
    let credential = bearer_from_headers(req.headers());
    req.extensions_mut()
        .insert(ScopedClient(factory.scoped(credential)));
    Ok(next.run(req).await)
}

pub async fn require_principal(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let client = req
        .extensions()
        .get::<ScopedClient>()
        .cloned()
        .ok_or(ApiError::Unauthorized)?;

    let principal = client.0.get_user().await.map_err(|e| {
        tracing::debug!("Principal resolution failed: {}", e);
        ApiError::Unauthorized
    })?;

    tracing::debug!(user_id = %principal.id, "Resolved principal");
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Notes service for the resolved principal, scoped to this request.
pub struct Notes(pub NotesService);

impl FromRequestParts<Arc<AppState>> for Notes {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let client = parts
            .extensions
            .get::<ScopedClient>()
            .cloned()
            .ok_or(ApiError::Unauthorized)?;
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(ApiError::Unauthorized)?;

        Ok(Notes(
            NotesService::new(client.0, principal).with_table(state.config.notes_table.as_str()),
        ))
    }
}
