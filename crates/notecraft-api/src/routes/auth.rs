//! Identity endpoints.

use axum::{Extension, Json};
use notecraft_core::Principal;
use serde::Serialize;

use crate::session::ScopedClient;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: Option<Principal>,
}

/// GET /api/auth/user - the principal behind the request's credential.
///
/// Never fails: an absent or rejected credential answers `{"user": null}`.
pub async fn current_user(Extension(client): Extension<ScopedClient>) -> Json<UserResponse> {
    let user = match client.0.get_user().await {
        Ok(principal) => Some(principal),
        Err(e) => {
            tracing::debug!("No user for request: {}", e);
            None
        }
    };
    Json(UserResponse { user })
}
