//! Client traits for the external identity/storage provider.
//!
//! The provider is consumed as an opaque remote service. Two seams exist:
//! - `ProviderClient` + `ClientFactory`: the server side, one client per request,
//!   bound to that request's bearer credential
//! - `AuthClient`: the browser side, used while reconciling an OAuth redirect
//!
//! Implementations:
//! - `InMemoryProvider` (in this crate) - For testing
//! - `SupabaseFactory` (in notecraft-api) - HTTP client for a Supabase project
//! - `JsAuthClient` (in notecraft-wasm) - Wraps the page's JS client

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::principal::{BearerToken, Principal, Session};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Auth session missing")]
    MissingSession,

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Provider unreachable: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// True when the provider refused the request itself (4xx), as opposed to
    /// failing to serve it.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ProviderError::Rejected { status, .. } if (400..500).contains(status))
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Sort order for a table query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A table-scoped query: equality filters plus optional ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: String,
    pub filters: Vec<(String, String)>,
    pub order: Option<Order>,
}

impl TableQuery {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            filters: Vec::new(),
            order: None,
        }
    }

    /// Add an equality constraint `column = value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Whether a row satisfies every equality filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|(column, expected)| match row.get(column) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        })
    }
}

/// A provider client bound to one request's credential.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Resolve the principal behind the bound credential.
    async fn get_user(&self) -> ProviderResult<Principal>;

    /// Select rows matching the query.
    async fn select(&self, query: &TableQuery) -> ProviderResult<Vec<Value>>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Value) -> ProviderResult<Value>;

    /// Apply `patch` to every matching row and return the updated rows.
    async fn update(&self, query: &TableQuery, patch: Value) -> ProviderResult<Vec<Value>>;

    /// Delete every matching row and return the removed rows.
    async fn delete(&self, query: &TableQuery) -> ProviderResult<Vec<Value>>;
}

/// Builds request-scoped clients. A client never outlives its request.
pub trait ClientFactory: Send + Sync {
    fn scoped(&self, credential: Option<BearerToken>) -> Arc<dyn ProviderClient>;
}

/// Browser-side session operations used during callback reconciliation.
///
/// Runs on a single-threaded event loop, so futures need not be `Send`.
#[async_trait(?Send)]
pub trait AuthClient {
    /// Current session held in the client's own storage, if any.
    async fn get_session(&self) -> ProviderResult<Option<Session>>;

    /// Exchange an authorization code for a session.
    async fn exchange_code_for_session(&self, code: &str) -> ProviderResult<Option<Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matches_all_filters() {
        let query = TableQuery::table("notes").eq("id", "n1").eq("user_id", "u1");

        assert!(query.matches(&json!({"id": "n1", "user_id": "u1", "title": "x"})));
        assert!(!query.matches(&json!({"id": "n1", "user_id": "u2"})));
        assert!(!query.matches(&json!({"id": "n1"})));
        assert!(!query.matches(&json!({"id": "n1", "user_id": null})));
    }

    #[test]
    fn test_query_matches_non_string_columns() {
        let query = TableQuery::table("notes").eq("id", "42");
        assert!(query.matches(&json!({"id": 42})));
    }

    #[test]
    fn test_client_error_classification() {
        let rejected = ProviderError::Rejected {
            status: 400,
            message: "invalid input syntax for type uuid".into(),
        };
        assert!(rejected.is_client_error());

        let server = ProviderError::Rejected {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(!server.is_client_error());
        assert!(!ProviderError::Transport("timeout".into()).is_client_error());
    }
}
