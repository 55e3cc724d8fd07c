//! In-memory identity/storage provider for testing.
//!
//! Behaves like the remote provider at the trait boundary: tokens resolve to
//! principals, authorization codes exchange once, and tables accept equality
//! filtered CRUD. It deliberately applies no row-level security of its own, so
//! tests exercise the ownership predicate of the callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::principal::{BearerToken, Principal, Session};
use crate::provider::{
    AuthClient, ClientFactory, ProviderClient, ProviderError, ProviderResult, TableQuery,
};

#[derive(Default)]
struct Store {
    /// Maps access token -> principal
    users: RwLock<HashMap<String, Principal>>,
    /// Maps authorization code -> access token (single use)
    codes: RwLock<HashMap<String, String>>,
    tables: RwLock<HashMap<String, Vec<Value>>>,
    data_calls: AtomicUsize,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl Store {
    /// Current time, strictly later than any stamp handed out before.
    fn next_stamp(&self) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock().unwrap();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    fn count_data_call(&self) {
        self.data_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory provider. Cloning shares the same store.
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    store: Arc<Store>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an access token that resolves to `principal`.
    pub fn add_user(&self, token: &str, principal: Principal) {
        let mut users = self.store.users.write().unwrap();
        users.insert(token.to_string(), principal);
    }

    /// Register an authorization code that exchanges for `token`'s session.
    pub fn add_auth_code(&self, code: &str, token: &str) {
        let mut codes = self.store.codes.write().unwrap();
        codes.insert(code.to_string(), token.to_string());
    }

    pub fn client(&self, credential: Option<BearerToken>) -> InMemoryClient {
        InMemoryClient {
            store: Arc::clone(&self.store),
            credential,
        }
    }

    /// Number of table operations performed so far.
    pub fn data_calls(&self) -> usize {
        self.store.data_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        let tables = self.store.tables.read().unwrap();
        tables.get(table).cloned().unwrap_or_default()
    }
}

impl ClientFactory for InMemoryProvider {
    fn scoped(&self, credential: Option<BearerToken>) -> Arc<dyn ProviderClient> {
        Arc::new(self.client(credential))
    }
}

/// A client bound to one credential (or none).
pub struct InMemoryClient {
    store: Arc<Store>,
    credential: Option<BearerToken>,
}

impl InMemoryClient {
    fn resolve(&self, token: &BearerToken) -> ProviderResult<Principal> {
        let users = self.store.users.read().unwrap();
        users
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| ProviderError::Rejected {
                status: 401,
                message: "invalid JWT: unable to parse or verify signature".to_string(),
            })
    }

    fn session_for(&self, token: &str, user: Principal) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: Some(format!("refresh-{}", token)),
            expires_in: Some(3600),
            token_type: "bearer".to_string(),
            user,
        }
    }
}

#[async_trait]
impl ProviderClient for InMemoryClient {
    async fn get_user(&self) -> ProviderResult<Principal> {
        match &self.credential {
            Some(token) => self.resolve(token),
            None => Err(ProviderError::MissingSession),
        }
    }

    async fn select(&self, query: &TableQuery) -> ProviderResult<Vec<Value>> {
        self.store.count_data_call();
        let tables = self.store.tables.read().unwrap();
        let mut rows: Vec<Value> = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> ProviderResult<Value> {
        self.store.count_data_call();
        let mut row = match row {
            Value::Object(map) => map,
            other => {
                return Err(ProviderError::Rejected {
                    status: 400,
                    message: format!("expected an object row, got {}", other),
                });
            }
        };

        let stamp = stamp_string(self.store.next_stamp());
        fill_default(&mut row, "id", || Value::String(uuid::Uuid::new_v4().to_string()));
        fill_default(&mut row, "created_at", || Value::String(stamp.clone()));
        fill_default(&mut row, "updated_at", || Value::String(stamp.clone()));

        let row = Value::Object(row);
        let mut tables = self.store.tables.write().unwrap();
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, query: &TableQuery, patch: Value) -> ProviderResult<Vec<Value>> {
        self.store.count_data_call();
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(ProviderError::Rejected {
                    status: 400,
                    message: format!("expected an object patch, got {}", other),
                });
            }
        };

        let mut tables = self.store.tables.write().unwrap();
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &TableQuery) -> ProviderResult<Vec<Value>> {
        self.store.count_data_call();
        let mut tables = self.store.tables.write().unwrap();
        let mut removed = Vec::new();
        if let Some(rows) = tables.get_mut(&query.table) {
            let (gone, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|r| query.matches(r));
            *rows = kept;
            removed = gone;
        }
        Ok(removed)
    }
}

#[async_trait(?Send)]
impl AuthClient for InMemoryClient {
    async fn get_session(&self) -> ProviderResult<Option<Session>> {
        let Some(token) = &self.credential else {
            return Ok(None);
        };
        let user = self.resolve(token)?;
        Ok(Some(self.session_for(token.as_str(), user)))
    }

    async fn exchange_code_for_session(&self, code: &str) -> ProviderResult<Option<Session>> {
        let token = {
            let mut codes = self.store.codes.write().unwrap();
            codes.remove(code)
        };
        let token = token.ok_or_else(|| ProviderError::Rejected {
            status: 400,
            message: "invalid flow state, no valid flow state found".to_string(),
        })?;
        let user = self.resolve(&BearerToken::new(token.clone()))?;
        Ok(Some(self.session_for(&token, user)))
    }
}

fn fill_default(row: &mut Map<String, Value>, key: &str, value: impl FnOnce() -> Value) {
    if !matches!(row.get(key), Some(v) if !v.is_null()) {
        row.insert(key.to_string(), value());
    }
}

fn stamp_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Order two column values: timestamps chronologically, numbers numerically,
/// everything else by string form. Missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider_with_user() -> InMemoryProvider {
        let provider = InMemoryProvider::new();
        provider.add_user("token-a", Principal::new("user-a", "a@example.com"));
        provider
    }

    #[tokio::test]
    async fn test_get_user_resolves_token() {
        let provider = provider_with_user();

        let client = provider.client(Some(BearerToken::new("token-a")));
        assert_eq!(client.get_user().await.unwrap().id, "user-a");

        let client = provider.client(Some(BearerToken::new("forged")));
        assert!(matches!(
            client.get_user().await,
            Err(ProviderError::Rejected { status: 401, .. })
        ));

        let client = provider.client(None);
        assert!(matches!(
            client.get_user().await,
            Err(ProviderError::MissingSession)
        ));
        assert_eq!(provider.data_calls(), 0);
    }

    #[tokio::test]
    async fn test_insert_fills_defaults_with_increasing_stamps() {
        let provider = provider_with_user();
        let client = provider.client(None);

        let first = client.insert("notes", json!({"title": "one"})).await.unwrap();
        let second = client.insert("notes", json!({"title": "two"})).await.unwrap();

        assert!(first["id"].is_string());
        assert_ne!(first["id"], second["id"]);
        let t1 = DateTime::parse_from_rfc3339(first["created_at"].as_str().unwrap()).unwrap();
        let t2 = DateTime::parse_from_rfc3339(second["created_at"].as_str().unwrap()).unwrap();
        assert!(t2 > t1);
    }

    #[tokio::test]
    async fn test_select_filters_and_orders() {
        let provider = InMemoryProvider::new();
        let client = provider.client(None);
        client.insert("notes", json!({"title": "a", "user_id": "u1"})).await.unwrap();
        client.insert("notes", json!({"title": "b", "user_id": "u2"})).await.unwrap();
        client.insert("notes", json!({"title": "c", "user_id": "u1"})).await.unwrap();

        let query = TableQuery::table("notes")
            .eq("user_id", "u1")
            .order("created_at", false);
        let rows = client.select(&query).await.unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["c", "a"]);
        assert_eq!(provider.data_calls(), 4);
    }

    #[tokio::test]
    async fn test_update_and_delete_return_affected_rows() {
        let provider = InMemoryProvider::new();
        let client = provider.client(None);
        let row = client.insert("notes", json!({"title": "a", "user_id": "u1"})).await.unwrap();
        let id = row["id"].as_str().unwrap().to_string();

        let query = TableQuery::table("notes").eq("id", id.as_str());
        let updated = client.update(&query, json!({"title": "b"})).await.unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["title"], "b");
        assert_eq!(updated[0]["user_id"], "u1");

        let missing = TableQuery::table("notes").eq("id", "nope");
        assert!(client.update(&missing, json!({"title": "c"})).await.unwrap().is_empty());
        assert!(client.delete(&missing).await.unwrap().is_empty());

        assert_eq!(client.delete(&query).await.unwrap().len(), 1);
        assert!(provider.rows("notes").is_empty());
    }

    #[tokio::test]
    async fn test_auth_code_exchanges_once() {
        let provider = provider_with_user();
        provider.add_auth_code("code-1", "token-a");
        let client = provider.client(None);

        let session = client.exchange_code_for_session("code-1").await.unwrap().unwrap();
        assert_eq!(session.user.id, "user-a");
        assert_eq!(session.access_token, "token-a");

        assert!(client.exchange_code_for_session("code-1").await.is_err());
    }

    #[tokio::test]
    async fn test_get_session_requires_credential() {
        let provider = provider_with_user();

        assert!(provider.client(None).get_session().await.unwrap().is_none());

        let session = provider
            .client(Some(BearerToken::new("token-a")))
            .get_session()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.user.email, "a@example.com");
    }
}
