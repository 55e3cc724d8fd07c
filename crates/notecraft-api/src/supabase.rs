//! HTTP client for a Supabase project.
//!
//! Identity goes through GoTrue (`/auth/v1/user`); rows go through PostgREST
//! (`/rest/v1/{table}`). Each client carries the caller's bearer credential so
//! the project's row-level policies see the real user.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use notecraft_core::{
    BearerToken, ClientFactory, Principal, ProviderClient, ProviderError, ProviderResult,
    TableQuery,
};
use reqwest::{header::AUTHORIZATION, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ProviderSettings;

/// Builds one `SupabaseClient` per request, sharing a connection pool.
pub struct SupabaseFactory {
    http: reqwest::Client,
    settings: Arc<ProviderSettings>,
}

impl SupabaseFactory {
    pub fn new(settings: ProviderSettings, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build provider HTTP client")?;

        Ok(Self {
            http,
            settings: Arc::new(settings),
        })
    }

    pub fn client(&self, credential: Option<BearerToken>) -> SupabaseClient {
        SupabaseClient {
            http: self.http.clone(),
            settings: self.settings.clone(),
            credential,
        }
    }
}

impl ClientFactory for SupabaseFactory {
    fn scoped(&self, credential: Option<BearerToken>) -> Arc<dyn ProviderClient> {
        Arc::new(self.client(credential))
    }
}

pub struct SupabaseClient {
    http: reqwest::Client,
    settings: Arc<ProviderSettings>,
    credential: Option<BearerToken>,
}

impl SupabaseClient {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.url.as_str().trim_end_matches('/'), path)
    }

    /// Attach the project key, and the caller's credential when there is one.
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = match &self.credential {
            Some(token) => token.header_value(),
            None => format!("Bearer {}", self.settings.anon_key),
        };
        builder
            .header("apikey", self.settings.anon_key.as_str())
            .header(AUTHORIZATION, bearer)
    }

    fn table_request(&self, method: Method, query: &TableQuery) -> RequestBuilder {
        let mut params: Vec<(String, String)> = query
            .filters
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{}", value)))
            .collect();
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }

        let url = self.endpoint(&format!("rest/v1/{}", query.table));
        self.authorized(self.http.request(method, url)).query(&params)
    }
}

#[async_trait]
impl ProviderClient for SupabaseClient {
    async fn get_user(&self) -> ProviderResult<Principal> {
        if self.credential.is_none() {
            return Err(ProviderError::MissingSession);
        }
        send_json(self.authorized(self.http.get(self.endpoint("auth/v1/user")))).await
    }

    async fn select(&self, query: &TableQuery) -> ProviderResult<Vec<Value>> {
        send_json(self.table_request(Method::GET, query).query(&[("select", "*")])).await
    }

    async fn insert(&self, table: &str, row: Value) -> ProviderResult<Value> {
        let request = self
            .table_request(Method::POST, &TableQuery::table(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let rows: Vec<Value> = send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("insert returned no rows".to_string()))
    }

    async fn update(&self, query: &TableQuery, patch: Value) -> ProviderResult<Vec<Value>> {
        let request = self
            .table_request(Method::PATCH, query)
            .header("Prefer", "return=representation")
            .json(&patch);
        send_json(request).await
    }

    async fn delete(&self, query: &TableQuery) -> ProviderResult<Vec<Value>> {
        let request = self
            .table_request(Method::DELETE, query)
            .header("Prefer", "return=representation");
        send_json(request).await
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ProviderResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Rejected {
            status: status.as_u16(),
            message: error_message(&body, status),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Pull a human-readable message out of a GoTrue or PostgREST error body.
fn error_message(body: &str, status: StatusCode) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
    });

    from_json.unwrap_or_else(|| {
        let body = body.trim();
        if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Provider request failed")
                .to_string()
        } else {
            body.to_string()
        }
    })
}
