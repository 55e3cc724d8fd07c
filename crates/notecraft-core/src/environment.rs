//! Environment resolution for the browser client.
//!
//! A pure function of `(hostname, origin)`: local development hosts talk to a
//! fixed local API, every other host uses its own origin for both the API and
//! the OAuth redirect target. Build once per page load and pass it around.

use serde::Serialize;
use url::Url;

/// API origin used when the page is served from a local development host.
pub const LOCAL_API_ORIGIN: &str = "http://localhost:3000";

const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Where the page is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub hostname: String,
    pub origin: String,
}

/// Endpoints derived from an `Environment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub api_base_url: String,
    pub redirect_url: String,
}

/// Options passed to the provider when starting an OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthOptions {
    pub redirect_to: String,
    pub query_params: OAuthQueryParams,
}

/// Extra authorize parameters forwarded to the upstream identity provider.
///
/// Keys keep the provider's snake_case spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthQueryParams {
    pub access_type: String,
    pub prompt: String,
}

impl Default for OAuthQueryParams {
    /// Ask for a refresh token and always show the consent screen.
    fn default() -> Self {
        Self {
            access_type: "offline".to_string(),
            prompt: "consent".to_string(),
        }
    }
}

impl Environment {
    pub fn new(hostname: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    /// Derive hostname and origin from the page URL.
    pub fn from_url(url: &Url) -> Self {
        Self::new(
            url.host_str().unwrap_or_default(),
            url.origin().ascii_serialization(),
        )
    }

    pub fn is_local(&self) -> bool {
        LOCAL_HOSTS.contains(&self.hostname.as_str())
    }

    pub fn is_production(&self) -> bool {
        !self.is_local()
    }

    pub fn resolve(&self) -> Endpoints {
        let api_base_url = if self.is_local() {
            LOCAL_API_ORIGIN.to_string()
        } else {
            self.origin.clone()
        };
        let endpoints = Endpoints {
            api_base_url,
            redirect_url: self.origin.clone(),
        };
        if self.is_local() {
            tracing::debug!(hostname = %self.hostname, api = %endpoints.api_base_url, "Resolved local environment");
        }
        endpoints
    }
}

impl Endpoints {
    /// Full URL for an API endpoint, with or without a leading slash.
    pub fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}",
            self.api_base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn oauth_options(&self) -> OAuthOptions {
        OAuthOptions {
            redirect_to: self.redirect_url.clone(),
            query_params: OAuthQueryParams::default(),
        }
    }
}

impl OAuthOptions {
    /// The provider's authorize URL for a federated sign-in (e.g. `google`).
    pub fn authorize_url(&self, provider_url: &str, provider: &str) -> Result<Url, url::ParseError> {
        let base = Url::parse(provider_url)?;
        let mut url = base.join("/auth/v1/authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", provider);
            query.append_pair("redirect_to", &self.redirect_to);
            query.append_pair("access_type", &self.query_params.access_type);
            query.append_pair("prompt", &self.query_params.prompt);
        }
        Ok(url)
    }
}
