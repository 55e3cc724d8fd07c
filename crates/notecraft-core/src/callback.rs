//! Detection of an in-progress OAuth redirect in the page URL.

use std::fmt;

use url::Url;

/// Tokens carried in the URL fragment by the implicit flow.
#[derive(Clone, PartialEq, Eq)]
pub struct FragmentTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
}

impl fmt::Debug for FragmentTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentTokens")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Callback artifacts found in the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackState {
    /// `#access_token=...&refresh_token=...`
    Fragment(FragmentTokens),
    /// `?code=...` from the authorization code flow.
    Code(String),
}

impl CallbackState {
    /// Inspect a URL for callback markers.
    ///
    /// The redirect flow only ever produces one of the two. Should both appear,
    /// the fragment wins.
    pub fn detect(url: &Url) -> Option<Self> {
        if let Some(tokens) = url.fragment().and_then(parse_fragment) {
            return Some(CallbackState::Fragment(tokens));
        }
        url.query_pairs()
            .find(|(key, value)| key == "code" && !value.is_empty())
            .map(|(_, code)| CallbackState::Code(code.into_owned()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CallbackState::Fragment(_) => "fragment",
            CallbackState::Code(_) => "code",
        }
    }
}

fn parse_fragment(fragment: &str) -> Option<FragmentTokens> {
    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = None;
    let mut token_type = None;

    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" if !value.is_empty() => access_token = Some(value.into_owned()),
            "refresh_token" => refresh_token = Some(value.into_owned()),
            "expires_in" => expires_in = value.parse().ok(),
            "token_type" => token_type = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(FragmentTokens {
        access_token: access_token?,
        refresh_token,
        expires_in,
        token_type,
    })
}

/// The URL with every callback artifact removed: path only.
pub fn clean_path(url: &Url) -> String {
    url.path().to_string()
}
