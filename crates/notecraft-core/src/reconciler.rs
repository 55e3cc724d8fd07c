//! OAuth callback reconciliation.
//!
//! Carries a browser from the provider's redirect back into a working session:
//!
//! ```text
//! Idle ─markers─> DetectedCallback ─> WaitingForProviderClient ─> ExchangingCredentials
//!                                              │                        │        │
//!                                              └──(budget exhausted)──> Failed   SessionEstablished
//!                                                                          │        │
//!                                                                          └──> UrlCleaned <┘
//! ```
//!
//! Without callback markers in the URL the reconciler stays `Idle` and does
//! nothing, so running it again after a completed callback is a no-op. Once a
//! callback was detected the URL is cleaned on every terminal outcome, success
//! or failure, so tokens never linger in history. The outcome goes to the
//! `AuthNotifier` after cleanup.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::callback::{clean_path, CallbackState};
use crate::events::{AuthEvent, AuthNotifier};
use crate::principal::{Principal, Session};
use crate::provider::{AuthClient, ProviderError};
use crate::retry::{poll_until, RetryPolicy, Timer};

/// Delay granted to the provider client to consume a token fragment itself.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Supplies the provider client once its library has loaded.
pub trait ClientSource {
    type Client: AuthClient;

    fn try_client(&self) -> Option<Self::Client>;
}

/// The page's address bar.
pub trait PageLocation {
    fn current_url(&self) -> Option<Url>;

    /// Replace the current history entry with `path`, without reloading.
    fn replace_path(&self, path: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    DetectedCallback,
    WaitingForProviderClient,
    ExchangingCredentials,
    SessionEstablished,
    Failed,
    UrlCleaned,
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Supabase client not available after {attempts} attempts")]
    ClientUnavailable { attempts: u32 },

    #[error("Session error: {0}")]
    Session(ProviderError),

    #[error("Code exchange error: {0}")]
    Exchange(ProviderError),

    #[error("No session established from {0} callback")]
    NoSession(&'static str),
}

#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// No callback markers; nothing happened.
    Idle,
    Established(Principal),
    Failed(ReconcileError),
}

impl ReconcileOutcome {
    pub fn is_established(&self) -> bool {
        matches!(self, ReconcileOutcome::Established(_))
    }
}

pub struct CallbackReconciler<S, L, T, N> {
    source: S,
    location: L,
    timer: T,
    notifier: N,
    policy: RetryPolicy,
    settle_delay: Duration,
    state: ReconcileState,
    transitions: Vec<ReconcileState>,
}

impl<S, L, T, N> CallbackReconciler<S, L, T, N>
where
    S: ClientSource,
    L: PageLocation,
    T: Timer,
    N: AuthNotifier,
{
    pub fn new(source: S, location: L, timer: T, notifier: N) -> Self {
        Self {
            source,
            location,
            timer,
            notifier,
            policy: RetryPolicy::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            state: ReconcileState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    /// States entered during the most recent callback run.
    pub fn transitions(&self) -> &[ReconcileState] {
        &self.transitions
    }

    fn enter(&mut self, state: ReconcileState) {
        tracing::debug!(from = ?self.state, to = ?state, "Reconciler transition");
        self.state = state;
        self.transitions.push(state);
    }

    /// Reconcile the current URL. `&mut self` keeps one run per instance at a time.
    pub async fn run(&mut self) -> ReconcileOutcome {
        let Some(url) = self.location.current_url() else {
            return ReconcileOutcome::Idle;
        };
        let Some(callback) = CallbackState::detect(&url) else {
            return ReconcileOutcome::Idle;
        };

        tracing::info!(kind = callback.kind(), "OAuth callback detected");
        self.transitions.clear();
        self.enter(ReconcileState::DetectedCallback);

        let outcome = match self.resolve(&callback).await {
            Ok(session) => {
                self.enter(ReconcileState::SessionEstablished);
                tracing::info!(email = %session.user.email, "OAuth session established");
                ReconcileOutcome::Established(session.user)
            }
            Err(e) => {
                self.enter(ReconcileState::Failed);
                tracing::error!(error = %e, "OAuth callback handling failed");
                ReconcileOutcome::Failed(e)
            }
        };

        self.location.replace_path(&clean_path(&url));
        self.enter(ReconcileState::UrlCleaned);

        match &outcome {
            ReconcileOutcome::Established(user) => self.notifier.notify(&AuthEvent::success(user.clone())),
            ReconcileOutcome::Failed(e) => self.notifier.notify(&AuthEvent::error(e.to_string())),
            ReconcileOutcome::Idle => {}
        }
        outcome
    }

    async fn resolve(&mut self, callback: &CallbackState) -> Result<Session, ReconcileError> {
        self.enter(ReconcileState::WaitingForProviderClient);
        let source = &self.source;
        let client = poll_until(&self.policy, &self.timer, || source.try_client())
            .await
            .map_err(|e| ReconcileError::ClientUnavailable { attempts: e.attempts })?;

        self.enter(ReconcileState::ExchangingCredentials);
        let session = match callback {
            CallbackState::Fragment(_) => {
                self.timer.sleep(self.settle_delay).await;
                client.get_session().await.map_err(ReconcileError::Session)?
            }
            CallbackState::Code(code) => client
                .exchange_code_for_session(code)
                .await
                .map_err(ReconcileError::Exchange)?,
        };

        session.ok_or(ReconcileError::NoSession(callback.kind()))
    }
}
