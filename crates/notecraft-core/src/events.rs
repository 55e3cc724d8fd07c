//! Outcome notifications for OAuth callback reconciliation.
//!
//! The reconciler reports exactly one `AuthEvent` per detected callback to an
//! `AuthNotifier`. The browser build forwards it as a DOM event; `EventLog`
//! keeps events in memory for inspection.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::principal::Principal;

/// Outcome notifications broadcast once reconciliation reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AuthEvent {
    /// A session was established for `user`.
    OauthSuccess {
        user: Principal,
        /// Milliseconds since Unix epoch.
        timestamp: f64,
    },
    /// Reconciliation failed; the page keeps running.
    OauthError {
        error: String,
        /// Milliseconds since Unix epoch.
        timestamp: f64,
    },
}

impl AuthEvent {
    pub fn success(user: Principal) -> Self {
        AuthEvent::OauthSuccess {
            user,
            timestamp: now_millis(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        AuthEvent::OauthError {
            error: error.into(),
            timestamp: now_millis(),
        }
    }

    /// DOM event name observers listen for.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::OauthSuccess { .. } => "oauth-success",
            AuthEvent::OauthError { .. } => "oauth-error",
        }
    }
}

fn now_millis() -> f64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

/// Receives the terminal outcome of a reconciliation.
pub trait AuthNotifier {
    fn notify(&self, event: &AuthEvent);
}

impl<N: AuthNotifier + ?Sized> AuthNotifier for &N {
    fn notify(&self, event: &AuthEvent) {
        (**self).notify(event);
    }
}

/// Notifier that records every event. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<AuthEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far, oldest first.
    pub fn events(&self) -> Vec<AuthEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl AuthNotifier for EventLog {
    fn notify(&self, event: &AuthEvent) {
        tracing::debug!(event = event.name(), "Auth event recorded");
        self.events.borrow_mut().push(event.clone());
    }
}
