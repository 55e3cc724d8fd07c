//! notecraft-core: Shared Rust library for the NoteCraft notes service.
//!
//! This crate provides:
//! - The principal, session and note data model
//! - Provider client traits for the external identity/storage service
//! - An ownership-scoped notes service
//! - Environment resolution and OAuth callback reconciliation for the browser

pub mod callback;
pub mod environment;
pub mod events;
pub mod memory;
pub mod notes;
pub mod principal;
pub mod provider;
pub mod reconciler;
pub mod retry;

pub use callback::{CallbackState, FragmentTokens};
pub use environment::{Endpoints, Environment, OAuthOptions, OAuthQueryParams};
pub use events::{AuthEvent, AuthNotifier, EventLog};
pub use memory::{InMemoryClient, InMemoryProvider};
pub use notes::{Note, NoteInput, NotesError, NotesService};
pub use principal::{BearerToken, Principal, Session};
pub use provider::{
    AuthClient, ClientFactory, ProviderClient, ProviderError, ProviderResult, TableQuery,
};
pub use reconciler::{
    CallbackReconciler, PageLocation, ReconcileError, ReconcileOutcome, ReconcileState,
};
pub use retry::{RetryExhausted, RetryPolicy, Timer};
