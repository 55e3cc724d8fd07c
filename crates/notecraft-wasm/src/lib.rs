//! WASM bindings for the NoteCraft OAuth callback reconciler.
//!
//! On page load the reconciler inspects `window.location` for provider
//! callback markers, waits for the page's `window.supabase` client, completes
//! the session, strips the credentials from the address bar, and announces the
//! outcome as a DOM event:
//!
//! ```text
//! window.addEventListener('oauth-success', (e) => e.detail.user)
//! window.addEventListener('oauth-error',   (e) => e.detail.error)
//! ```
//!
//! **Note**: This crate only compiles for `wasm32` targets. When building for native
//! targets (e.g., during `cargo check --workspace`), this crate provides no exports.

#[cfg(target_arch = "wasm32")]
mod browser;

#[cfg(target_arch = "wasm32")]
pub use browser::{DomEvents, GlooTimer, JsAuthClient, WindowLocation, WindowSource};

#[cfg(target_arch = "wasm32")]
mod wasm_impl {
    use std::cell::Cell;

    use notecraft_core::{CallbackReconciler, Environment};
    use tracing_subscriber::layer::SubscriberExt;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;

    use crate::browser::{DomEvents, GlooTimer, WindowLocation, WindowSource};

    thread_local! {
        /// Set while a reconciliation is in flight; at most one runs per page.
        static RUNNING: Cell<bool> = const { Cell::new(false) };
    }

    /// Initialize the WASM module (panic hook and console logging).
    #[wasm_bindgen]
    pub fn init() {
        console_error_panic_hook::set_once();

        let console_layer = tracing_wasm::WASMLayer::new(
            tracing_wasm::WASMLayerConfigBuilder::new()
                .set_max_level(tracing::Level::INFO)
                .build(),
        );
        let subscriber = tracing_subscriber::registry().with(console_layer);
        tracing::subscriber::set_global_default(subscriber).ok();

        tracing::debug!("notecraft-wasm initialized");
    }

    /// Run callback handling once the page has finished loading.
    #[wasm_bindgen]
    pub fn install() -> Result<(), JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;

        let loaded = window
            .document()
            .map(|doc| doc.ready_state() == "complete")
            .unwrap_or(false);
        if loaded {
            spawn_local(run_detached());
            return Ok(());
        }

        let on_load = Closure::once_into_js(move || spawn_local(run_detached()));
        window.add_event_listener_with_callback("load", on_load.unchecked_ref())
    }

    async fn run_detached() {
        handle_oauth_callback().await;
    }

    /// Handle an OAuth callback in the current URL, if there is one.
    ///
    /// Resolves to `true` only when a session was established. A call made
    /// while another is still running resolves to `false` without acting.
    #[wasm_bindgen(js_name = handleOAuthCallback)]
    pub async fn handle_oauth_callback() -> bool {
        if RUNNING.with(|running| running.replace(true)) {
            tracing::debug!("OAuth callback handling already in progress");
            return false;
        }

        let mut reconciler =
            CallbackReconciler::new(WindowSource, WindowLocation, GlooTimer, DomEvents);
        let outcome = reconciler.run().await;

        RUNNING.with(|running| running.set(false));
        outcome.is_established()
    }

    /// API base URL and OAuth redirect for the page's origin.
    #[wasm_bindgen(js_name = resolveEnvironment)]
    pub fn resolve_environment() -> Result<JsValue, JsError> {
        let endpoints = current_environment()?.resolve();
        serde_wasm_bindgen::to_value(&endpoints).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Options to pass to `supabase.auth.signInWithOAuth`.
    #[wasm_bindgen(js_name = oauthOptions)]
    pub fn oauth_options() -> Result<JsValue, JsError> {
        let options = current_environment()?.resolve().oauth_options();
        serde_wasm_bindgen::to_value(&options).map_err(|e| JsError::new(&e.to_string()))
    }

    fn current_environment() -> Result<Environment, JsError> {
        let href = web_sys::window()
            .ok_or_else(|| JsError::new("No window"))?
            .location()
            .href()
            .map_err(|_| JsError::new("Location unavailable"))?;
        let url = url::Url::parse(&href).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Environment::from_url(&url))
    }

    /// Get version string
    #[wasm_bindgen]
    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}
