//! Browser adapters for the callback reconciler.
//!
//! Each adapter wraps one piece of the page:
//! - `JsAuthClient`: the page's `window.supabase.auth` object
//! - `WindowSource`: polls `window.supabase` until the page has created it
//! - `WindowLocation`: reads `location.href`, rewrites it via `history.replaceState`
//! - `GlooTimer`: `setTimeout`-backed sleeps
//! - `DomEvents`: re-publishes outcomes as `CustomEvent`s on `window`

use std::time::Duration;

use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect};
use notecraft_core::reconciler::ClientSource;
use notecraft_core::{
    AuthClient, AuthEvent, AuthNotifier, PageLocation, ProviderError, ProviderResult, Session, Timer,
};
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// The page's JS auth client.
pub struct JsAuthClient {
    auth: JsValue,
}

impl JsAuthClient {
    /// Look up `window.supabase.auth`; `None` until the page has set it up.
    pub fn from_window(window: &web_sys::Window) -> Option<Self> {
        let client = Reflect::get(window, &"supabase".into()).ok()?;
        if !client.is_object() {
            return None;
        }
        let auth = Reflect::get(&client, &"auth".into()).ok()?;
        if !auth.is_object() {
            return None;
        }
        Some(Self { auth })
    }

    /// Call `auth[method](...args)` and read the session out of its result.
    async fn call(&self, method: &str, args: &[JsValue]) -> ProviderResult<Option<Session>> {
        let func = Reflect::get(&self.auth, &method.into())
            .map_err(js_err_to_provider_err)?
            .dyn_into::<Function>()
            .map_err(|_| ProviderError::Malformed(format!("auth.{} is not a function", method)))?;

        let js_args = Array::new();
        for arg in args {
            js_args.push(arg);
        }

        let promise = func.apply(&self.auth, &js_args).map_err(js_err_to_provider_err)?;
        let result = JsFuture::from(Promise::from(promise))
            .await
            .map_err(js_err_to_provider_err)?;

        session_from_result(&result)
    }
}

#[async_trait(?Send)]
impl AuthClient for JsAuthClient {
    async fn get_session(&self) -> ProviderResult<Option<Session>> {
        self.call("getSession", &[]).await
    }

    async fn exchange_code_for_session(&self, code: &str) -> ProviderResult<Option<Session>> {
        self.call("exchangeCodeForSession", &[code.into()]).await
    }
}

/// Interpret a `{ data: { session }, error }` auth result.
fn session_from_result(result: &JsValue) -> ProviderResult<Option<Session>> {
    let error = Reflect::get(result, &"error".into()).unwrap_or(JsValue::NULL);
    if !error.is_null() && !error.is_undefined() {
        let status = Reflect::get(&error, &"status".into())
            .ok()
            .and_then(|v| v.as_f64())
            .map(|s| s as u16)
            .unwrap_or(400);
        return Err(ProviderError::Rejected {
            status,
            message: js_message(&error),
        });
    }

    let session = Reflect::get(result, &"data".into())
        .and_then(|data| Reflect::get(&data, &"session".into()))
        .unwrap_or(JsValue::NULL);
    if session.is_null() || session.is_undefined() {
        return Ok(None);
    }

    serde_wasm_bindgen::from_value(session)
        .map(Some)
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

fn js_message(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            Reflect::get(err, &"message".into())
                .ok()
                .and_then(|v| v.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err))
}

/// Convert a thrown JS value into a provider error.
fn js_err_to_provider_err(err: JsValue) -> ProviderError {
    ProviderError::Transport(js_message(&err))
}

pub struct WindowSource;

impl ClientSource for WindowSource {
    type Client = JsAuthClient;

    fn try_client(&self) -> Option<JsAuthClient> {
        web_sys::window().and_then(|window| JsAuthClient::from_window(&window))
    }
}

pub struct WindowLocation;

impl PageLocation for WindowLocation {
    fn current_url(&self) -> Option<Url> {
        let href = web_sys::window()?.location().href().ok()?;
        Url::parse(&href).ok()
    }

    fn replace_path(&self, path: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let title = window.document().map(|doc| doc.title()).unwrap_or_default();
        let replaced = window
            .history()
            .and_then(|history| history.replace_state_with_url(&JsValue::NULL, &title, Some(path)));
        if let Err(e) = replaced {
            tracing::warn!("Failed to clean callback URL: {}", js_message(&e));
        }
    }
}

pub struct GlooTimer;

#[async_trait(?Send)]
impl Timer for GlooTimer {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}

pub struct DomEvents;

impl AuthNotifier for DomEvents {
    fn notify(&self, event: &AuthEvent) {
        dispatch_dom_event(event);
    }
}

fn dispatch_dom_event(event: &AuthEvent) {
    let Some(window) = web_sys::window() else {
        return;
    };

    let detail = match serde_wasm_bindgen::to_value(event) {
        Ok(detail) => detail,
        Err(e) => {
            tracing::error!("Failed to serialize {} detail: {}", event.name(), e);
            return;
        }
    };

    let init = web_sys::CustomEventInit::new();
    init.set_detail(&detail);
    let dispatched = web_sys::CustomEvent::new_with_event_init_dict(event.name(), &init)
        .and_then(|dom_event| window.dispatch_event(&dom_event));
    if let Err(e) = dispatched {
        tracing::error!("Failed to dispatch {}: {}", event.name(), js_message(&e));
    }
}
