use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{App, Function, ListQuery, Page, Tagged, Trigger};

/// Request body for a function invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeRequest {
    pub body: Vec<u8>,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
}

/// Raw invocation result; error statuses are data here, not errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeResponse {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Vec<u8>,
}

impl InvokeResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header("fn-call-id")
    }

    /// The `message` of a JSON error payload on a 4xx/5xx response.
    pub fn error_message(&self) -> Option<String> {
        if self.status < 400 {
            return None;
        }
        let v: serde_json::Value = match serde_json::from_slice(&self.body) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "error response is not JSON");
                return None;
            }
        };
        v.get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
    }
}

/// The remote functions API.
///
/// Production code uses [`crate::HttpApi`]; tests use mockall mocks.
#[async_trait]
pub trait FnApi: Send + Sync {
    // ── Apps ──
    async fn list_apps(&self, query: ListQuery) -> Result<Page<App>>;
    async fn get_app(&self, id: &str) -> Result<App>;
    async fn create_app(&self, app: &App) -> Result<App>;
    async fn update_app(&self, id: &str, app: &App) -> Result<App>;
    async fn delete_app(&self, id: &str) -> Result<()>;

    // ── Functions ──
    async fn list_fns(&self, query: ListQuery) -> Result<Page<Function>>;
    async fn get_fn(&self, id: &str) -> Result<Tagged<Function>>;
    async fn create_fn(&self, f: &Function) -> Result<Function>;
    /// Replace a function. With `if_match`, a stale ETag fails with
    /// [`crate::Error::EtagMismatch`].
    async fn update_fn(&self, id: &str, f: &Function, if_match: Option<String>)
    -> Result<Function>;
    async fn delete_fn(&self, id: &str) -> Result<()>;

    // ── Triggers ──
    async fn list_triggers(&self, query: ListQuery) -> Result<Page<Trigger>>;
    async fn get_trigger(&self, id: &str) -> Result<Trigger>;
    async fn create_trigger(&self, t: &Trigger) -> Result<Trigger>;
    async fn update_trigger(&self, id: &str, t: &Trigger) -> Result<Trigger>;
    async fn delete_trigger(&self, id: &str) -> Result<()>;

    // ── Other ──
    async fn invoke(&self, url: &str, req: &InvokeRequest) -> Result<InvokeResponse>;
    async fn server_version(&self) -> Result<String>;
}
