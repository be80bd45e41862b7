use std::collections::BTreeMap;

use serde_json::Value;

use crate::api::{FnApi, InvokeRequest, InvokeResponse};
use crate::error::{Error, Result};
use crate::http::HttpApi;
use crate::models::{App, Function, ListQuery, Page, Trigger};

/// Page size requested from list endpoints.
pub const PER_PAGE: u32 = 100;

/// Update attempts made against a function before giving up on ETag races.
pub const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// Whether an upsert created the object or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// Desired state for a function. `None` fields keep their remote value.
///
/// In `config`, an empty value deletes the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FnChange {
    pub image: Option<String>,
    pub memory: Option<u64>,
    pub timeout: Option<i32>,
    pub idle_timeout: Option<i32>,
    pub config: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, Value>,
}

/// Optional fields applied when an app is created or patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppChange {
    pub config: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, Value>,
    pub syslog_url: Option<String>,
}

/// Everything that hangs off an app, for recursive deletion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppContents {
    pub app: App,
    pub fns: Vec<Function>,
    pub triggers: Vec<Trigger>,
}

/// Functions-API operations client, parameterized over the API for
/// testability.
pub struct FnClient<A: FnApi = HttpApi> {
    api: A,
}

impl<A: FnApi> FnClient<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    // ── Listing ──

    /// Follow cursors until the server runs out or `limit` items are held.
    async fn collect<T, F, Fut>(&self, limit: Option<usize>, mut fetch: F) -> Result<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: std::future::Future<Output = Result<Page<T>>>,
    {
        let mut out = Vec::new();
        let mut cursor = None;
        loop {
            let page = fetch(cursor.take()).await?;
            out.extend(page.items);
            if let Some(n) = limit {
                if out.len() >= n {
                    out.truncate(n);
                    break;
                }
            }
            if page.next_cursor.is_empty() {
                break;
            }
            cursor = Some(page.next_cursor);
        }
        Ok(out)
    }

    pub async fn list_apps(&self, limit: Option<usize>) -> Result<Vec<App>> {
        self.collect(limit, |cursor| {
            self.api.list_apps(ListQuery {
                cursor,
                per_page: PER_PAGE,
                ..Default::default()
            })
        })
        .await
    }

    pub async fn list_fns(&self, app_id: &str, limit: Option<usize>) -> Result<Vec<Function>> {
        self.collect(limit, |cursor| {
            self.api.list_fns(ListQuery {
                app_id: Some(app_id.to_owned()),
                cursor,
                per_page: PER_PAGE,
                ..Default::default()
            })
        })
        .await
    }

    /// Triggers of an app, optionally narrowed to one function.
    pub async fn list_triggers(
        &self,
        app_id: &str,
        fn_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Trigger>> {
        self.collect(limit, |cursor| {
            self.api.list_triggers(ListQuery {
                app_id: Some(app_id.to_owned()),
                fn_id: fn_id.map(str::to_owned),
                cursor,
                per_page: PER_PAGE,
                ..Default::default()
            })
        })
        .await
    }

    // ── Lookup ──

    pub async fn app_by_name(&self, name: &str) -> Result<App> {
        let page = self
            .api
            .list_apps(ListQuery {
                name: Some(name.to_owned()),
                ..Default::default()
            })
            .await?;
        page.items
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AppNotFound {
                name: name.to_owned(),
            })
    }

    pub async fn fn_by_name(&self, app_id: &str, name: &str) -> Result<Function> {
        let page = self
            .api
            .list_fns(ListQuery {
                app_id: Some(app_id.to_owned()),
                name: Some(name.to_owned()),
                ..Default::default()
            })
            .await?;
        page.items
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::FnNotFound {
                name: name.to_owned(),
            })
    }

    pub async fn trigger_by_name(&self, app_id: &str, fn_id: &str, name: &str) -> Result<Trigger> {
        let page = self
            .api
            .list_triggers(ListQuery {
                app_id: Some(app_id.to_owned()),
                fn_id: Some(fn_id.to_owned()),
                name: Some(name.to_owned()),
                ..Default::default()
            })
            .await?;
        page.items
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::TriggerNotFound {
                name: name.to_owned(),
            })
    }

    /// Resolve `app` then `name` within it.
    pub async fn app_fn(&self, app: &str, name: &str) -> Result<(App, Function)> {
        let app = self.app_by_name(app).await?;
        let f = self.fn_by_name(&app.id, name).await?;
        Ok((app, f))
    }

    // ── Apps ──

    pub async fn create_app(&self, name: &str, change: &AppChange) -> Result<App> {
        let app = App {
            name: name.to_owned(),
            config: change.config.clone(),
            annotations: change.annotations.clone(),
            syslog_url: change.syslog_url.clone(),
            ..Default::default()
        };
        self.api.create_app(&app).await
    }

    /// Merge `change` into the named app. Config and annotation maps are
    /// merged client side, empty config values delete.
    pub async fn update_app(&self, name: &str, change: &AppChange) -> Result<App> {
        let current = self.app_by_name(name).await?;
        let mut next = current.clone();
        merge_config(&mut next.config, &change.config);
        next.annotations
            .extend(change.annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
        if change.syslog_url.is_some() {
            next.syslog_url = change.syslog_url.clone();
        }
        self.api.update_app(&current.id, &next).await
    }

    /// Look an app up by name; when missing, create it if `create` is set.
    pub async fn ensure_app(&self, name: &str, change: &AppChange, create: bool) -> Result<(App, Upsert)> {
        match self.app_by_name(name).await {
            Ok(app) => Ok((app, Upsert::Updated)),
            Err(e) if e.is_not_found() && create => {
                tracing::debug!(app = name, "creating missing app");
                let app = self.create_app(name, change).await?;
                Ok((app, Upsert::Created))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn app_contents(&self, name: &str) -> Result<AppContents> {
        let app = self.app_by_name(name).await?;
        let fns = self.list_fns(&app.id, None).await?;
        let triggers = self.list_triggers(&app.id, None, None).await?;
        Ok(AppContents { app, fns, triggers })
    }

    /// Delete triggers, then functions, then the app itself.
    pub async fn delete_app_recursive(&self, contents: &AppContents) -> Result<()> {
        for t in &contents.triggers {
            tracing::debug!(trigger = %t.name, "deleting trigger");
            self.api.delete_trigger(&t.id).await?;
        }
        for f in &contents.fns {
            tracing::debug!(function = %f.name, "deleting function");
            self.api.delete_fn(&f.id).await?;
        }
        self.api.delete_app(&contents.app.id).await
    }

    pub async fn delete_app(&self, name: &str) -> Result<()> {
        let app = self.app_by_name(name).await?;
        self.api.delete_app(&app.id).await
    }

    // ── Functions ──

    /// Create the function if absent, otherwise update it under ETag
    /// protection. The image, when given, is validated before any remote
    /// call.
    pub async fn put_fn(&self, app: &App, name: &str, change: &FnChange) -> Result<(Function, Upsert)> {
        if let Some(image) = &change.image {
            fn_core::image::validate_full_image_name(image)?;
        }
        match self.fn_by_name(&app.id, name).await {
            Ok(existing) => {
                let f = self.update_fn_by_id(&existing.id, name, change).await?;
                Ok((f, Upsert::Updated))
            }
            Err(e) if e.is_not_found() => {
                let mut f = Function {
                    name: name.to_owned(),
                    app_id: app.id.clone(),
                    ..Default::default()
                };
                apply_change(&mut f, change);
                let created = self.api.create_fn(&f).await?;
                Ok((created, Upsert::Created))
            }
            Err(e) => Err(e),
        }
    }

    /// Update an existing function. Fails with the lookup error when absent.
    pub async fn update_fn(&self, app: &App, name: &str, change: &FnChange) -> Result<Function> {
        if let Some(image) = &change.image {
            fn_core::image::validate_full_image_name(image)?;
        }
        let existing = self.fn_by_name(&app.id, name).await?;
        self.update_fn_by_id(&existing.id, name, change).await
    }

    /// Read-modify-write with `If-Match`, re-reading on every conflict.
    async fn update_fn_by_id(&self, id: &str, name: &str, change: &FnChange) -> Result<Function> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self.api.get_fn(id).await?;
            let mut next = current.value;
            apply_change(&mut next, change);
            match self.api.update_fn(id, &next, current.etag).await {
                Ok(f) => return Ok(f),
                Err(Error::EtagMismatch { .. }) => {
                    tracing::debug!(function = name, attempt, "function changed underneath us, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::RetriesExhausted {
            name: name.to_owned(),
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }

    pub async fn delete_fn(&self, app: &str, name: &str) -> Result<()> {
        let (_, f) = self.app_fn(app, name).await?;
        self.api.delete_fn(&f.id).await
    }

    // ── Triggers ──

    /// Create or update a trigger on `f`; the source always starts with `/`.
    pub async fn put_trigger(
        &self,
        f: &Function,
        name: &str,
        kind: &str,
        source: &str,
        annotations: &BTreeMap<String, Value>,
    ) -> Result<(Trigger, Upsert)> {
        let source = normalize_source(source);
        match self.trigger_by_name(&f.app_id, &f.id, name).await {
            Ok(mut existing) => {
                existing.kind = kind.to_owned();
                existing.source = source;
                existing
                    .annotations
                    .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
                let id = existing.id.clone();
                let t = self.api.update_trigger(&id, &existing).await?;
                Ok((t, Upsert::Updated))
            }
            Err(e) if e.is_not_found() => {
                let t = Trigger {
                    name: name.to_owned(),
                    app_id: f.app_id.clone(),
                    fn_id: f.id.clone(),
                    kind: kind.to_owned(),
                    source,
                    annotations: annotations.clone(),
                    ..Default::default()
                };
                let created = self.api.create_trigger(&t).await?;
                Ok((created, Upsert::Created))
            }
            Err(e) => Err(e),
        }
    }

    /// Merge annotations into an existing trigger.
    pub async fn update_trigger(
        &self,
        f: &Function,
        name: &str,
        annotations: &BTreeMap<String, Value>,
    ) -> Result<Trigger> {
        let mut t = self.trigger_by_name(&f.app_id, &f.id, name).await?;
        t.annotations
            .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
        let id = t.id.clone();
        self.api.update_trigger(&id, &t).await
    }

    pub async fn delete_trigger(&self, f: &Function, name: &str) -> Result<()> {
        let t = self.trigger_by_name(&f.app_id, &f.id, name).await?;
        self.api.delete_trigger(&t.id).await
    }

    // ── Invocation ──

    pub async fn invoke(&self, url: &str, req: &InvokeRequest) -> Result<InvokeResponse> {
        tracing::debug!(url, bytes = req.body.len(), "invoking");
        self.api.invoke(url, req).await
    }

    pub async fn server_version(&self) -> Result<String> {
        self.api.server_version().await
    }
}

/// Apply `change` to `f`; config is merged with delete-on-empty only when
/// the change set is non-empty.
pub fn apply_change(f: &mut Function, change: &FnChange) {
    if let Some(image) = &change.image {
        f.image = image.clone();
    }
    if let Some(memory) = change.memory {
        f.memory = memory;
    }
    if change.timeout.is_some() {
        f.timeout = change.timeout;
    }
    if change.idle_timeout.is_some() {
        f.idle_timeout = change.idle_timeout;
    }
    if !change.config.is_empty() {
        merge_config(&mut f.config, &change.config);
    }
    f.annotations
        .extend(change.annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
}

/// Set every key of `change` in `current`, removing keys whose new value is
/// empty.
pub fn merge_config(current: &mut BTreeMap<String, String>, change: &BTreeMap<String, String>) {
    for (k, v) in change {
        if v.is_empty() {
            current.remove(k);
        } else {
            current.insert(k.clone(), v.clone());
        }
    }
}

pub fn normalize_source(source: &str) -> String {
    if source.starts_with('/') {
        source.to_owned()
    } else {
        format!("/{source}")
    }
}
