use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Request, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{FnApi, InvokeRequest, InvokeResponse};
use crate::error::{Error, Result};
use crate::models::{App, ErrorBody, Function, ListQuery, Page, Tagged, Trigger};
use crate::signer::{set_header, RequestSigner};

/// [`FnApi`] over HTTP, optionally signing every request.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    /// Versioned base, e.g. `http://localhost:8080/v2`.
    base: Url,
    /// The configured server root, for `/version`.
    root: Url,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base", &self.base.as_str())
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

impl HttpApi {
    pub fn new(client: reqwest::Client, root: Url, base: Url) -> Self {
        Self {
            client,
            base,
            root,
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| Error::InvalidUrl {
                url: self.base.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn list_url(&self, resource: &str, q: &ListQuery) -> Result<Url> {
        let mut url = self.url(&[resource])?;
        let per_page = q.per_page.to_string();
        let pairs: Vec<(&str, &str)> = [
            ("app_id", q.app_id.as_deref()),
            ("fn_id", q.fn_id.as_deref()),
            ("name", q.name.as_deref()),
            ("cursor", q.cursor.as_deref()),
            ("per_page", (q.per_page > 0).then_some(per_page.as_str())),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.filter(|v| !v.is_empty()).map(|v| (k, v)))
        .collect();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Request> {
        let mut req = Request::new(method, url);
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(|e| Error::Encode { source: e })?;
            set_header(&mut req, "content-type", "application/json")?;
            *req.body_mut() = Some(bytes.into());
        }
        Ok(req)
    }

    async fn send(&self, mut req: Request) -> Result<reqwest::Response> {
        if let Some(signer) = &self.signer {
            signer.sign(&mut req).await?;
        }
        let url = req.url().to_string();
        tracing::debug!(method = %req.method(), %url, "api request");
        self.client
            .execute(req)
            .await
            .map_err(|e| Error::Network { url, source: e })
    }

    /// Send and decode a JSON success body, turning error statuses into
    /// [`Error::Remote`].
    async fn call<T: DeserializeOwned>(&self, req: Request) -> Result<(T, Option<String>)> {
        let url = req.url().to_string();
        let resp = check(self.send(req).await?).await?;
        let etag = resp
            .headers()
            .get("etag")
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let value = resp
            .json::<T>()
            .await
            .map_err(|e| Error::Decode { url, source: e })?;
        Ok((value, etag))
    }

    async fn call_empty(&self, req: Request) -> Result<()> {
        check(self.send(req).await?).await.map(|_| ())
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let req = self.request::<()>(Method::GET, url, None)?;
        self.call(req).await.map(|(v, _)| v)
    }

    async fn with_body<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let req = self.request(method, url, Some(body))?;
        self.call(req).await.map(|(v, _)| v)
    }

    async fn delete(&self, url: Url) -> Result<()> {
        let req = self.request::<()>(Method::DELETE, url, None)?;
        self.call_empty(req).await
    }
}

/// Pass 2xx responses through; read the server's message out of anything
/// else.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = match resp.text().await {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!(error = %e, "could not read error body");
            String::new()
        }
    };
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) if !body.message.is_empty() => body.message,
        _ if text.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
        _ => text.trim().to_owned(),
    };
    Err(Error::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl FnApi for HttpApi {
    // ── Apps ──

    async fn list_apps(&self, query: ListQuery) -> Result<Page<App>> {
        self.get(self.list_url("apps", &query)?).await
    }

    async fn get_app(&self, id: &str) -> Result<App> {
        self.get(self.url(&["apps", id])?).await
    }

    async fn create_app(&self, app: &App) -> Result<App> {
        self.with_body(Method::POST, self.url(&["apps"])?, app).await
    }

    async fn update_app(&self, id: &str, app: &App) -> Result<App> {
        self.with_body(Method::PUT, self.url(&["apps", id])?, app)
            .await
    }

    async fn delete_app(&self, id: &str) -> Result<()> {
        self.delete(self.url(&["apps", id])?).await
    }

    // ── Functions ──

    async fn list_fns(&self, query: ListQuery) -> Result<Page<Function>> {
        self.get(self.list_url("fns", &query)?).await
    }

    async fn get_fn(&self, id: &str) -> Result<Tagged<Function>> {
        let req = self.request::<()>(Method::GET, self.url(&["fns", id])?, None)?;
        let (value, etag) = self.call(req).await?;
        Ok(Tagged { value, etag })
    }

    async fn create_fn(&self, f: &Function) -> Result<Function> {
        self.with_body(Method::POST, self.url(&["fns"])?, f).await
    }

    async fn update_fn(
        &self,
        id: &str,
        f: &Function,
        if_match: Option<String>,
    ) -> Result<Function> {
        let mut req = self.request(Method::PUT, self.url(&["fns", id])?, Some(f))?;
        if let Some(etag) = &if_match {
            set_header(&mut req, "if-match", etag)?;
        }
        match self.call(req).await {
            Ok((value, _)) => Ok(value),
            Err(Error::Remote { status, .. })
                if if_match.is_some() && status == StatusCode::PRECONDITION_FAILED.as_u16() =>
            {
                Err(Error::EtagMismatch { id: id.to_owned() })
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_fn(&self, id: &str) -> Result<()> {
        self.delete(self.url(&["fns", id])?).await
    }

    // ── Triggers ──

    async fn list_triggers(&self, query: ListQuery) -> Result<Page<Trigger>> {
        self.get(self.list_url("triggers", &query)?).await
    }

    async fn get_trigger(&self, id: &str) -> Result<Trigger> {
        self.get(self.url(&["triggers", id])?).await
    }

    async fn create_trigger(&self, t: &Trigger) -> Result<Trigger> {
        self.with_body(Method::POST, self.url(&["triggers"])?, t)
            .await
    }

    async fn update_trigger(&self, id: &str, t: &Trigger) -> Result<Trigger> {
        self.with_body(Method::PUT, self.url(&["triggers", id])?, t)
            .await
    }

    async fn delete_trigger(&self, id: &str) -> Result<()> {
        self.delete(self.url(&["triggers", id])?).await
    }

    // ── Other ──

    async fn invoke(&self, url: &str, req: &InvokeRequest) -> Result<InvokeResponse> {
        let target = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_owned(),
            source: e,
        })?;
        let mut request = Request::new(Method::POST, target);
        set_header(&mut request, "content-type", &req.content_type)?;
        for (name, value) in &req.headers {
            let header =
                reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    Error::HeaderName {
                        name: name.clone(),
                        source: e,
                    }
                })?;
            let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| Error::Header {
                name: name.clone(),
                source: e,
            })?;
            request.headers_mut().append(header, value);
        }
        *request.body_mut() = Some(req.body.clone().into());

        let resp = self.send(request).await?;
        let status = resp.status().as_u16();
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in resp.headers() {
            headers
                .entry(name.as_str().to_owned())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Network {
                url: url.to_owned(),
                source: e,
            })?
            .to_vec();
        Ok(InvokeResponse {
            status,
            headers,
            body,
        })
    }

    async fn server_version(&self) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct Version {
            version: String,
        }
        let mut url = self.root.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| Error::InvalidUrl {
                url: self.root.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?;
            path.pop_if_empty();
            path.push("version");
        }
        let v: Version = self.get(url).await?;
        Ok(v.version)
    }
}
