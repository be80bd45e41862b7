//! Draft-cavage HTTP signatures, with the RSA step delegated to `openssl`.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Request};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::executor::{RealExecutor, SignerExecutor};

const PASSPHRASE_ENV: &str = "FN_SIGNING_PASSPHRASE";

/// Adds authentication to an outgoing request.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    async fn sign(&self, req: &mut Request) -> Result<()>;
}

/// `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl RequestSigner for BearerToken {
    async fn sign(&self, req: &mut Request) -> Result<()> {
        set_header(req, "authorization", &format!("Bearer {}", self.0))
    }
}

/// RSA-SHA256 signature over `date`, `(request-target)` and `host`, plus
/// the body headers for requests that carry one.
pub struct HttpSignature<E: SignerExecutor = RealExecutor> {
    key_id: String,
    key_file: PathBuf,
    passphrase: Option<String>,
    executor: E,
}

impl HttpSignature<RealExecutor> {
    pub fn new(key_id: impl Into<String>, key_file: impl Into<PathBuf>) -> Self {
        Self::with_executor(key_id, key_file, RealExecutor::default())
    }
}

impl<E: SignerExecutor> HttpSignature<E> {
    pub fn with_executor(
        key_id: impl Into<String>,
        key_file: impl Into<PathBuf>,
        executor: E,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            key_file: key_file.into(),
            passphrase: None,
            executor,
        }
    }

    pub fn passphrase(mut self, passphrase: Option<String>) -> Self {
        self.passphrase = passphrase.filter(|p| !p.is_empty());
        self
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn rsa_sha256(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut args = vec![
            "dgst".to_owned(),
            "-sha256".to_owned(),
            "-sign".to_owned(),
            self.key_file.display().to_string(),
        ];
        let mut envs = Vec::new();
        if let Some(p) = &self.passphrase {
            args.push("-passin".to_owned());
            args.push(format!("env:{PASSPHRASE_ENV}"));
            envs.push((PASSPHRASE_ENV.to_owned(), p.clone()));
        }
        self.executor
            .exec_with_stdin(&args, &envs, data)
            .await
            .map_err(|e| Error::Signing { source: e })
    }
}

#[async_trait]
impl<E: SignerExecutor> RequestSigner for HttpSignature<E> {
    async fn sign(&self, req: &mut Request) -> Result<()> {
        if !req.headers().contains_key("date") {
            let now = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            set_header(req, "date", &now)?;
        }
        let mut signed = vec!["date", "(request-target)", "host"];

        if has_body(req.method()) {
            let body = req
                .body()
                .and_then(|b| b.as_bytes())
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            if !req.headers().contains_key("content-type") {
                set_header(req, "content-type", "application/json")?;
            }
            set_header(req, "content-length", &body.len().to_string())?;
            set_header(req, "x-content-sha256", &STANDARD.encode(Sha256::digest(&body)))?;
            signed.extend(["content-length", "content-type", "x-content-sha256"]);
        }

        let text = signing_string(req, &signed);
        tracing::debug!(key_id = %self.key_id, headers = ?signed, "signing request");
        let signature = STANDARD.encode(self.rsa_sha256(text.as_bytes()).await?);
        let authorization = format!(
            r#"Signature version="1",keyId="{}",algorithm="rsa-sha256",headers="{}",signature="{}""#,
            self.key_id,
            signed.join(" "),
            signature
        );
        set_header(req, "authorization", &authorization)
    }
}

fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn host_header(req: &Request) -> String {
    let url = req.url();
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}

/// Newline-joined `name: value` lines in `headers` order.
pub fn signing_string(req: &Request, headers: &[&str]) -> String {
    headers
        .iter()
        .map(|h| {
            let value = match *h {
                "(request-target)" => {
                    let url = req.url();
                    let mut target = url.path().to_owned();
                    if let Some(q) = url.query() {
                        target.push('?');
                        target.push_str(q);
                    }
                    format!("{} {target}", req.method().as_str().to_lowercase())
                }
                "host" => header_str(req, "host")
                    .map(str::to_owned)
                    .unwrap_or_else(|| host_header(req)),
                name => header_str(req, name).unwrap_or_default().to_owned(),
            };
            format!("{h}: {value}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn header_str<'r>(req: &'r Request, name: &str) -> Option<&'r str> {
    let value = req.headers().get(name)?;
    // arch-lint: allow(no-silent-result-drop) reason="non-ASCII header values are signed as empty"
    value.to_str().ok()
}

pub(crate) fn set_header(req: &mut Request, name: &'static str, value: &str) -> Result<()> {
    let v = HeaderValue::from_str(value).map_err(|e| Error::Header {
        name: name.to_owned(),
        source: e,
    })?;
    req.headers_mut().insert(HeaderName::from_static(name), v);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use std::sync::Mutex;

    /// Records what it was asked to sign and answers with fixed bytes.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(Vec<String>, Vec<(String, String)>, Vec<u8>)>>,
    }

    #[async_trait]
    impl SignerExecutor for Recorder {
        async fn exec_with_stdin(
            &self,
            args: &[String],
            envs: &[(String, String)],
            stdin_data: &[u8],
        ) -> std::result::Result<Vec<u8>, ToolError> {
            self.seen
                .lock()
                .unwrap()
                .push((args.to_vec(), envs.to_vec(), stdin_data.to_vec()));
            Ok(b"sig".to_vec())
        }
    }

    fn request(method: Method, url: &str, body: Option<&str>) -> Request {
        let mut req = Request::new(method, url.parse().unwrap());
        if let Some(b) = body {
            *req.body_mut() = Some(b.to_owned().into());
        }
        req.headers_mut().insert(
            "date",
            HeaderValue::from_static("Thu, 05 Jan 2014 21:31:40 GMT"),
        );
        req
    }

    #[tokio::test]
    async fn get_signs_the_three_base_headers() {
        let signer = HttpSignature::with_executor("tenancy/user/fp", "/k.pem", Recorder::default());
        let mut req = request(Method::GET, "https://fn.example.com:8443/v2/apps?per_page=100", None);
        signer.sign(&mut req).await.unwrap();

        let seen = signer.executor.seen.lock().unwrap();
        let (args, envs, data) = &seen[0];
        assert_eq!(args, &["dgst", "-sha256", "-sign", "/k.pem"]);
        assert!(envs.is_empty());
        assert_eq!(
            String::from_utf8(data.clone()).unwrap(),
            "date: Thu, 05 Jan 2014 21:31:40 GMT\n\
             (request-target): get /v2/apps?per_page=100\n\
             host: fn.example.com:8443"
        );

        let auth = req.headers()["authorization"].to_str().unwrap();
        assert!(auth.starts_with(r#"Signature version="1",keyId="tenancy/user/fp",algorithm="rsa-sha256","#));
        assert!(auth.contains(r#"headers="date (request-target) host""#));
        assert!(auth.ends_with(&format!(r#"signature="{}""#, STANDARD.encode(b"sig"))));
    }

    #[tokio::test]
    async fn body_requests_sign_content_headers() {
        let signer = HttpSignature::with_executor("k", "/k.pem", Recorder::default())
            .passphrase(Some("secret".to_owned()));
        let mut req = request(Method::POST, "https://fn.example.com/v2/apps", Some("{}"));
        signer.sign(&mut req).await.unwrap();

        assert_eq!(req.headers()["content-length"], "2");
        assert_eq!(req.headers()["content-type"], "application/json");
        assert_eq!(
            req.headers()["x-content-sha256"],
            STANDARD.encode(Sha256::digest(b"{}")).as_str()
        );
        let auth = req.headers()["authorization"].to_str().unwrap();
        assert!(auth.contains(
            r#"headers="date (request-target) host content-length content-type x-content-sha256""#
        ));

        let seen = signer.executor.seen.lock().unwrap();
        let (args, envs, _) = &seen[0];
        assert!(args.ends_with(&["-passin".to_owned(), format!("env:{PASSPHRASE_ENV}")]));
        assert_eq!(envs, &[(PASSPHRASE_ENV.to_owned(), "secret".to_owned())]);
    }

    #[tokio::test]
    async fn bearer_token_sets_authorization() {
        let mut req = request(Method::GET, "http://localhost:8080/v2/apps", None);
        BearerToken("t0k".to_owned()).sign(&mut req).await.unwrap();
        assert_eq!(req.headers()["authorization"], "Bearer t0k");
    }
}
