//! Latest-FDK discovery against upstream package indexes.
//!
//! Each helper that pins an FDK version owns an [`FdkSource`]: the index
//! URL, the override variable and a parser for the index response. The
//! first successful lookup is cached for the rest of the process.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::OnceCell;

use fn_core::EnvSource;

use crate::error::{Error, Result};

/// Transport failure while reading a package index.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct IndexError {
    pub message: String,
}

/// Fetches raw package-index documents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FdkIndex: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, IndexError>;
}

/// [`FdkIndex`] over HTTPS.
#[derive(Debug, Clone, Default)]
pub struct HttpFdkIndex {
    client: reqwest::Client,
}

impl HttpFdkIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FdkIndex for HttpFdkIndex {
    async fn fetch(&self, url: &str) -> std::result::Result<String, IndexError> {
        let to_err = |e: reqwest::Error| IndexError {
            message: e.to_string(),
        };
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, concat!("fn/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(to_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(IndexError {
                message: format!("unexpected status {status}"),
            });
        }
        resp.text().await.map_err(to_err)
    }
}

/// Response format of a package index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// `maven-metadata.xml`, `<latest>` or `<release>`.
    MavenMetadata,
    /// npm registry document, `dist-tags.latest`.
    Npm,
    /// PyPI JSON API, `info.version`.
    PyPi,
    /// rubygems `latest.json`, `version`.
    RubyGems,
    /// GitHub tags listing, first `name`.
    GithubTags,
    /// clojars artifact document, `latest_version`.
    Clojars,
}

static MAVEN_LATEST: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // arch-lint: allow(no-silent-result-drop) reason="literal pattern; None makes parsing fail closed"
    Regex::new(r"<(?:latest|release)>\s*([^<\s]+)\s*</(?:latest|release)>").ok()
});

impl IndexFormat {
    /// Extract the latest version from an index document.
    pub fn parse(self, body: &str) -> Option<String> {
        if self == IndexFormat::MavenMetadata {
            let re = MAVEN_LATEST.as_ref()?;
            return re
                .captures(body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_owned());
        }

        let doc: serde_json::Value = match serde_json::from_str(body) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!(error = %e, "package index response is not JSON");
                return None;
            }
        };
        let version = match self {
            IndexFormat::Npm => doc.pointer("/dist-tags/latest"),
            IndexFormat::PyPi => doc.pointer("/info/version"),
            IndexFormat::RubyGems => doc.get("version"),
            IndexFormat::GithubTags => doc.pointer("/0/name"),
            IndexFormat::Clojars => doc.get("latest_version"),
            IndexFormat::MavenMetadata => None,
        };
        version
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }
}

/// Where one language's FDK version comes from.
#[derive(Debug)]
pub struct FdkSource {
    pub lang: &'static str,
    pub url: &'static str,
    pub env: &'static str,
    pub format: IndexFormat,
    cached: OnceCell<String>,
}

impl FdkSource {
    pub const fn new(
        lang: &'static str,
        url: &'static str,
        env: &'static str,
        format: IndexFormat,
    ) -> Self {
        Self {
            lang,
            url,
            env,
            format,
            cached: OnceCell::const_new(),
        }
    }

    /// The override variable if set, else the cached or freshly fetched
    /// latest version. There is no built-in fallback version.
    pub async fn resolve(&self, env: &dyn EnvSource, index: &dyn FdkIndex) -> Result<String> {
        if let Some(version) = env.non_empty(self.env) {
            return Ok(version);
        }
        let version = self
            .cached
            .get_or_try_init(|| async {
                let body = index.fetch(self.url).await.map_err(|e| self.fetch_error(&e.message))?;
                self.format
                    .parse(&body)
                    .ok_or_else(|| self.fetch_error("no version in index response"))
            })
            .await?;
        tracing::debug!(lang = self.lang, %version, "latest FDK version");
        Ok(version.clone())
    }

    fn fetch_error(&self, reason: &str) -> Error {
        Error::FdkFetch {
            lang: self.lang,
            url: self.url.to_owned(),
            env: self.env,
            reason: reason.to_owned(),
        }
    }
}

/// Shared collaborators handed to every helper.
#[derive(Clone)]
pub struct HelperContext {
    pub env: Arc<dyn EnvSource>,
    pub index: Arc<dyn FdkIndex>,
}

impl HelperContext {
    pub fn new(env: Arc<dyn EnvSource>, index: Arc<dyn FdkIndex>) -> Self {
        Self { env, index }
    }

    pub async fn fdk_version(&self, source: &FdkSource) -> Result<String> {
        source.resolve(self.env.as_ref(), self.index.as_ref()).await
    }
}

impl std::fmt::Debug for HelperContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelperContext").finish_non_exhaustive()
    }
}
