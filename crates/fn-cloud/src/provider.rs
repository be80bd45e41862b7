//! Picks the credential provider for a context and wires a signed
//! [`HttpApi`] for it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fn_core::config::{
    ENV_OCI_CLI_AUTH, KEY_ORACLE_COMPARTMENT_ID, KEY_ORACLE_DISABLE_CERTS, KEY_ORACLE_FINGERPRINT,
    KEY_ORACLE_KEY_FILE, KEY_ORACLE_PASS_PHRASE, KEY_ORACLE_PROFILE,
    KEY_ORACLE_SECURITY_TOKEN_FILE, KEY_ORACLE_TENANCY_ID, KEY_ORACLE_USER_ID,
    OCI_AUTH_API_KEY, OCI_AUTH_INSTANCE_OBO_USER, OCI_AUTH_INSTANCE_PRINCIPAL, PROVIDER_DEFAULT,
    PROVIDER_ORACLE, PROVIDER_ORACLE_CS, PROVIDER_ORACLE_IP,
};
use fn_core::env::{ENV_FN_API_URL, ENV_FN_TOKEN};
use fn_core::{ContextFile, EnvSource};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{Error, Result};
use crate::http::HttpApi;
use crate::signer::{BearerToken, HttpSignature, RequestSigner};

pub const ENV_OCI_CLI_PROFILE: &str = "OCI_CLI_PROFILE";
pub const ENV_OCI_CLI_CONFIG_FILE: &str = "OCI_CLI_CONFIG_FILE";
pub const ENV_OCI_CLI_REGION: &str = "OCI_CLI_REGION";
pub const ENV_OCI_CLI_TENANCY: &str = "OCI_CLI_TENANCY";
pub const ENV_OCI_CLI_USER: &str = "OCI_CLI_USER";
pub const ENV_OCI_CLI_FINGERPRINT: &str = "OCI_CLI_FINGERPRINT";
pub const ENV_OCI_CLI_KEY_FILE: &str = "OCI_CLI_KEY_FILE";
pub const ENV_OCI_CLI_DELEGATION_TOKEN_FILE: &str = "OCI_CLI_DELEGATION_TOKEN_FILE";

const DEFAULT_PROFILE: &str = "DEFAULT";
const ORACLE_API_VERSION: &str = "20181201";
const REGION_METADATA_URL: &str = "http://169.254.169.254/opc/v2/instance/region";

// ── Selection ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Default,
    /// User API key.
    Oracle,
    /// Instance principal.
    OracleIp,
    /// Cloud Shell delegation.
    OracleCs,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            PROVIDER_DEFAULT => Ok(Self::Default),
            PROVIDER_ORACLE => Ok(Self::Oracle),
            PROVIDER_ORACLE_IP => Ok(Self::OracleIp),
            PROVIDER_ORACLE_CS => Ok(Self::OracleCs),
            other => Err(Error::UnknownProvider {
                name: other.to_owned(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => PROVIDER_DEFAULT,
            Self::Oracle => PROVIDER_ORACLE,
            Self::OracleIp => PROVIDER_ORACLE_IP,
            Self::OracleCs => PROVIDER_ORACLE_CS,
        }
    }

    /// The context's `provider` key, then `OCI_CLI_AUTH`, then `default`.
    pub fn select(file: &ContextFile, env: &dyn EnvSource) -> Result<Self> {
        if let Some(name) = file.get_non_empty(fn_core::config::KEY_PROVIDER) {
            return Self::parse(&name);
        }
        Ok(match env.non_empty(ENV_OCI_CLI_AUTH).as_deref() {
            Some(OCI_AUTH_API_KEY) => Self::Oracle,
            Some(OCI_AUTH_INSTANCE_PRINCIPAL) => Self::OracleIp,
            Some(OCI_AUTH_INSTANCE_OBO_USER) => Self::OracleCs,
            _ => Self::Default,
        })
    }
}

/// Asks the user for the passphrase of an encrypted private key.
pub trait PassphraseSource: Send + Sync {
    fn passphrase(&self, key_file: &Path) -> Result<String>;
}

/// Never has a passphrase to offer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassphrase;

impl PassphraseSource for NoPassphrase {
    fn passphrase(&self, key_file: &Path) -> Result<String> {
        Err(Error::Passphrase {
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is encrypted and no passphrase is configured", key_file.display()),
            ),
        })
    }
}

/// Inputs to provider construction for one invocation.
pub struct ProviderConfig<'a> {
    pub context: &'a str,
    pub file: &'a ContextFile,
    pub env: &'a dyn EnvSource,
    pub home: &'a Path,
    pub passphrase: &'a dyn PassphraseSource,
}

/// A connected API plus what the caller may want to show.
#[derive(Debug)]
pub struct Provider {
    pub kind: ProviderKind,
    pub api: HttpApi,
}

impl ProviderConfig<'_> {
    /// `FN_API_URL`, else the context's `api-url`.
    pub fn api_url(&self) -> Option<String> {
        self.env
            .non_empty(ENV_FN_API_URL)
            .or_else(|| self.file.api_url())
    }

    pub async fn connect(&self) -> Result<Provider> {
        let kind = ProviderKind::select(self.file, self.env)?;
        tracing::debug!(context = self.context, provider = kind.as_str(), "selecting provider");
        let api = match kind {
            ProviderKind::Default => self.default_api()?,
            ProviderKind::Oracle => self.oracle_api(false).await?,
            ProviderKind::OracleCs => self.oracle_api(true).await?,
            ProviderKind::OracleIp => self.instance_principal_api().await?,
        };
        Ok(Provider { kind, api })
    }

    // ── default ──

    fn default_api(&self) -> Result<HttpApi> {
        let raw = self.api_url().ok_or_else(|| Error::MissingApiUrl {
            context: self.context.to_owned(),
        })?;
        let root = parse_url(&raw)?;
        let base = versioned(&root, "v2")?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::HttpClient { source: e })?;
        let api = HttpApi::new(client, root, base);
        Ok(match self.env.non_empty(ENV_FN_TOKEN) {
            Some(token) => api.with_signer(Arc::new(BearerToken(token))),
            None => api,
        })
    }

    // ── oracle / oracle-cs ──

    fn oci_config_path(&self) -> PathBuf {
        self.env
            .non_empty(ENV_OCI_CLI_CONFIG_FILE)
            .map(|p| expand_home(&p, self.home))
            .unwrap_or_else(|| self.home.join(".oci").join("config"))
    }

    fn load_profile(&self, path: &Path) -> Result<HashMap<String, String>> {
        let profile = self
            .file
            .get_non_empty(KEY_ORACLE_PROFILE)
            .or_else(|| self.env.non_empty(ENV_OCI_CLI_PROFILE))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_owned());
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no OCI config file");
            return Ok(HashMap::new());
        }
        let text = std::fs::read_to_string(path).map_err(|e| Error::CredentialRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(parse_profile(&text, &profile))
    }

    /// Context key, then environment variable, then config-file entry.
    fn credential(
        &self,
        profile: &HashMap<String, String>,
        config: &Path,
        context_key: &'static str,
        env_key: &'static str,
        file_key: &str,
    ) -> Result<String> {
        self.file
            .get_non_empty(context_key)
            .or_else(|| self.env.non_empty(env_key))
            .or_else(|| profile.get(file_key).filter(|v| !v.is_empty()).cloned())
            .ok_or_else(|| Error::MissingCredential {
                key: context_key,
                config: config.to_path_buf(),
                env: env_key,
            })
    }

    async fn oracle_api(&self, cloud_shell: bool) -> Result<HttpApi> {
        let config = self.oci_config_path();
        let profile = self.load_profile(&config)?;

        let tenancy = self.credential(&profile, &config, KEY_ORACLE_TENANCY_ID, ENV_OCI_CLI_TENANCY, "tenancy")?;
        let user = self.credential(&profile, &config, KEY_ORACLE_USER_ID, ENV_OCI_CLI_USER, "user")?;
        let fingerprint = self.credential(
            &profile,
            &config,
            KEY_ORACLE_FINGERPRINT,
            ENV_OCI_CLI_FINGERPRINT,
            "fingerprint",
        )?;
        let key_file = expand_home(
            &self.credential(&profile, &config, KEY_ORACLE_KEY_FILE, ENV_OCI_CLI_KEY_FILE, "key_file")?,
            self.home,
        );

        let mut passphrase = self
            .file
            .get_non_empty(KEY_ORACLE_PASS_PHRASE)
            .or_else(|| profile.get("pass_phrase").filter(|v| !v.is_empty()).cloned());
        if passphrase.is_none() && key_is_encrypted(&key_file)? {
            passphrase = Some(self.passphrase.passphrase(&key_file)?);
        }

        let root = match self.api_url() {
            Some(raw) => parse_url(&raw)?,
            None => {
                let region = self
                    .env
                    .non_empty(ENV_OCI_CLI_REGION)
                    .or_else(|| profile.get("region").filter(|v| !v.is_empty()).cloned())
                    .ok_or_else(|| Error::MissingRegion {
                        config: config.clone(),
                    })?;
                regional_endpoint(&region)?
            }
        };

        let compartment = self
            .file
            .get_non_empty(KEY_ORACLE_COMPARTMENT_ID)
            .unwrap_or_else(|| tenancy.clone());
        let mut headers = vec![("opc-compartment-id", compartment)];
        if cloud_shell {
            let path = self
                .env
                .non_empty(ENV_OCI_CLI_DELEGATION_TOKEN_FILE)
                .ok_or_else(|| Error::MissingCredential {
                    key: "delegation token",
                    config: config.clone(),
                    env: ENV_OCI_CLI_DELEGATION_TOKEN_FILE,
                })?;
            headers.push(("opc-obo-token", read_trimmed(&expand_home(&path, self.home))?));
        }

        let signer = HttpSignature::new(format!("{tenancy}/{user}/{fingerprint}"), key_file)
            .passphrase(passphrase);
        self.oracle_http(root, headers, Arc::new(signer))
    }

    // ── oracle-ip ──

    async fn instance_principal_api(&self) -> Result<HttpApi> {
        let key_file = self
            .file
            .get_non_empty(KEY_ORACLE_KEY_FILE)
            .ok_or(Error::MissingContextKey {
                key: KEY_ORACLE_KEY_FILE,
            })?;
        let token_file = self
            .file
            .get_non_empty(KEY_ORACLE_SECURITY_TOKEN_FILE)
            .ok_or(Error::MissingContextKey {
                key: KEY_ORACLE_SECURITY_TOKEN_FILE,
            })?;
        let compartment = self
            .file
            .get_non_empty(KEY_ORACLE_COMPARTMENT_ID)
            .ok_or(Error::MissingContextKey {
                key: KEY_ORACLE_COMPARTMENT_ID,
            })?;
        let token = read_trimmed(&expand_home(&token_file, self.home))?;

        let root = match self.api_url() {
            Some(raw) => parse_url(&raw)?,
            None => regional_endpoint(&metadata_region().await?)?,
        };
        let signer = HttpSignature::new(format!("ST${token}"), expand_home(&key_file, self.home));
        self.oracle_http(
            root,
            vec![("opc-compartment-id", compartment)],
            Arc::new(signer),
        )
    }

    fn oracle_http(
        &self,
        root: Url,
        headers: Vec<(&'static str, String)>,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<HttpApi> {
        let mut defaults = HeaderMap::new();
        for (name, value) in headers {
            let v = HeaderValue::from_str(&value).map_err(|e| Error::Header {
                name: name.to_owned(),
                source: e,
            })?;
            defaults.insert(HeaderName::from_static(name), v);
        }
        let insecure = self
            .file
            .get(KEY_ORACLE_DISABLE_CERTS)
            .is_some_and(|v| v == "true");
        if insecure {
            tracing::warn!("TLS certificate verification is disabled for this context");
        }
        let client = reqwest::Client::builder()
            .default_headers(defaults)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| Error::HttpClient { source: e })?;
        let base = versioned(&root, ORACLE_API_VERSION)?;
        Ok(HttpApi::new(client, root, base).with_signer(signer))
    }
}

// ── Helpers ──

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_owned(),
        source: e,
    })
}

/// `root` with `/<version>` appended unless its path already ends in it.
pub fn versioned(root: &Url, version: &str) -> Result<Url> {
    let trimmed = root.path().trim_end_matches('/');
    if trimmed.rsplit('/').next() == Some(version) {
        return Ok(root.clone());
    }
    let mut url = root.clone();
    url.path_segments_mut()
        .map_err(|()| Error::InvalidUrl {
            url: root.to_string(),
            source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
        })?
        .pop_if_empty()
        .push(version);
    Ok(url)
}

pub fn regional_endpoint(region: &str) -> Result<Url> {
    parse_url(&format!("https://functions.{region}.oci.oraclecloud.com"))
}

/// Keys of `[profile]` in an OCI config file. Later sections never leak
/// into earlier ones; `DEFAULT` entries fill gaps.
pub fn parse_profile(text: &str, profile: &str) -> HashMap<String, String> {
    let mut defaults = HashMap::new();
    let mut selected = HashMap::new();
    let mut section = String::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_owned();
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let entry = (k.trim().to_owned(), v.trim().to_owned());
        if section == profile {
            selected.insert(entry.0, entry.1);
        } else if section == DEFAULT_PROFILE {
            defaults.insert(entry.0, entry.1);
        }
    }
    defaults.extend(selected);
    defaults
}

fn expand_home(path: &str, home: &Path) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

fn read_trimmed(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_owned())
        .map_err(|e| Error::CredentialRead {
            path: path.to_path_buf(),
            source: e,
        })
}

fn key_is_encrypted(path: &Path) -> Result<bool> {
    let pem = std::fs::read_to_string(path).map_err(|e| Error::CredentialRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(pem.contains("ENCRYPTED"))
}

async fn metadata_region() -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::HttpClient { source: e })?;
    let resp = client
        .get(REGION_METADATA_URL)
        .header("authorization", "Bearer Oracle")
        .send()
        .await
        .map_err(|e| Error::Network {
            url: REGION_METADATA_URL.to_owned(),
            source: e,
        })?;
    let region = resp.text().await.map_err(|e| Error::Decode {
        url: REGION_METADATA_URL.to_owned(),
        source: e,
    })?;
    Ok(region.trim().to_owned())
}
