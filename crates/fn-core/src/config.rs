use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::env::EnvSource;
use crate::Error;

pub const ROOT_DIR: &str = ".fn";
pub const CONTEXTS_DIR: &str = "contexts";
pub const ROOT_CONFIG_FILE: &str = "config.yaml";
pub const CONTEXT_EXT: &str = "yaml";
pub const DEFAULT_CONTEXT: &str = "default";
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Version written to `cli-version` in the root config.
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const KEY_CURRENT_CONTEXT: &str = "current-context";
pub const KEY_CLI_VERSION: &str = "cli-version";
pub const KEY_CONTAINER_ENGINE: &str = "container-enginetype";

pub const KEY_PROVIDER: &str = "provider";
pub const KEY_API_URL: &str = "api-url";
pub const KEY_REGISTRY: &str = "registry";

pub const KEY_ORACLE_COMPARTMENT_ID: &str = "oracle.compartment-id";
pub const KEY_ORACLE_PROFILE: &str = "oracle.profile";
pub const KEY_ORACLE_TENANCY_ID: &str = "oracle.tenancy-id";
pub const KEY_ORACLE_USER_ID: &str = "oracle.user-id";
pub const KEY_ORACLE_FINGERPRINT: &str = "oracle.fingerprint";
pub const KEY_ORACLE_KEY_FILE: &str = "oracle.key-file";
pub const KEY_ORACLE_PASS_PHRASE: &str = "oracle.pass-phrase";
pub const KEY_ORACLE_DISABLE_CERTS: &str = "oracle.disable-certs";
pub const KEY_ORACLE_SECURITY_TOKEN_FILE: &str = "oracle.security-token-file";

pub const PROVIDER_DEFAULT: &str = "default";
pub const PROVIDER_ORACLE: &str = "oracle";
pub const PROVIDER_ORACLE_IP: &str = "oracle-ip";
pub const PROVIDER_ORACLE_CS: &str = "oracle-cs";

pub const ENV_OCI_CLI_AUTH: &str = "OCI_CLI_AUTH";
pub const OCI_AUTH_API_KEY: &str = "api_key";
pub const OCI_AUTH_INSTANCE_PRINCIPAL: &str = "instance_principal";
pub const OCI_AUTH_INSTANCE_OBO_USER: &str = "instance_obo_user";

/// The program used to build, push and run images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerEngine {
    #[default]
    Docker,
    Podman,
}

impl ContainerEngine {
    pub fn program(self) -> &'static str {
        match self {
            ContainerEngine::Docker => "docker",
            ContainerEngine::Podman => "podman",
        }
    }
}

impl fmt::Display for ContainerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

impl FromStr for ContainerEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker" => Ok(ContainerEngine::Docker),
            "podman" => Ok(ContainerEngine::Podman),
            other => Err(Error::InvalidContainerEngine(other.to_owned())),
        }
    }
}

/// `~/.fn/config.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(rename = "current-context", default)]
    pub current_context: String,
    #[serde(rename = "cli-version", default)]
    pub cli_version: String,
    #[serde(rename = "container-enginetype", default)]
    pub container_engine: ContainerEngine,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            current_context: DEFAULT_CONTEXT.to_owned(),
            cli_version: CLI_VERSION.to_owned(),
            container_engine: ContainerEngine::Docker,
            extra: BTreeMap::new(),
        }
    }
}

/// One `~/.fn/contexts/<name>.yaml` file: an open key/value map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextFile {
    pub values: BTreeMap<String, serde_yaml::Value>,
}

impl ContextFile {
    pub fn new(provider: &str, api_url: &str, registry: &str) -> Self {
        let mut cf = Self::default();
        cf.set(KEY_PROVIDER, provider);
        cf.set(KEY_API_URL, api_url);
        cf.set(KEY_REGISTRY, registry);
        cf
    }

    /// Contents of `default.yaml` on first use. Cloud Shell and instance
    /// principal sessions get an oracle provider and derive their endpoint
    /// from the region.
    pub fn initial(env: &dyn EnvSource) -> Self {
        match env.var(ENV_OCI_CLI_AUTH).as_deref() {
            Some(OCI_AUTH_INSTANCE_OBO_USER) => {
                let mut cf = Self::default();
                cf.set(KEY_PROVIDER, PROVIDER_ORACLE_CS);
                cf.set(KEY_REGISTRY, "");
                cf
            }
            Some(OCI_AUTH_INSTANCE_PRINCIPAL) => {
                let mut cf = Self::default();
                cf.set(KEY_PROVIDER, PROVIDER_ORACLE_IP);
                cf.set(KEY_REGISTRY, "");
                cf
            }
            _ => Self::new(PROVIDER_DEFAULT, DEFAULT_API_URL, ""),
        }
    }

    /// The value under `key` rendered as a string; non-scalars read as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Like [`ContextFile::get`], but empty strings read as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_owned(), serde_yaml::Value::String(value.to_owned()));
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_yaml::Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn provider(&self) -> String {
        self.get_non_empty(KEY_PROVIDER)
            .unwrap_or_else(|| PROVIDER_DEFAULT.to_owned())
    }

    pub fn api_url(&self) -> Option<String> {
        self.get_non_empty(KEY_API_URL)
    }

    pub fn registry(&self) -> Option<String> {
        self.get_non_empty(KEY_REGISTRY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_context_points_at_localhost() {
        let cf = ContextFile::initial(&HashMap::<String, String>::new());
        assert_eq!(cf.provider(), "default");
        assert_eq!(cf.api_url().as_deref(), Some("http://localhost:8080"));
        assert_eq!(cf.registry(), None);
    }

    #[test]
    fn cloud_shell_default_context_has_no_api_url() {
        let env = HashMap::from([(
            ENV_OCI_CLI_AUTH.to_owned(),
            OCI_AUTH_INSTANCE_OBO_USER.to_owned(),
        )]);
        let cf = ContextFile::initial(&env);
        assert_eq!(cf.provider(), "oracle-cs");
        assert!(cf.api_url().is_none());
    }

    #[test]
    fn scalars_read_as_strings() {
        let cf: ContextFile =
            serde_yaml::from_str("oracle.disable-certs: true\nport: 8080\nlist: [a]\n").unwrap();
        assert_eq!(cf.get("oracle.disable-certs").as_deref(), Some("true"));
        assert_eq!(cf.get("port").as_deref(), Some("8080"));
        assert_eq!(cf.get("list"), None);
    }

    #[test]
    fn root_config_keeps_unknown_keys() {
        let rc: RootConfig =
            serde_yaml::from_str("current-context: dev\ncli-version: 0.6.0\ntheme: dark\n").unwrap();
        assert_eq!(rc.current_context, "dev");
        assert_eq!(rc.container_engine, ContainerEngine::Docker);
        let out = serde_yaml::to_string(&rc).unwrap();
        assert!(out.contains("theme: dark"));
    }

    #[test]
    fn container_engine_parses() {
        assert_eq!("podman".parse::<ContainerEngine>().unwrap(), ContainerEngine::Podman);
        assert!("rkt".parse::<ContainerEngine>().is_err());
    }
}
