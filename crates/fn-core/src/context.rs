//! Named connection profiles under `~/.fn/contexts` and the current-context
//! pointer in `~/.fn/config.yaml`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::{
    ContextFile, RootConfig, CLI_VERSION, CONTEXTS_DIR, CONTEXT_EXT, DEFAULT_CONTEXT,
    KEY_API_URL, ROOT_CONFIG_FILE, ROOT_DIR,
};
use crate::env::{EnvSource, ENV_FN_CONTEXT};
use crate::{Error, Result};

static CONTEXT_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // arch-lint: allow(no-silent-result-drop) reason="literal pattern; None makes matching fail closed"
    Regex::new(r"^[A-Za-z0-9_-]+$").ok()
});

pub fn validate_context_name(name: &str) -> Result<()> {
    let ok = CONTEXT_NAME.as_ref().is_some_and(|re| re.is_match(name));
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidContextName {
            name: name.to_owned(),
        })
    }
}

/// An API URL must carry a scheme separator and parse as a URL.
pub fn validate_api_url(api_url: &str) -> Result<()> {
    if !api_url.contains("://") {
        return Err(Error::InvalidApiUrl {
            url: api_url.to_owned(),
            reason: "does not contain ://".to_owned(),
        });
    }
    url::Url::parse(api_url).map_err(|e| Error::InvalidApiUrl {
        url: api_url.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// One row of `fn list contexts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextInfo {
    pub name: String,
    pub current: bool,
    pub provider: String,
    #[serde(rename = "api-url")]
    pub api_url: String,
    pub registry: String,
}

/// The context selected for one invocation.
#[derive(Debug, Clone)]
pub struct ActiveContext {
    pub name: String,
    pub file: ContextFile,
    pub root: RootConfig,
    /// Set when the selected context was missing and the pointer fell back
    /// to `default`.
    pub reset_to_default: bool,
}

/// File-backed context store rooted at `<home>/.fn`.
#[derive(Debug, Clone)]
pub struct ContextStore {
    root: PathBuf,
}

impl ContextStore {
    pub fn open(home: &Path) -> Self {
        Self {
            root: home.join(ROOT_DIR),
        }
    }

    /// Store under the user's home directory.
    pub fn from_home() -> Result<Self> {
        Ok(Self::open(&crate::paths::home_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contexts_dir(&self) -> PathBuf {
        self.root.join(CONTEXTS_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(ROOT_CONFIG_FILE)
    }

    pub fn context_path(&self, name: &str) -> PathBuf {
        self.contexts_dir().join(format!("{name}.{CONTEXT_EXT}"))
    }

    // ── Initialization ──

    /// Create the directory hierarchy, `default.yaml` and `config.yaml`
    /// when any of them is missing.
    pub fn ensure(&self, env: &dyn EnvSource) -> Result<()> {
        create_dir(&self.root)?;
        create_dir(&self.contexts_dir())?;

        let default_path = self.context_path(DEFAULT_CONTEXT);
        if !default_path.exists() {
            write_yaml(&default_path, &ContextFile::initial(env))?;
            tracing::debug!(path = %default_path.display(), "created default context");
        }

        let config_path = self.config_path();
        if !config_path.exists() {
            write_yaml(&config_path, &RootConfig::default())?;
            tracing::debug!(path = %config_path.display(), "created root config");
        }
        Ok(())
    }

    // ── Root config ──

    pub fn load_root(&self) -> Result<RootConfig> {
        read_yaml(&self.config_path())
    }

    /// Replace `config.yaml` atomically.
    pub fn save_root(&self, rc: &RootConfig) -> Result<()> {
        atomic_write_yaml(&self.config_path(), rc)
    }

    fn set_current(&self, name: &str) -> Result<()> {
        let mut rc = self.load_root()?;
        rc.current_context = name.to_owned();
        self.save_root(&rc)
    }

    /// Select the context for this invocation: `flag`, then `FN_CONTEXT`,
    /// then `current-context`. A selection whose file is missing resets the
    /// pointer to `default`.
    pub fn resolve(&self, flag: Option<&str>, env: &dyn EnvSource) -> Result<ActiveContext> {
        let mut root = self.load_root()?;
        let name = flag
            .filter(|f| !f.is_empty())
            .map(str::to_owned)
            .or_else(|| env.non_empty(ENV_FN_CONTEXT))
            .unwrap_or_else(|| root.current_context.clone());

        if !name.is_empty() && self.exists(&name) {
            let file = self.read(&name)?;
            return Ok(ActiveContext {
                name,
                file,
                root,
                reset_to_default: false,
            });
        }

        tracing::warn!(context = %name, "context file not found, falling back to default");
        root.current_context = DEFAULT_CONTEXT.to_owned();
        root.cli_version = CLI_VERSION.to_owned();
        self.save_root(&root)?;
        let file = self.read(DEFAULT_CONTEXT)?;
        Ok(ActiveContext {
            name: DEFAULT_CONTEXT.to_owned(),
            file,
            root,
            reset_to_default: true,
        })
    }

    // ── Contexts ──

    pub fn exists(&self, name: &str) -> bool {
        self.context_path(name).is_file()
    }

    fn require(&self, name: &str) -> Result<PathBuf> {
        let path = self.context_path(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::ContextNotFound {
                name: name.to_owned(),
            })
        }
    }

    pub fn read(&self, name: &str) -> Result<ContextFile> {
        let path = self.require(name)?;
        read_yaml(&path)
    }

    /// The context file as written on disk.
    pub fn read_raw(&self, name: &str) -> Result<String> {
        let path = self.require(name)?;
        std::fs::read_to_string(&path).map_err(|e| Error::ConfigRead { path, source: e })
    }

    pub fn create(&self, name: &str, provider: &str, api_url: &str, registry: &str) -> Result<()> {
        validate_context_name(name)?;
        if !api_url.is_empty() {
            validate_api_url(api_url)?;
        }
        if self.exists(name) {
            return Err(Error::ContextExists {
                name: name.to_owned(),
            });
        }
        create_dir(&self.contexts_dir())?;
        write_yaml(
            &self.context_path(name),
            &ContextFile::new(provider, api_url, registry),
        )
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.require(name)?;
        let current = self.load_root()?.current_context;
        if name == current {
            return Err(Error::DeleteCurrentContext {
                name: name.to_owned(),
            });
        }
        if name == DEFAULT_CONTEXT {
            return Err(Error::DeleteDefaultContext);
        }
        std::fs::remove_file(&path).map_err(|e| Error::ConfigWrite { path, source: e })
    }

    pub fn use_context(&self, name: &str) -> Result<()> {
        self.require(name)?;
        if self.load_root()?.current_context == name {
            return Err(Error::ContextInUse {
                name: name.to_owned(),
            });
        }
        self.set_current(name)
    }

    pub fn unset(&self) -> Result<()> {
        if self.load_root()?.current_context.is_empty() {
            return Err(Error::NoCurrentContext);
        }
        self.set_current("")
    }

    fn current_name(&self) -> Result<String> {
        let current = self.load_root()?.current_context;
        if current.is_empty() {
            return Err(Error::NoCurrentContext);
        }
        Ok(current)
    }

    /// Set `key` on the current context, keeping every other key.
    pub fn update(&self, key: &str, value: &str) -> Result<()> {
        if key == KEY_API_URL {
            validate_api_url(value)?;
        }
        let name = self.current_name()?;
        let mut cf = self.read(&name)?;
        cf.set(key, value);
        write_yaml(&self.context_path(&name), &cf)
    }

    /// Remove `key` from the current context.
    pub fn remove_key(&self, key: &str) -> Result<()> {
        let name = self.current_name()?;
        let mut cf = self.read(&name)?;
        if cf.remove(key).is_none() {
            return Err(Error::ContextKeyMissing {
                key: key.to_owned(),
            });
        }
        write_yaml(&self.context_path(&name), &cf)
    }

    /// All contexts, sorted by name.
    pub fn list(&self) -> Result<Vec<ContextInfo>> {
        let dir = self.contexts_dir();
        let current = self.load_root()?.current_context;
        let entries = std::fs::read_dir(&dir).map_err(|e| Error::ConfigRead {
            path: dir.clone(),
            source: e,
        })?;

        let mut out = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| Error::ConfigRead {
                    path: dir.clone(),
                    source: e,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(CONTEXT_EXT) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            let cf: ContextFile = read_yaml(&path)?;
            out.push(ContextInfo {
                current: name == current,
                provider: cf.provider(),
                api_url: cf.api_url().unwrap_or_default(),
                registry: cf.registry().unwrap_or_default(),
                name,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

fn create_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path).map_err(|e| Error::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return serde_yaml::from_str("{}").map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        });
    }
    serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn to_yaml<T: Serialize>(path: &Path, value: &T) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = to_yaml(path, value)?;
    std::fs::write(path, content).map_err(|e| Error::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write to a temp file next to `path`, then rename it over `path`.
fn atomic_write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = to_yaml(path, value)?;
    let dir = path.parent().unwrap_or(Path::new("."));
    let write_err = |e: std::io::Error| Error::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
