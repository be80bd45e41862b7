//! Per-invocation state: the selected context and the clients built from it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use fn_build::{Builder, HttpFdkIndex, Registry};
use fn_cloud::{FnClient, HttpApi, ProviderConfig};
use fn_core::env::ENV_FN_REGISTRY;
use fn_core::{ActiveContext, ContainerEngine, ContextStore, EnvSource, ProcessEnv};

use crate::prompt::TerminalPassphrase;

/// Flags that apply to every command.
pub struct Globals {
    pub verbose: bool,
    pub context: Option<String>,
}

pub struct Session {
    pub store: ContextStore,
    pub active: ActiveContext,
    pub env: Arc<dyn EnvSource>,
    pub verbose: bool,
}

impl Session {
    /// Make sure `~/.fn` exists and pick the context for this run.
    pub fn open(g: &Globals) -> anyhow::Result<Self> {
        let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);
        let store = open_store(env.as_ref())?;
        let active = store.resolve(g.context.as_deref(), env.as_ref())?;
        if active.reset_to_default {
            eprintln!("Current context not found, using default context");
        }
        tracing::debug!(context = %active.name, "using context");
        Ok(Self {
            store,
            active,
            env,
            verbose: g.verbose,
        })
    }

    /// `--registry`, then `FN_REGISTRY`, then the context's registry.
    pub fn registry(&self, flag: Option<&str>) -> Option<String> {
        flag.filter(|r| !r.is_empty())
            .map(str::to_owned)
            .or_else(|| self.env.non_empty(ENV_FN_REGISTRY))
            .or_else(|| self.active.file.registry())
    }

    pub fn engine(&self) -> ContainerEngine {
        self.active.root.container_engine
    }

    pub fn builder(&self) -> Builder {
        Builder::new(self.engine())
    }

    pub fn helpers(&self) -> Registry {
        Registry::new(self.env.clone(), Arc::new(HttpFdkIndex::new()))
    }

    /// `FN_API_URL`, else the context's `api-url`.
    pub fn api_url(&self) -> Option<String> {
        self.provider_config(&TerminalPassphrase).api_url()
    }

    fn provider_config<'a>(
        &'a self,
        passphrase: &'a TerminalPassphrase,
    ) -> ProviderConfig<'a> {
        ProviderConfig {
            context: &self.active.name,
            file: &self.active.file,
            env: self.env.as_ref(),
            home: home_of(&self.store),
            passphrase,
        }
    }

    pub async fn client(&self) -> anyhow::Result<FnClient<HttpApi>> {
        let passphrase = TerminalPassphrase;
        let provider = self
            .provider_config(&passphrase)
            .connect()
            .await
            .with_context(|| format!("could not connect with context {}", self.active.name))?;
        tracing::debug!(provider = provider.kind.as_str(), base = %provider.api.base(), "api client ready");
        Ok(FnClient::new(provider.api))
    }

    /// Print the build environment the way verbose builds show it.
    pub fn print_build_env(&self, registry: Option<&str>) {
        if !self.verbose {
            return;
        }
        println!("FN_REGISTRY:  {}", registry.unwrap_or_default());
        println!("Current Context:  {}", self.active.name);
        println!("Container engine:  {}", self.engine().program());
    }
}

/// The context store under the user's home directory, initialized on first
/// use.
pub fn open_store(env: &dyn EnvSource) -> anyhow::Result<ContextStore> {
    let store = ContextStore::from_home()?;
    store.ensure(env)?;
    Ok(store)
}

/// `~` for the store: the parent of its `.fn` root.
fn home_of(store: &ContextStore) -> &std::path::Path {
    store.root().parent().unwrap_or(store.root())
}

/// `--working-dir` made absolute, defaulting to the current directory.
pub fn working_dir(flag: Option<&PathBuf>) -> anyhow::Result<PathBuf> {
    Ok(fn_core::paths::working_dir(flag.map(PathBuf::as_path))?)
}
