use std::collections::{BTreeMap, HashMap};

pub const ENV_FN_REGISTRY: &str = "FN_REGISTRY";
pub const ENV_FN_API_URL: &str = "FN_API_URL";
pub const ENV_FN_CONTEXT: &str = "FN_CONTEXT";
pub const ENV_FN_TOKEN: &str = "FN_TOKEN";

/// Read-only view of environment variables.
///
/// Production code uses [`ProcessEnv`]; tests pass a map so nothing
/// mutates the process environment.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;

    /// Like [`EnvSource::var`], but empty values count as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        // arch-lint: allow(no-silent-result-drop) reason="unset and non-unicode variables both read as absent"
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: EnvSource + ?Sized> EnvSource for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

impl<T: EnvSource + ?Sized> EnvSource for std::sync::Arc<T> {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}
