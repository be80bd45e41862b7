use std::collections::HashMap;

use fn_core::{ContextStore, Error};
use tempfile::TempDir;

fn store() -> (TempDir, ContextStore) {
    let home = TempDir::new().unwrap();
    let store = ContextStore::open(home.path());
    store.ensure(&HashMap::<String, String>::new()).unwrap();
    (home, store)
}

#[test]
fn first_use_creates_default_context_and_root_config() {
    let (home, store) = store();

    assert!(home.path().join(".fn/contexts/default.yaml").exists());
    let rc = store.load_root().unwrap();
    assert_eq!(rc.current_context, "default");
    assert_eq!(rc.container_engine.program(), "docker");

    let default = store.read("default").unwrap();
    assert_eq!(default.api_url().as_deref(), Some("http://localhost:8080"));
}

#[test]
fn context_lifecycle() {
    let (home, store) = store();

    store
        .create("mycontext", "default", "http://host:8080/v2", "")
        .unwrap();
    let listed = store.list().unwrap();
    assert_eq!(listed.iter().filter(|c| c.name == "mycontext").count(), 1);

    store.use_context("mycontext").unwrap();
    let config = std::fs::read_to_string(home.path().join(".fn/config.yaml")).unwrap();
    assert!(config.contains("current-context: mycontext"));

    let err = store.delete("mycontext").unwrap_err();
    assert_eq!(err.to_string(), "can not delete the current context: mycontext");

    store.unset().unwrap();
    assert_eq!(store.load_root().unwrap().current_context, "");

    store.delete("mycontext").unwrap();
    assert!(store.list().unwrap().iter().all(|c| c.name != "mycontext"));
}

#[test]
fn create_refuses_duplicates_and_bad_input() {
    let (_home, store) = store();

    assert!(matches!(
        store.create("default", "default", "", ""),
        Err(Error::ContextExists { .. })
    ));
    assert!(matches!(
        store.create("bad name!", "default", "", ""),
        Err(Error::InvalidContextName { .. })
    ));
    assert!(matches!(
        store.create("nourl", "default", "localhost:8080", ""),
        Err(Error::InvalidApiUrl { .. })
    ));
}

#[test]
fn default_context_cannot_be_deleted() {
    let (_home, store) = store();
    store.create("other", "default", "", "").unwrap();
    store.use_context("other").unwrap();

    assert!(matches!(
        store.delete("default"),
        Err(Error::DeleteDefaultContext)
    ));
}

#[test]
fn use_refuses_the_current_context() {
    let (_home, store) = store();
    assert!(matches!(
        store.use_context("default"),
        Err(Error::ContextInUse { .. })
    ));
}

#[test]
fn unset_without_current_fails() {
    let (_home, store) = store();
    store.unset().unwrap();
    assert!(matches!(store.unset(), Err(Error::NoCurrentContext)));
}

#[test]
fn update_touches_only_the_named_key() {
    let (_home, store) = store();

    store.update("registry", "me").unwrap();
    store.update("oracle.compartment-id", "ocid1.compartment").unwrap();
    let cf = store.read("default").unwrap();
    assert_eq!(cf.registry().as_deref(), Some("me"));
    assert_eq!(cf.api_url().as_deref(), Some("http://localhost:8080"));

    assert!(store.update("api-url", "nope").is_err());

    store.remove_key("oracle.compartment-id").unwrap();
    assert!(!store.read("default").unwrap().contains("oracle.compartment-id"));
    assert!(matches!(
        store.remove_key("oracle.compartment-id"),
        Err(Error::ContextKeyMissing { .. })
    ));
}

#[test]
fn resolve_prefers_flag_then_env_then_pointer() {
    let (_home, store) = store();
    store.create("a", "default", "http://a:8080", "").unwrap();
    store.create("b", "default", "http://b:8080", "").unwrap();

    let env = HashMap::from([("FN_CONTEXT".to_owned(), "b".to_owned())]);
    assert_eq!(store.resolve(Some("a"), &env).unwrap().name, "a");
    assert_eq!(store.resolve(None, &env).unwrap().name, "b");
    assert_eq!(
        store
            .resolve(None, &HashMap::<String, String>::new())
            .unwrap()
            .name,
        "default"
    );
}

#[test]
fn missing_selected_context_falls_back_to_default() {
    let (_home, store) = store();
    let active = store
        .resolve(Some("ghost"), &HashMap::<String, String>::new())
        .unwrap();
    assert_eq!(active.name, "default");
    assert!(active.reset_to_default);
    assert_eq!(store.load_root().unwrap().current_context, "default");
}
