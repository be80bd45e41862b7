use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fn_cloud::api::{FnApi, InvokeRequest, InvokeResponse};
use fn_cloud::client::{AppChange, FnChange, FnClient, MAX_UPDATE_ATTEMPTS, Upsert};
use fn_cloud::models::{App, Function, ListQuery, Page, Tagged, Trigger};
use fn_cloud::{Error, Result};
use mockall::mock;

mock! {
    Api {}

    #[async_trait]
    impl FnApi for Api {
        async fn list_apps(&self, query: ListQuery) -> Result<Page<App>>;
        async fn get_app(&self, id: &str) -> Result<App>;
        async fn create_app(&self, app: &App) -> Result<App>;
        async fn update_app(&self, id: &str, app: &App) -> Result<App>;
        async fn delete_app(&self, id: &str) -> Result<()>;

        async fn list_fns(&self, query: ListQuery) -> Result<Page<Function>>;
        async fn get_fn(&self, id: &str) -> Result<Tagged<Function>>;
        async fn create_fn(&self, f: &Function) -> Result<Function>;
        async fn update_fn(&self, id: &str, f: &Function, if_match: Option<String>) -> Result<Function>;
        async fn delete_fn(&self, id: &str) -> Result<()>;

        async fn list_triggers(&self, query: ListQuery) -> Result<Page<Trigger>>;
        async fn get_trigger(&self, id: &str) -> Result<Trigger>;
        async fn create_trigger(&self, t: &Trigger) -> Result<Trigger>;
        async fn update_trigger(&self, id: &str, t: &Trigger) -> Result<Trigger>;
        async fn delete_trigger(&self, id: &str) -> Result<()>;

        async fn invoke(&self, url: &str, req: &InvokeRequest) -> Result<InvokeResponse>;
        async fn server_version(&self) -> Result<String>;
    }
}

fn app(name: &str) -> App {
    App {
        id: format!("{name}-id"),
        name: name.to_owned(),
        ..Default::default()
    }
}

fn apps_page(range: std::ops::RangeInclusive<u32>, next: &str) -> Page<App> {
    Page {
        items: range.map(|i| app(&format!("app{i}"))).collect(),
        next_cursor: next.to_owned(),
    }
}

fn config(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn existing_fn() -> Function {
    Function {
        id: "fn-id".to_owned(),
        name: "hello".to_owned(),
        app_id: "myapp-id".to_owned(),
        image: "acme/hello:0.0.1".to_owned(),
        config: config(&[("A", "1"), ("B", "2")]),
        ..Default::default()
    }
}

fn expect_fn_lookup(mock: &mut MockApi) {
    mock.expect_list_fns()
        .withf(|q| q.app_id.as_deref() == Some("myapp-id") && q.name.as_deref() == Some("hello"))
        .returning(|_| {
            Ok(Page {
                items: vec![existing_fn()],
                next_cursor: String::new(),
            })
        });
}

// ── Listing ──

#[tokio::test]
async fn list_stops_at_the_cap_without_fetching_more_pages() {
    let mut mock = MockApi::new();
    mock.expect_list_apps()
        .times(2)
        .returning(|q| match q.cursor.as_deref() {
            None => Ok(apps_page(1..=3, "c2")),
            Some("c2") => Ok(apps_page(4..=6, "c3")),
            other => panic!("unexpected page request {other:?}"),
        });

    let client = FnClient::new(mock);
    let apps = client.list_apps(Some(5)).await.unwrap();

    let names: Vec<_> = apps.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["app1", "app2", "app3", "app4", "app5"]);
}

#[tokio::test]
async fn list_without_cap_follows_cursors_to_the_end() {
    let mut mock = MockApi::new();
    mock.expect_list_apps()
        .times(3)
        .returning(|q| match q.cursor.as_deref() {
            None => Ok(apps_page(1..=3, "c2")),
            Some("c2") => Ok(apps_page(4..=6, "c3")),
            Some("c3") => Ok(apps_page(7..=9, "")),
            other => panic!("unexpected page request {other:?}"),
        });

    let client = FnClient::new(mock);
    assert_eq!(client.list_apps(None).await.unwrap().len(), 9);
}

#[tokio::test]
async fn list_requests_full_pages() {
    let mut mock = MockApi::new();
    mock.expect_list_fns()
        .withf(|q| q.per_page == 100 && q.app_id.as_deref() == Some("myapp-id"))
        .times(1)
        .returning(|_| Ok(Page::default()));

    let client = FnClient::new(mock);
    assert!(client.list_fns("myapp-id", Some(100)).await.unwrap().is_empty());
}

// ── Apps ──

#[tokio::test]
async fn missing_app_is_not_found_unless_created() {
    let mut mock = MockApi::new();
    mock.expect_list_apps().returning(|_| Ok(Page::default()));

    let client = FnClient::new(mock);
    let err = client
        .ensure_app("myapp", &AppChange::default(), false)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "app myapp not found");
}

#[tokio::test]
async fn missing_app_is_created_with_manifest_config() {
    let mut mock = MockApi::new();
    mock.expect_list_apps().returning(|_| Ok(Page::default()));
    mock.expect_create_app()
        .withf(|a| a.name == "myapp" && a.config.get("LOG").map(String::as_str) == Some("debug"))
        .times(1)
        .returning(|a| {
            Ok(App {
                id: "new-id".to_owned(),
                ..a.clone()
            })
        });

    let client = FnClient::new(mock);
    let change = AppChange {
        config: config(&[("LOG", "debug")]),
        ..Default::default()
    };
    let (created, outcome) = client.ensure_app("myapp", &change, true).await.unwrap();
    assert_eq!(outcome, Upsert::Created);
    assert_eq!(created.id, "new-id");
}

#[tokio::test]
async fn recursive_delete_removes_children_first() {
    let mut seq = mockall::Sequence::new();
    let mut mock = MockApi::new();
    mock.expect_delete_trigger()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    mock.expect_delete_fn()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    mock.expect_delete_app()
        .withf(|id| id == "myapp-id")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let client = FnClient::new(mock);
    let contents = fn_cloud::AppContents {
        app: app("myapp"),
        fns: vec![existing_fn()],
        triggers: vec![Trigger {
            id: "t-id".to_owned(),
            ..Default::default()
        }],
    };
    client.delete_app_recursive(&contents).await.unwrap();
}

// ── Functions ──

#[tokio::test]
async fn config_update_merges_and_deletes_empty_values() {
    let mut mock = MockApi::new();
    expect_fn_lookup(&mut mock);
    mock.expect_get_fn().returning(|_| {
        Ok(Tagged {
            value: existing_fn(),
            etag: Some("e1".to_owned()),
        })
    });
    mock.expect_update_fn()
        .withf(|id, f, etag| {
            id == "fn-id" && f.config == config(&[("A", "1")]) && etag.as_deref() == Some("e1")
        })
        .times(1)
        .returning(|_, f, _| Ok(f.clone()));

    let client = FnClient::new(mock);
    let change = FnChange {
        config: config(&[("B", "")]),
        ..Default::default()
    };
    let (f, outcome) = client.put_fn(&app("myapp"), "hello", &change).await.unwrap();
    assert_eq!(outcome, Upsert::Updated);
    assert_eq!(f.config, config(&[("A", "1")]));
    assert_eq!(f.image, "acme/hello:0.0.1");
}

#[tokio::test]
async fn concurrent_modification_is_retried_with_a_fresh_etag() {
    let reads = AtomicUsize::new(0);
    let mut mock = MockApi::new();
    expect_fn_lookup(&mut mock);
    mock.expect_get_fn().times(2).returning(move |_| {
        let n = reads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Tagged {
            value: existing_fn(),
            etag: Some(format!("e{n}")),
        })
    });
    mock.expect_update_fn()
        .times(2)
        .returning(|id, f, etag| match etag.as_deref() {
            Some("e1") => Err(Error::EtagMismatch { id: id.to_owned() }),
            _ => Ok(f.clone()),
        });

    let client = FnClient::new(mock);
    let change = FnChange {
        image: Some("acme/hello:0.0.2".to_owned()),
        ..Default::default()
    };
    let (f, _) = client.put_fn(&app("myapp"), "hello", &change).await.unwrap();
    assert_eq!(f.image, "acme/hello:0.0.2");
}

#[tokio::test]
async fn retry_budget_is_bounded() {
    let mut mock = MockApi::new();
    expect_fn_lookup(&mut mock);
    mock.expect_get_fn().returning(|_| {
        Ok(Tagged {
            value: existing_fn(),
            etag: Some("stale".to_owned()),
        })
    });
    mock.expect_update_fn()
        .times(MAX_UPDATE_ATTEMPTS as usize)
        .returning(|id, _, _| Err(Error::EtagMismatch { id: id.to_owned() }));

    let client = FnClient::new(mock);
    let err = client
        .put_fn(&app("myapp"), "hello", &FnChange::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetriesExhausted { attempts: 5, .. }));
}

#[tokio::test]
async fn invalid_image_is_rejected_before_any_remote_call() {
    // No expectations: any API call would panic.
    let client = FnClient::new(MockApi::new());
    for image in ["hello:0.0.1", "acme/hello"] {
        let change = FnChange {
            image: Some(image.to_owned()),
            ..Default::default()
        };
        let err = client
            .put_fn(&app("myapp"), "hello", &change)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Image(_)), "{image}: {err}");
    }
}

#[tokio::test]
async fn missing_function_is_created_on_the_app() {
    let mut mock = MockApi::new();
    mock.expect_list_fns().returning(|_| Ok(Page::default()));
    mock.expect_create_fn()
        .withf(|f| {
            f.name == "hello"
                && f.app_id == "myapp-id"
                && f.image == "acme/hello:0.0.1"
                && f.memory == 256
                && f.config == config(&[("A", "1")])
        })
        .times(1)
        .returning(|f| {
            Ok(Function {
                id: "fn-id".to_owned(),
                ..f.clone()
            })
        });

    let client = FnClient::new(mock);
    let change = FnChange {
        image: Some("acme/hello:0.0.1".to_owned()),
        memory: Some(256),
        config: config(&[("A", "1"), ("B", "")]),
        ..Default::default()
    };
    let (_, outcome) = client.put_fn(&app("myapp"), "hello", &change).await.unwrap();
    assert_eq!(outcome, Upsert::Created);
}

#[tokio::test]
async fn remote_error_message_is_kept_verbatim() {
    let mut mock = MockApi::new();
    mock.expect_list_apps().returning(|_| {
        Err(Error::Remote {
            status: 500,
            message: "database is down".to_owned(),
        })
    });

    let client = FnClient::new(mock);
    let err = client.app_by_name("myapp").await.unwrap_err();
    assert_eq!(err.to_string(), "database is down");
}

// ── Triggers ──

#[tokio::test]
async fn trigger_is_created_with_a_leading_slash() {
    let mut mock = MockApi::new();
    mock.expect_list_triggers()
        .withf(|q| q.fn_id.as_deref() == Some("fn-id") && q.name.as_deref() == Some("hello"))
        .returning(|_| Ok(Page::default()));
    mock.expect_create_trigger()
        .withf(|t| t.source == "/hello" && t.kind == "http" && t.fn_id == "fn-id")
        .times(1)
        .returning(|t| Ok(t.clone()));

    let client = FnClient::new(mock);
    let (t, outcome) = client
        .put_trigger(&existing_fn(), "hello", "http", "hello", &BTreeMap::new())
        .await
        .unwrap();
    assert_eq!(outcome, Upsert::Created);
    assert_eq!(t.source, "/hello");
}

#[tokio::test]
async fn existing_trigger_is_updated_in_place() {
    let mut mock = MockApi::new();
    mock.expect_list_triggers().returning(|_| {
        Ok(Page {
            items: vec![Trigger {
                id: "t-id".to_owned(),
                name: "hello".to_owned(),
                kind: "http".to_owned(),
                source: "/old".to_owned(),
                ..Default::default()
            }],
            next_cursor: String::new(),
        })
    });
    mock.expect_update_trigger()
        .withf(|id, t| id == "t-id" && t.source == "/hello")
        .times(1)
        .returning(|_, t| Ok(t.clone()));

    let client = FnClient::new(mock);
    let (_, outcome) = client
        .put_trigger(&existing_fn(), "hello", "http", "/hello", &BTreeMap::new())
        .await
        .unwrap();
    assert_eq!(outcome, Upsert::Updated);
}
