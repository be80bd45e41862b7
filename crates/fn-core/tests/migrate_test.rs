use fn_core::migrate::migrate_dir;
use fn_core::{load_func_file, Error, Trigger};
use tempfile::TempDir;

const LEGACY: &str = "name: hello\nversion: 0.0.1\nruntime: go\npath: /hello\n";

#[test]
fn migration_injects_trigger_and_backs_up_bytes() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("func.yaml"), LEGACY).unwrap();

    let migrated = migrate_dir(tmp.path()).unwrap();
    assert_eq!(migrated.backup, tmp.path().join("func.yaml.bak"));

    let backup = std::fs::read_to_string(&migrated.backup).unwrap();
    assert_eq!(backup, LEGACY);

    let (_, ff) = load_func_file(tmp.path()).unwrap();
    assert_eq!(ff.schema_version, 20180708);
    assert_eq!(ff.name, "hello");
    assert_eq!(ff.version, "0.0.1");
    assert_eq!(ff.runtime, "go");
    assert_eq!(
        ff.triggers,
        vec![Trigger {
            name: "hello".into(),
            kind: "http".into(),
            source: "/hello".into(),
        }]
    );

    let written = std::fs::read_to_string(tmp.path().join("func.yaml")).unwrap();
    assert!(!written.contains("path:"));
}

#[test]
fn current_manifest_is_not_migrated_again() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("func.yaml"), LEGACY).unwrap();
    migrate_dir(tmp.path()).unwrap();

    let err = migrate_dir(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::AlreadyMigrated { .. }));
}

#[test]
fn undecodable_legacy_manifest_keeps_original_and_backup() {
    let tmp = TempDir::new().unwrap();
    let original = "name: hello\nversion: 0.0.1\nruntime: go\ntimeout: 40000000000\n";
    std::fs::write(tmp.path().join("func.yaml"), original).unwrap();

    assert!(migrate_dir(tmp.path()).is_err());
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("func.yaml")).unwrap(),
        original
    );
    assert!(tmp.path().join("func.yaml.bak").exists());
}
