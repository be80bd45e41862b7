use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// `fn` with a private home directory and none of the caller's FN_* settings.
fn fn_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fn");
    cmd.env("HOME", home.path())
        .env_remove("FN_CONTEXT")
        .env_remove("FN_REGISTRY")
        .env_remove("FN_API_URL")
        .env_remove("FN_TOKEN")
        .env_remove("OCI_CLI_AUTH");
    cmd
}

// ── Help / Version ──

#[test]
fn shows_help() {
    let home = TempDir::new().unwrap();
    fn_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build, deploy and manage functions"));
}

#[test]
fn shows_version() {
    let home = TempDir::new().unwrap();
    fn_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fn"));
}

#[test]
fn version_without_a_server_prints_a_placeholder() {
    let home = TempDir::new().unwrap();
    fn_cmd(&home)
        .env("FN_API_URL", "http://127.0.0.1:9")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Client version:"))
        .stdout(predicate::str::contains("Server version: ?"));
}

// ── Init ──

#[test]
fn init_writes_a_go_function() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    fn_cmd(&home)
        .current_dir(work.path())
        .env("FN_GO_FDK_VERSION", "v0.0.42")
        .args(["init", "--runtime", "go", "--trigger", "http", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Creating function at: ./hello"))
        .stdout(predicate::str::contains("func.yaml created."));

    let dir = work.path().join("hello");
    let manifest = std::fs::read_to_string(dir.join("func.yaml")).unwrap();
    assert!(manifest.contains("schema_version: 20180708"));
    assert!(manifest.contains("name: hello"));
    assert!(manifest.contains("runtime: go"));
    assert!(manifest.contains("source: /hello"));
    assert!(dir.join("func.go").exists());
}

#[test]
fn init_refuses_to_overwrite_a_manifest() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("func.yaml"), "schema_version: 20180708\nname: x\n").unwrap();

    fn_cmd(&home)
        .current_dir(work.path())
        .args(["init", "--runtime", "go"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Function file already exists, aborting"));
}

#[test]
fn init_rejects_uppercase_names() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    fn_cmd(&home)
        .current_dir(work.path())
        .args(["init", "--runtime", "go", "--name", "Hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lowercase"));
}

#[test]
fn init_docker_runtime_needs_a_dockerfile() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    fn_cmd(&home)
        .current_dir(work.path())
        .args(["init", "--runtime", "docker"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Dockerfile does not exist"));
}

// ── Bump / Migrate ──

#[test]
fn bump_increments_the_patch_version() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::write(
        work.path().join("func.yaml"),
        "schema_version: 20180708\nname: hello\nversion: 0.0.1\nruntime: go\n",
    )
    .unwrap();

    fn_cmd(&home)
        .current_dir(work.path())
        .arg("bump")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bumped to version 0.0.2"));

    fn_cmd(&home)
        .current_dir(work.path())
        .args(["bump", "--major"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bumped to version 1.0.0"));
}

#[test]
fn migrate_upgrades_a_legacy_manifest() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let legacy = "name: hello\nversion: 0.0.1\nruntime: go\npath: /hello\n";
    std::fs::write(work.path().join("func.yaml"), legacy).unwrap();

    fn_cmd(&home)
        .current_dir(work.path())
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully migrated"));

    let backup = std::fs::read_to_string(work.path().join("func.yaml.bak")).unwrap();
    assert_eq!(backup, legacy);
    let manifest = std::fs::read_to_string(work.path().join("func.yaml")).unwrap();
    assert!(manifest.contains("schema_version: 20180708"));
    assert!(manifest.contains("triggers:"));

    fn_cmd(&home)
        .current_dir(work.path())
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("do not need to migrate"));
}

// ── Contexts ──

#[test]
fn context_lifecycle() {
    let home = TempDir::new().unwrap();

    fn_cmd(&home)
        .args(["create", "context", "staging", "--api-url", "http://fn.example.com:8080"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully created context: staging"));

    fn_cmd(&home)
        .args(["create", "context", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Context already exists: staging"));

    fn_cmd(&home)
        .args(["use", "context", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Now using context: staging"));

    fn_cmd(&home)
        .args(["update", "context", "registry", "acme"])
        .assert()
        .success();

    fn_cmd(&home)
        .args(["list", "contexts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("staging"))
        .stdout(predicate::str::contains("acme"));

    fn_cmd(&home)
        .args(["inspect", "context"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current context: staging"))
        .stdout(predicate::str::contains("api-url: http://fn.example.com:8080"));

    fn_cmd(&home)
        .args(["delete", "context", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("can not delete the current context: staging"));

    fn_cmd(&home)
        .args(["use", "context", "default"])
        .assert()
        .success();

    fn_cmd(&home)
        .args(["delete", "context", "staging"])
        .assert()
        .success();

    fn_cmd(&home)
        .args(["delete", "context", "default"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("can not delete the current context: default"));
}

#[test]
fn context_names_are_validated() {
    let home = TempDir::new().unwrap();
    fn_cmd(&home)
        .args(["create", "context", "bad name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only Alphanumeric"));
}

#[test]
fn unset_twice_fails() {
    let home = TempDir::new().unwrap();
    fn_cmd(&home).args(["unset", "context"]).assert().success();
    fn_cmd(&home)
        .args(["unset", "context"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no context currently in use"));
}

// ── Deploy ──

#[test]
fn deploy_without_an_app_name_fails_early() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::write(
        work.path().join("func.yaml"),
        "schema_version: 20180708\nname: hello\nversion: 0.0.1\nruntime: go\n",
    )
    .unwrap();

    fn_cmd(&home)
        .current_dir(work.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("App name must be provided, try `--app APP_NAME`"));
}

#[test]
fn deploy_all_checks_for_functions_before_contacting_the_server() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("app.yaml"), "name: myapp\n").unwrap();

    fn_cmd(&home)
        .current_dir(work.path())
        .env("FN_API_URL", "http://127.0.0.1:9")
        .args(["deploy", "--all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no functions found to deploy"));
}
