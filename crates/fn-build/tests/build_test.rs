use std::path::Path;

use fn_build::error::{Error, ExecError};
use fn_build::executor::{ContainerExecutor, OutputMode};
use fn_build::langs::{PhpHelper, Registry};
use fn_build::pipeline::{build_function, stamp_images, BuildOptions};
use fn_build::server::build_server;
use fn_build::Builder;
use fn_core::{load_func_file, store_func_file, ContainerEngine, FuncFile};
use mockall::mock;
use tempfile::TempDir;

mock! {
    Executor {}

    impl ContainerExecutor for Executor {
        fn program(&self) -> &str;
        async fn exec(&self, args: &[String]) -> Result<String, ExecError>;
        async fn exec_streaming(
            &self,
            args: &[String],
            dir: &Path,
            mode: OutputMode,
        ) -> Result<(), ExecError>;
        async fn exec_with_stdin(
            &self,
            args: &[String],
            stdin_data: &[u8],
        ) -> Result<String, ExecError>;
    }
}

fn php_function() -> FuncFile {
    FuncFile {
        schema_version: 20180708,
        name: "hello".to_owned(),
        version: "0.0.3".to_owned(),
        runtime: "php".to_owned(),
        ..Default::default()
    }
}

fn php_registry() -> Registry {
    Registry::from_helpers(vec![Box::new(PhpHelper)])
}

fn expect_version(mock: &mut MockExecutor, version: &'static str) {
    mock.expect_exec()
        .withf(|args| args.first().map(String::as_str) == Some("version"))
        .times(1)
        .returning(move |_| Ok(format!("{version}\n")));
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

// ── Build Tests ──

#[tokio::test]
async fn build_uses_the_user_dockerfile() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    let expected = tmp.path().join("Dockerfile").display().to_string();

    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "24.0.7");
    mock.expect_exec_streaming()
        .withf(move |args, _dir, mode| {
            args.first().map(String::as_str) == Some("build")
                && flag_value(args, "-t") == Some("me/hello:0.0.3")
                && flag_value(args, "-f") == Some(expected.as_str())
                && *mode == OutputMode::Quiet
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    let ff = FuncFile {
        runtime: "docker".to_owned(),
        ..php_function()
    };
    let opts = BuildOptions {
        registry: Some("me"),
        ..Default::default()
    };
    let image = build_function(&builder, &php_registry(), tmp.path(), &ff, &opts)
        .await
        .unwrap();
    assert_eq!(image, "me/hello:0.0.3");
}

#[tokio::test]
async fn docker_runtime_requires_a_dockerfile() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "24.0.7");
    mock.expect_exec_streaming().never();

    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    let ff = FuncFile {
        runtime: "docker".to_owned(),
        ..php_function()
    };
    let err = build_function(&builder, &php_registry(), tmp.path(), &ff, &BuildOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DockerfileRequired { .. }));
    assert_eq!(
        err.to_string(),
        "Dockerfile does not exist for 'docker' runtime"
    );
}

#[tokio::test]
async fn unknown_runtime_has_no_helper() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "24.0.7");

    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    let ff = FuncFile {
        runtime: "cobol".to_owned(),
        ..php_function()
    };
    let err = build_function(&builder, &php_registry(), tmp.path(), &ff, &BuildOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot build, no language helper found for cobol"
    );
}

#[tokio::test]
async fn synthesized_dockerfile_is_temporary() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "24.0.7");
    mock.expect_exec_streaming()
        .withf(|args, _dir, _mode| args.first().map(String::as_str) == Some("build"))
        .times(1)
        .returning(|args, dir, _| {
            let dockerfile = flag_value(args, "-f").unwrap_or_default().to_owned();
            let path = Path::new(&dockerfile);
            assert_eq!(path.parent(), Some(dir));
            let content = std::fs::read_to_string(path).unwrap();
            assert!(content.starts_with("FROM fnproject/php:dev\n"));
            assert!(content.contains("ENTRYPOINT [\"php\", \"func.php\"]"));
            Ok(())
        });

    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    build_function(
        &builder,
        &php_registry(),
        tmp.path(),
        &php_function(),
        &BuildOptions::default(),
    )
    .await
    .unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn pre_build_engine_command_runs_before_the_build() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("composer.json"), "{}").unwrap();

    let mut seq = mockall::Sequence::new();
    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "24.0.7");
    mock.expect_exec_streaming()
        .withf(|args, _dir, _mode| args.contains(&"composer".to_owned()))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));
    mock.expect_exec_streaming()
        .withf(|args, _dir, _mode| args.first().map(String::as_str) == Some("build"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));

    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    build_function(
        &builder,
        &php_registry(),
        tmp.path(),
        &php_function(),
        &BuildOptions::default(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn old_docker_is_refused() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "17.03.1-ce");
    mock.expect_exec_streaming().never();

    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    let err = build_function(
        &builder,
        &php_registry(),
        tmp.path(),
        &php_function(),
        &BuildOptions::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "please upgrade your version of Docker to 17.5.0 or greater"
    );
}

#[tokio::test]
async fn podman_skips_the_minimum_version() {
    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "4.9.3");
    let builder = Builder::with_executor(mock, ContainerEngine::Podman);
    builder.check_version().await.unwrap();
}

#[tokio::test]
async fn unreachable_engine_is_reported() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|args| {
        Err(ExecError::CommandFailed {
            program: "docker".to_owned(),
            args: args.to_vec(),
            stderr: "Cannot connect to the Docker daemon".to_owned(),
        })
    });
    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    let err = builder.check_version().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot connect to the docker, make sure you have it installed and running"
    );
}

#[tokio::test]
async fn failed_build_wraps_the_engine_error() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "24.0.7");
    mock.expect_exec_streaming().returning(|args, _, _| {
        Err(ExecError::CommandFailed {
            program: "docker".to_owned(),
            args: args.to_vec(),
            stderr: "exit code: 1".to_owned(),
        })
    });

    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    let err = build_function(
        &builder,
        &php_registry(),
        tmp.path(),
        &php_function(),
        &BuildOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().starts_with("error running docker build: "));
    assert!(!err.is_cancelled());
}

// ── Push Tests ──

#[tokio::test]
async fn push_rejects_images_without_owner() {
    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming().never();
    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    assert!(builder.push("hello:0.0.1", Path::new(".")).await.is_err());
}

#[tokio::test]
async fn push_failure_asks_about_login() {
    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming()
        .withf(|args, _, mode| {
            args.to_vec() == vec!["push".to_owned(), "me/hello:0.0.1".to_owned()]
                && *mode == OutputMode::Verbose
        })
        .returning(|args, _, _| {
            Err(ExecError::CommandFailed {
                program: "docker".to_owned(),
                args: args.to_vec(),
                stderr: "denied".to_owned(),
            })
        });
    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    let err = builder
        .push("me/hello:0.0.1", Path::new("."))
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("error running docker push, are you logged?: "));
}

// ── Image Stamping Tests ──

#[tokio::test]
async fn stamping_pins_helper_images_into_the_manifest() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("func.yaml");
    let mut ff = php_function();
    store_func_file(&path, &ff).unwrap();

    assert!(stamp_images(&php_registry(), &path, &mut ff).await.unwrap());
    let (_, stored) = load_func_file(tmp.path()).unwrap();
    assert_eq!(stored.build_image, "fnproject/php:dev");
    // single stage
    assert!(stored.run_image.is_empty());
}

#[tokio::test]
async fn stamping_leaves_dockerfile_functions_alone() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    let path = tmp.path().join("func.yaml");
    let mut ff = php_function();
    store_func_file(&path, &ff).unwrap();

    assert!(!stamp_images(&php_registry(), &path, &mut ff).await.unwrap());
    assert!(ff.build_image.is_empty());
}

#[tokio::test]
async fn stamping_an_unknown_runtime_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("func.yaml");
    let mut ff = FuncFile {
        runtime: "cobol".to_owned(),
        ..php_function()
    };
    let err = stamp_images(&php_registry(), &path, &mut ff)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "runtime [cobol] is not supported");
}

// ── Server Build Tests ──

#[tokio::test]
async fn build_server_requires_a_tag() {
    let tmp = TempDir::new().unwrap();
    let mock = MockExecutor::new();
    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    let err = build_server(&builder, tmp.path(), "", false, false)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Docker tag required");
}

#[tokio::test]
async fn build_server_builds_from_tmp() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("ext.yaml"),
        "extensions:\n  - name: github.com/me/ext\n",
    )
    .unwrap();
    let build_dir = tmp.path().join("tmp");
    let expected_dir = build_dir.clone();

    let mut mock = MockExecutor::new();
    expect_version(&mut mock, "24.0.7");
    mock.expect_exec_streaming()
        .withf(move |args, dir, _| {
            dir.as_os_str() == expected_dir.as_os_str()
                && flag_value(args, "-t") == Some("me/fnserver:custom")
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let builder = Builder::with_executor(mock, ContainerEngine::Docker);
    build_server(&builder, tmp.path(), "me/fnserver:custom", false, false)
        .await
        .unwrap();
    assert!(build_dir.join("main.go").exists());
}
