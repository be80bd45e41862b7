//! The container engine as a build, push and run backend.

use std::collections::BTreeMap;
use std::path::Path;

use fn_core::ContainerEngine;

use crate::error::{Error, ExecError, Result};
use crate::executor::{ContainerExecutor, OutputMode, RealExecutor};

/// Oldest docker server able to run multi-stage builds.
pub const MIN_DOCKER_VERSION: &str = "17.5.0";

/// App name injected into locally run test containers.
pub const TEST_APP_NAME: &str = "myapp";

/// One `build` invocation.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub dir: &'a Path,
    pub image: &'a str,
    pub dockerfile: &'a Path,
    pub build_args: &'a [String],
    pub no_cache: bool,
    pub verbose: bool,
}

/// One `run` of a function image with a test payload.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub image: &'a str,
    pub fn_name: &'a str,
    pub memory: u64,
    pub config: &'a BTreeMap<String, String>,
}

pub struct Builder<E: ContainerExecutor = RealExecutor> {
    executor: E,
    engine: ContainerEngine,
}

impl Builder<RealExecutor> {
    pub fn new(engine: ContainerEngine) -> Self {
        Self {
            executor: RealExecutor::new(engine.program()),
            engine,
        }
    }
}

impl<E: ContainerExecutor> Builder<E> {
    pub fn with_executor(executor: E, engine: ContainerEngine) -> Self {
        Self { executor, engine }
    }

    pub fn engine(&self) -> ContainerEngine {
        self.engine
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    // ── Version ──

    /// Refuse docker servers older than [`MIN_DOCKER_VERSION`]. Other
    /// engines only need to answer.
    pub async fn check_version(&self) -> Result<()> {
        let engine = self.engine.program().to_owned();
        let out = self
            .executor
            .exec(&args(["version", "--format", "{{.Server.Version}}"]))
            .await
            .map_err(|e| Error::EngineUnavailable {
                engine: engine.clone(),
                source: e,
            })?;

        let version = parse_engine_version(&out).map_err(|e| Error::EngineVersion {
            engine: engine.clone(),
            version: out.trim().to_owned(),
            source: e,
        })?;
        tracing::debug!(%engine, %version, "container engine version");

        if self.engine == ContainerEngine::Docker {
            let minimum = semver::Version::new(17, 5, 0);
            if version < minimum {
                return Err(Error::EngineTooOld {
                    found: version.to_string(),
                    minimum: MIN_DOCKER_VERSION.to_owned(),
                });
            }
        }
        Ok(())
    }

    // ── Build ──

    pub async fn build(&self, req: &BuildRequest<'_>) -> Result<()> {
        eprint!("Building image {} ", req.image);
        if req.verbose {
            eprintln!();
        }
        let argv = build_args(req);
        tracing::debug!(args = ?argv, "container build");

        let result = self
            .executor
            .exec_streaming(&argv, req.dir, OutputMode::from_verbose(req.verbose))
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e @ ExecError::Cancelled { .. }) => Err(Error::Build {
                engine: self.engine.program().to_owned(),
                source: e,
            }),
            Err(e) => {
                if !req.verbose {
                    println!(
                        "Error during build. Run with `--verbose` flag to see what went wrong. eg: `fn --verbose CMD`"
                    );
                }
                Err(Error::Build {
                    engine: self.engine.program().to_owned(),
                    source: e,
                })
            }
        }
    }

    // ── Push ──

    /// Push `image` after checking it names an owner and a tag.
    pub async fn push(&self, image: &str, dir: &Path) -> Result<()> {
        fn_core::image::validate_full_image_name(image)?;
        println!("Pushing {image} to docker registry...");
        self.executor
            .exec_streaming(&args(["push", image]), dir, OutputMode::Verbose)
            .await
            .map_err(|e| Error::Push {
                engine: self.engine.program().to_owned(),
                source: e,
            })
    }

    // ── Run ──

    /// Run `req.image` once with `input` on stdin and return its stdout.
    pub async fn run(&self, req: &RunRequest<'_>, input: &[u8]) -> Result<String> {
        self.executor
            .exec_with_stdin(&run_args(req), input)
            .await
            .map_err(|e| Error::Run {
                engine: self.engine.program().to_owned(),
                source: e,
            })
    }
}

/// Argument list for `<engine> build`.
pub fn build_args(req: &BuildRequest<'_>) -> Vec<String> {
    let dockerfile = req.dockerfile.to_string_lossy().into_owned();
    let mut argv = args(["build", "-t", req.image, "-f", dockerfile.as_str()]);
    if req.no_cache {
        argv.push("--no-cache".to_owned());
    }
    for arg in req.build_args {
        argv.push("--build-arg".to_owned());
        argv.push(arg.clone());
    }
    argv.extend(args([
        "--build-arg",
        "HTTP_PROXY",
        "--build-arg",
        "HTTPS_PROXY",
        ".",
    ]));
    argv
}

/// Argument list for `<engine> run` of a function under test.
pub fn run_args(req: &RunRequest<'_>) -> Vec<String> {
    let mut argv = args(["run", "--rm", "-i"]);
    argv.push(format!("--memory={}m", req.memory));
    for env in [
        "FN_TYPE=sync".to_owned(),
        "FN_FORMAT=default".to_owned(),
        format!("FN_APP_NAME={TEST_APP_NAME}"),
        format!("FN_FN_NAME={}", req.fn_name),
        format!("FN_MEMORY={}", req.memory),
    ] {
        argv.push("-e".to_owned());
        argv.push(env);
    }
    for (k, v) in req.config {
        argv.push("-e".to_owned());
        argv.push(format!("{k}={v}"));
    }
    argv.push(req.image.to_owned());
    argv
}

/// Parse an engine version such as `17.05.0-ce` or `24.0.7`.
///
/// Trailing non-numeric suffixes are dropped, leading zeros per component
/// are normalized and missing components count as zero.
pub fn parse_engine_version(raw: &str) -> std::result::Result<semver::Version, semver::Error> {
    let trimmed = raw
        .trim()
        .trim_end_matches(|c: char| c != '.' && !c.is_ascii_digit());
    let mut parts: Vec<String> = trimmed
        .split('.')
        .take(3)
        .map(|p| {
            let digits = p.trim_start_matches('0');
            if digits.is_empty() {
                "0".to_owned()
            } else {
                digits.to_owned()
            }
        })
        .collect();
    while parts.len() < 3 {
        parts.push("0".to_owned());
    }
    semver::Version::parse(&parts.join("."))
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
