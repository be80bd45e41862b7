use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use fn_build::{BuildOptions, RunRequest};
use fn_cloud::{FnClient, HttpApi, InvokeRequest};
use fn_core::cases::{check_output, input_bytes, load_cases};
use fn_core::{walk_func_files, EnvSource, FnTest, FuncFile};

use crate::session::{working_dir, Globals, Session};

/// Memory given to a function under test that declares none.
const DEFAULT_TEST_MEMORY: u64 = 128;

#[derive(Args)]
pub struct TestArgs {
    /// Run the tests against this app on the current context's server
    #[arg(long)]
    pub remote: Option<String>,
    /// Test every function under the working directory
    #[arg(long)]
    pub all: bool,
    #[arg(long, short = 'w')]
    pub working_dir: Option<PathBuf>,
}

/// Pass/fail counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    passed: usize,
    failed: usize,
}

impl Tally {
    fn add(&mut self, other: Tally) {
        self.passed += other.passed;
        self.failed += other.failed;
    }

    fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// Where the cases run.
enum Target {
    Local,
    Remote {
        client: FnClient<HttpApi>,
        host: url::Url,
        app: String,
    },
}

pub async fn test(g: &Globals, args: TestArgs) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    let wd = working_dir(args.working_dir.as_ref())?;

    let target = match &args.remote {
        Some(app) => {
            let api_url = session
                .api_url()
                .ok_or_else(|| anyhow::anyhow!("no api-url configured for context {}", session.active.name))?;
            Target::Remote {
                client: session.client().await?,
                host: super::invoke::api_host(&api_url)?,
                app: app.clone(),
            }
        }
        None => Target::Local,
    };

    let tally = if args.all {
        let mut dirs = Vec::new();
        walk_func_files(&wd, |path, parsed| {
            parsed?;
            dirs.push(path.parent().unwrap_or(&wd).to_path_buf());
            Ok(())
        })?;

        let mut total = Tally::default();
        for dir in &dirs {
            match run_dir(&session, &target, dir).await {
                Ok(t) => total.add(t),
                Err(e) => match e.downcast_ref::<fn_core::Error>() {
                    Some(fn_core::Error::NoTests) => {
                        println!("No tests found for {}, skipping", dir.display());
                    }
                    _ => return Err(e),
                },
            }
        }
        println!("All {} tests finished.", total.total());
        println!("tests run: {} passed, {} failed", total.passed, total.failed);
        total
    } else {
        run_dir(&session, &target, &wd).await?
    };

    if tally.failed > 0 {
        anyhow::bail!("{} of {} tests failed", tally.failed, tally.total());
    }
    Ok(())
}

/// Run every case of the function in `dir` and report each one.
async fn run_dir(session: &Session, target: &Target, dir: &Path) -> anyhow::Result<Tally> {
    let (path, mut ff) = fn_core::load_func_file(dir)?;
    let cases = load_cases(dir, &ff.tests)?;

    let runner = match target {
        Target::Local => {
            let env = test_env(&ff, session.env.as_ref())?;
            let registry = session.registry(None);
            let opts = BuildOptions {
                registry: registry.as_deref(),
                verbose: session.verbose,
                ..Default::default()
            };
            let image = super::build::build_in(&session.builder(), &session.helpers(), &path, &mut ff, &opts).await?;
            println!("Running {} tests on {} (image: {image}):", cases.len(), path.display());
            Runner::Local { image, env }
        }
        Target::Remote { client, host, app } => {
            let url = remote_url(host, app, &ff)?;
            println!("Running {} tests on {} (remote: {url}):", cases.len(), path.display());
            Runner::Remote { client, url }
        }
    };

    let mut tally = Tally::default();
    for (i, case) in cases.iter().enumerate() {
        println!("Test {}", i + 1);
        let start = Instant::now();
        let outcome = runner.run(session, &ff, case).await;
        let elapsed = start.elapsed();
        match outcome {
            Ok(()) => {
                tally.passed += 1;
                println!("PASSED - {} ({})", case.name, fmt_duration(elapsed));
            }
            Err(reason) => {
                tally.failed += 1;
                println!("FAILED - {} ({})", case.name, fmt_duration(elapsed));
                println!("{reason}");
            }
        }
    }
    println!("tests run: {} passed, {} failed", tally.passed, tally.failed);
    Ok(tally)
}

enum Runner<'a> {
    Local {
        image: String,
        env: BTreeMap<String, String>,
    },
    Remote {
        client: &'a FnClient<HttpApi>,
        url: String,
    },
}

impl Runner<'_> {
    /// Run one case; `Err` carries the failure report.
    async fn run(&self, session: &Session, ff: &FuncFile, case: &FnTest) -> Result<(), String> {
        let input = input_bytes(case);
        let got = match self {
            Runner::Local { image, env } => {
                let req = RunRequest {
                    image,
                    fn_name: &ff.name,
                    memory: if ff.memory == 0 { DEFAULT_TEST_MEMORY } else { ff.memory },
                    config: env,
                };
                session.builder().run(&req, &input).await.map_err(|e| e.to_string())
            }
            Runner::Remote { client, url } => {
                let req = InvokeRequest {
                    body: input,
                    content_type: "application/json".to_owned(),
                    headers: Vec::new(),
                };
                match client.invoke(url, &req).await {
                    Ok(resp) => match resp.error_message() {
                        Some(message) => Err(message),
                        None => Ok(String::from_utf8_lossy(&resp.body).into_owned()),
                    },
                    Err(e) => Err(e.to_string()),
                }
            }
        };

        match (got, &case.err) {
            (Ok(out), _) => check_output(case.output.as_ref(), out.trim_end()).map_err(|m| m.to_string()),
            (Err(e), Some(expected)) if e.contains(expected.as_str()) => Ok(()),
            (Err(e), _) => Err(e),
        }
    }
}

/// Config passed to a local run: the manifest's config plus expected keys
/// taken from the environment. A required key missing from both fails.
fn test_env(ff: &FuncFile, env: &dyn EnvSource) -> anyhow::Result<BTreeMap<String, String>> {
    let mut out = ff.config.clone();
    for expected in &ff.expects.config {
        match env.var(&expected.name) {
            Some(v) => {
                out.insert(expected.name.clone(), v);
            }
            None if expected.required && !out.contains_key(&expected.name) => {
                anyhow::bail!("required configuration {} is not set in the environment", expected.name);
            }
            None => {}
        }
    }
    Ok(out)
}

/// `<host>/t/<app><source>` for the function's first HTTP trigger.
fn remote_url(host: &url::Url, app: &str, ff: &FuncFile) -> anyhow::Result<String> {
    let trigger = ff.first_http_trigger().filter(|t| !t.source.is_empty()).ok_or_else(|| {
        anyhow::anyhow!("Execution of tests on remote server demand that this function has a `path`")
    })?;
    let source = fn_core::funcfile::normalize_source(&trigger.source);
    Ok(format!("{}/t/{app}{source}", host.as_str().trim_end_matches('/')))
}

fn fmt_duration(d: Duration) -> String {
    format!("{:.2}s", d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fn_core::funcfile::{ExpectedConfig, Expects};
    use fn_core::Trigger;
    use std::collections::HashMap;

    fn func() -> FuncFile {
        FuncFile {
            name: "hello".to_owned(),
            config: BTreeMap::from([("A".to_owned(), "1".to_owned())]),
            expects: Expects {
                config: vec![
                    ExpectedConfig {
                        name: "DB_URL".to_owned(),
                        required: true,
                    },
                    ExpectedConfig {
                        name: "OPTIONAL".to_owned(),
                        required: false,
                    },
                ],
            },
            ..Default::default()
        }
    }

    #[test]
    fn required_config_comes_from_the_environment() {
        let env = HashMap::from([("DB_URL".to_owned(), "postgres://db".to_owned())]);
        let got = test_env(&func(), &env).unwrap();
        assert_eq!(got["A"], "1");
        assert_eq!(got["DB_URL"], "postgres://db");
        assert!(!got.contains_key("OPTIONAL"));

        let err = test_env(&func(), &HashMap::<String, String>::new()).unwrap_err();
        assert!(err.to_string().contains("DB_URL"));
    }

    #[test]
    fn remote_url_uses_the_first_http_trigger() {
        let host = url::Url::parse("http://localhost:8080").unwrap();
        let mut ff = func();
        assert!(remote_url(&host, "myapp", &ff).is_err());

        ff.triggers.push(Trigger {
            name: "hello".to_owned(),
            kind: "http".to_owned(),
            source: "hello".to_owned(),
        });
        assert_eq!(
            remote_url(&host, "myapp", &ff).unwrap(),
            "http://localhost:8080/t/myapp/hello"
        );
    }

    #[test]
    fn tallies_add_up() {
        let mut t = Tally { passed: 2, failed: 1 };
        t.add(Tally { passed: 1, failed: 0 });
        assert_eq!(t, Tally { passed: 3, failed: 1 });
        assert_eq!(t.total(), 4);
    }
}
