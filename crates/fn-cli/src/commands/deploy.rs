use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use fn_build::{BuildOptions, Builder, ContainerExecutor, Registry};
use fn_cloud::models::App;
use fn_cloud::{AppChange, FnApi, FnChange, FnClient, Upsert};
use fn_core::funcfile::parse_func_file;
use fn_core::{bump_manifest, find_func_file, load_app_file, restore_version, walk_func_files, AppFile, FuncFile, VersionType};

use crate::session::{working_dir, Globals, Session};

/// Trigger annotation carrying the public endpoint of an HTTP trigger.
const HTTP_ENDPOINT_ANNOTATION: &str = "fnproject.io/trigger/httpEndpoint";

#[derive(Args)]
pub struct DeployArgs {
    /// App to deploy to
    #[arg(long)]
    pub app: Option<String>,
    /// Create the app if it does not exist
    #[arg(long)]
    pub create_app: bool,
    /// Deploy every function under the working directory
    #[arg(long)]
    pub all: bool,
    /// Build only, don't push the image
    #[arg(long)]
    pub local: bool,
    /// Keep the current version
    #[arg(long)]
    pub no_bump: bool,
    #[arg(long)]
    pub no_cache: bool,
    #[arg(long)]
    pub registry: Option<String>,
    /// Build argument, KEY=VALUE
    #[arg(long)]
    pub build_arg: Vec<String>,
    #[arg(long, short = 'w')]
    pub working_dir: Option<PathBuf>,
}

pub async fn deploy(g: &Globals, args: DeployArgs) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    let wd = working_dir(args.working_dir.as_ref())?;

    let app_file = match load_app_file(&wd) {
        Ok((_, af)) => Some(af),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };
    if args.all && app_file.is_none() {
        anyhow::bail!("no app file found in {}, `--all` requires one", wd.display());
    }
    let app_name = resolve_app_name(args.app.as_deref(), app_file.as_ref())?;

    // Find the functions before anything is created remotely.
    let targets = if args.all {
        collect_all(&wd, &app_name)?
    } else {
        vec![Target {
            path: find_func_file(&wd)?,
            dir: wd.clone(),
            default_name: Some(fn_core::paths::dir_name(&wd)),
        }]
    };

    let registry = session.registry(args.registry.as_deref());
    session.print_build_env(registry.as_deref());

    let client = session.client().await?;
    let app = prepare_app(&client, &app_name, app_file.as_ref(), args.create_app).await?;

    let builder = session.builder();
    let helpers = session.helpers();
    let deployer = Deployer {
        client: &client,
        builder: &builder,
        helpers: &helpers,
        app: &app,
        registry: registry.as_deref(),
        verbose: session.verbose,
        args: &args,
    };
    for target in &targets {
        deployer.deploy_one(target).await?;
    }
    Ok(())
}

fn resolve_app_name(flag: Option<&str>, app_file: Option<&AppFile>) -> anyhow::Result<String> {
    flag.filter(|a| !a.is_empty())
        .map(str::to_owned)
        .or_else(|| app_file.map(|af| af.name.clone()).filter(|n| !n.is_empty()))
        .ok_or_else(|| anyhow::anyhow!("App name must be provided, try `--app APP_NAME`"))
}

/// Find or create the app. An app manifest allows creation and is patched
/// onto an existing app.
async fn prepare_app<A: FnApi>(
    client: &FnClient<A>,
    name: &str,
    app_file: Option<&AppFile>,
    create_app: bool,
) -> anyhow::Result<App> {
    let change = app_file
        .map(|af| AppChange {
            config: af.config.clone(),
            annotations: af.annotations.clone(),
            syslog_url: af.syslog_url.clone(),
        })
        .unwrap_or_default();

    let (app, upsert) = client
        .ensure_app(name, &change, create_app || app_file.is_some())
        .await?;
    match upsert {
        Upsert::Created => {
            println!("Successfully created app: {}", app.name);
            Ok(app)
        }
        Upsert::Updated if app_file.is_some() => Ok(client.update_app(name, &change).await?),
        Upsert::Updated => Ok(app),
    }
}

/// One manifest to deploy.
#[derive(Debug, Clone, PartialEq)]
struct Target {
    path: PathBuf,
    dir: PathBuf,
    /// Name used when the manifest has none.
    default_name: Option<String>,
}

/// Every manifest under `root`, in walk order. Nameless manifests are named
/// after their directory relative to `root`; the root one after the app.
fn collect_all(root: &Path, app: &str) -> anyhow::Result<Vec<Target>> {
    let mut targets = Vec::new();
    walk_func_files(root, |path, parsed| {
        let manifest = parsed?;
        let dir = path.parent().unwrap_or(root).to_path_buf();
        let default_name = if manifest.name().is_empty() {
            Some(derived_name(root, &dir, app))
        } else {
            None
        };
        targets.push(Target {
            path: path.to_path_buf(),
            dir,
            default_name,
        });
        Ok(())
    })?;
    if targets.is_empty() {
        anyhow::bail!("no functions found to deploy under {}", root.display());
    }
    Ok(targets)
}

fn derived_name(root: &Path, dir: &Path, app: &str) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect::<Vec<_>>()
            .join("-"),
        _ => format!("{app}-root"),
    }
}

struct Deployer<'a, A: FnApi, E: ContainerExecutor> {
    client: &'a FnClient<A>,
    builder: &'a Builder<E>,
    helpers: &'a Registry,
    app: &'a App,
    registry: Option<&'a str>,
    verbose: bool,
    args: &'a DeployArgs,
}

impl<A: FnApi, E: ContainerExecutor> Deployer<'_, A, E> {
    /// Bump, then build, push and register. A failure after the bump puts
    /// the previous version back.
    async fn deploy_one(&self, target: &Target) -> anyhow::Result<()> {
        let bumped = if self.args.no_bump {
            None
        } else {
            Some(bump_manifest(&target.path, VersionType::Patch)?)
        };

        let result = self.build_and_register(target).await;
        if let Some(outcome) = bumped.as_ref().filter(|_| result.is_err()) {
            if let Err(e) = restore_version(&target.path, &outcome.previous) {
                tracing::warn!(path = %target.path.display(), error = %e, "failed to restore the function version");
            }
        }
        result
    }

    async fn build_and_register(&self, target: &Target) -> anyhow::Result<()> {
        let mut ff = parse_func_file(&target.path)?;
        if ff.name.is_empty() {
            if let Some(name) = &target.default_name {
                ff.name = name.clone();
            }
        }
        FuncFile::validate_name(&ff.name)?;
        println!("Deploying {} to app: {}", ff.name, self.app.name);

        let opts = BuildOptions {
            registry: self.registry,
            build_args: &self.args.build_arg,
            no_cache: self.args.no_cache,
            verbose: self.verbose,
        };
        let image = super::build::build_in(self.builder, self.helpers, &target.path, &mut ff, &opts).await?;

        if !self.args.local {
            self.builder.push(&image, &target.dir).await?;
        }

        let change = fn_change(&ff, &image);
        let (f, upsert) = self
            .client
            .put_fn(self.app, &ff.name, &change)
            .await
            .with_context(|| format!("failed to deploy function {}", ff.name))?;
        match upsert {
            Upsert::Created => println!("Successfully created function: {} with {}", f.name, f.image),
            Upsert::Updated => println!("Successfully updated function: {} with {}", f.name, f.image),
        }

        for trigger in &ff.triggers {
            let (t, upsert) = self
                .client
                .put_trigger(&f, &trigger.name, &trigger.kind, &trigger.source, &Default::default())
                .await?;
            match upsert {
                Upsert::Created => println!("Successfully created trigger: {}", t.name),
                Upsert::Updated => println!("Successfully updated trigger: {}", t.name),
            }
            if let Some(endpoint) = t.annotations.get(HTTP_ENDPOINT_ANNOTATION).and_then(|v| v.as_str()) {
                println!("Trigger Endpoint: {endpoint}");
            }
        }
        Ok(())
    }
}

/// The remote state a manifest asks for.
fn fn_change(ff: &FuncFile, image: &str) -> FnChange {
    FnChange {
        image: Some(image.to_owned()),
        memory: (ff.memory > 0).then_some(ff.memory),
        timeout: ff.timeout,
        idle_timeout: ff.idle_timeout,
        config: ff.config.clone(),
        annotations: ff.annotations.clone(),
    }
}
