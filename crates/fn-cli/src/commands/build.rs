use std::path::{Path, PathBuf};

use clap::Args;
use fn_build::{build_function, image_for, stamp_images, BuildOptions, Builder, ContainerExecutor, Registry};
use fn_core::{bump_manifest, find_func_file, load_func_file, FuncFile, VersionType};

use crate::session::{working_dir, Globals, Session};

#[derive(Args)]
pub struct BuildArgs {
    /// Build the function in this subdirectory
    pub dir: Option<String>,
    /// Don't use the container engine's build cache
    #[arg(long)]
    pub no_cache: bool,
    /// Build argument, KEY=VALUE
    #[arg(long)]
    pub build_arg: Vec<String>,
    /// Registry prefix for the image name
    #[arg(long)]
    pub registry: Option<String>,
    #[arg(long, short = 'w')]
    pub working_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct PushArgs {
    #[arg(long)]
    pub registry: Option<String>,
    #[arg(long, short = 'w')]
    pub working_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct BumpArgs {
    /// Bump the major version
    #[arg(long, conflicts_with = "minor")]
    pub major: bool,
    /// Bump the minor version
    #[arg(long)]
    pub minor: bool,
    #[arg(long, short = 'w')]
    pub working_dir: Option<PathBuf>,
}

impl BumpArgs {
    fn kind(&self) -> VersionType {
        if self.major {
            VersionType::Major
        } else if self.minor {
            VersionType::Minor
        } else {
            VersionType::Patch
        }
    }
}

pub async fn build(g: &Globals, args: BuildArgs) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    let wd = working_dir(args.working_dir.as_ref())?;
    let dir = fn_core::paths::function_dir(&wd, args.dir.as_deref());
    if let Some(sub) = &args.dir {
        println!("Building function at: ./{sub}");
    }

    let registry = session.registry(args.registry.as_deref());
    session.print_build_env(registry.as_deref());

    let (path, mut ff) = load_func_file(&dir)?;
    if session.verbose {
        report_fdk_version(&session, &ff.runtime).await;
    }
    let opts = BuildOptions {
        registry: registry.as_deref(),
        build_args: &args.build_arg,
        no_cache: args.no_cache,
        verbose: session.verbose,
    };
    let image = build_in(&session.builder(), &session.helpers(), &path, &mut ff, &opts).await?;
    println!("Function {image} built successfully.");
    Ok(())
}

/// Print the newest FDK published for `runtime`, when the helper knows one.
async fn report_fdk_version(session: &Session, runtime: &str) {
    let helpers = session.helpers();
    let Some(helper) = helpers.get(runtime) else {
        return;
    };
    match helper.latest_fdk_version().await {
        Ok(Some(version)) => println!("Latest FDK version for {runtime}: {version}"),
        Ok(None) => {}
        Err(e) => tracing::debug!(runtime, error = %e, "could not look up the latest FDK version"),
    }
}

/// Stamp images into the manifest at `path` if needed, then build the
/// function next to it.
pub(crate) async fn build_in<E: ContainerExecutor>(
    builder: &Builder<E>,
    helpers: &Registry,
    path: &Path,
    ff: &mut FuncFile,
    opts: &BuildOptions<'_>,
) -> anyhow::Result<String> {
    stamp_images(helpers, path, ff).await?;
    let dir = path.parent().unwrap_or(Path::new("."));
    Ok(build_function(builder, helpers, dir, ff, opts).await?)
}

pub async fn push(g: &Globals, args: PushArgs) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    let dir = working_dir(args.working_dir.as_ref())?;
    let (_, ff) = load_func_file(&dir)?;

    let registry = session.registry(args.registry.as_deref());
    let image = image_for(&ff, registry.as_deref());
    session.builder().push(&image, &dir).await?;
    println!("Function {image} pushed successfully to the registry.");
    Ok(())
}

pub fn bump(args: BumpArgs) -> anyhow::Result<()> {
    let dir = working_dir(args.working_dir.as_ref())?;
    let path = find_func_file(&dir)?;
    let outcome = bump_manifest(&path, args.kind())?;
    println!("Bumped to version {}", outcome.current);
    Ok(())
}
