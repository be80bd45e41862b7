use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use fn_build::langs::{LangHelper, Registry, DOCKER_RUNTIME};
use fn_build::HttpFdkIndex;
use fn_core::funcfile::{find_func_file, store_func_file, Trigger, LATEST_SCHEMA_VERSION};
use fn_core::{FuncFile, ProcessEnv};

use crate::session::{working_dir, Globals};

#[derive(Args)]
pub struct InitArgs {
    /// Create the function in this new subdirectory
    pub dir: Option<String>,
    /// Function name, defaults to the directory name
    #[arg(long)]
    pub name: Option<String>,
    /// Language runtime, e.g. go, java11, python3.8, docker
    #[arg(long)]
    pub runtime: Option<String>,
    #[arg(long)]
    pub entrypoint: Option<String>,
    #[arg(long)]
    pub cmd: Option<String>,
    #[arg(long, default_value = fn_core::bump::INITIAL_VERSION)]
    pub version: String,
    #[arg(long, short = 'w')]
    pub working_dir: Option<PathBuf>,
    /// Add a trigger of this type (http)
    #[arg(long)]
    pub trigger: Option<String>,
    /// Memory in MiB
    #[arg(long, short = 'm')]
    pub memory: Option<u64>,
    /// Maximum run time in seconds
    #[arg(long)]
    pub timeout: Option<i32>,
    /// Seconds an idle container is kept
    #[arg(long)]
    pub idle_timeout: Option<i32>,
    /// Function configuration, KEY=VALUE
    #[arg(long, short = 'c')]
    pub config: Vec<String>,
    /// Function annotation, KEY=JSONVALUE
    #[arg(long)]
    pub annotation: Vec<String>,
    /// Overwrite an existing func.yaml or directory
    #[arg(long)]
    pub force: bool,
}

pub async fn init(g: &Globals, args: InitArgs) -> anyhow::Result<()> {
    let wd = working_dir(args.working_dir.as_ref())?;
    let dir = match &args.dir {
        Some(sub) => {
            let dir = wd.join(sub);
            if dir.exists() && !args.force {
                anyhow::bail!("directory {sub} already exists, cannot init function");
            }
            std::fs::create_dir_all(&dir)?;
            println!("Creating function at: ./{sub}");
            dir
        }
        None => wd,
    };

    if find_func_file(&dir).is_ok() && !args.force {
        anyhow::bail!("Function file already exists, aborting");
    }

    let name = args
        .name
        .clone()
        .unwrap_or_else(|| fn_core::paths::dir_name(&dir).to_lowercase());
    FuncFile::validate_name(&name)?;

    let mut ff = FuncFile {
        schema_version: LATEST_SCHEMA_VERSION,
        name,
        version: args.version.clone(),
        entrypoint: args.entrypoint.clone().unwrap_or_default(),
        cmd: args.cmd.clone().unwrap_or_default(),
        memory: args.memory.unwrap_or_default(),
        timeout: args.timeout,
        idle_timeout: args.idle_timeout,
        config: super::parse_config(&args.config),
        annotations: super::parse_annotations(&args.annotation)?,
        ..Default::default()
    };

    let registry = Registry::new(Arc::new(ProcessEnv), Arc::new(HttpFdkIndex::new()));
    if dir.join("Dockerfile").exists() {
        println!("Dockerfile found. Using runtime 'docker'.");
        ff.runtime = DOCKER_RUNTIME.to_owned();
    } else if args.runtime.as_deref() == Some(DOCKER_RUNTIME) {
        anyhow::bail!("Dockerfile does not exist for 'docker' runtime");
    } else {
        let helper = pick_helper(&registry, &dir, args.runtime.as_deref())?;
        ff.runtime = args.runtime.clone().unwrap_or_else(|| helper.runtime());
        apply_helper(&mut ff, helper, g.verbose).await?;

        if args.runtime.is_some() && helper.has_boilerplate() {
            match helper.generate_boilerplate(&dir).await {
                Ok(()) => {}
                Err(e) if e.is_boilerplate_exists() => {
                    println!("Function boilerplate already exists, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    if let Some(kind) = &args.trigger {
        ff.triggers.push(Trigger {
            name: format!("{}-trigger", ff.name),
            kind: kind.clone(),
            source: format!("/{}", ff.name),
        });
    }

    store_func_file(&dir.join("func.yaml"), &ff)?;
    println!("func.yaml created.");
    Ok(())
}

fn pick_helper<'r>(
    registry: &'r Registry,
    dir: &std::path::Path,
    runtime: Option<&str>,
) -> anyhow::Result<&'r dyn LangHelper> {
    let supported = || registry.lang_strings().join(", ");
    match runtime {
        Some(rt) => {
            let helper = registry.get(rt).ok_or_else(|| {
                anyhow::anyhow!("init does not support the '{rt}' runtime, supported runtimes: {}", supported())
            })?;
            if helper.is_deprecated() {
                anyhow::bail!("runtime {rt} is no longer supported for new functions, try one of: {}", supported());
            }
            Ok(helper)
        }
        None => registry.detect(dir).ok_or_else(|| {
            anyhow::anyhow!("could not detect the language of this function, use --runtime with one of: {}", supported())
        }),
    }
}

/// Fill entrypoint, cmd, memory and pinned images from the helper where the
/// flags left them empty.
async fn apply_helper(ff: &mut FuncFile, helper: &dyn LangHelper, verbose: bool) -> anyhow::Result<()> {
    if ff.entrypoint.is_empty() {
        ff.entrypoint = helper.entrypoint().to_owned();
    }
    if ff.cmd.is_empty() {
        ff.cmd = helper.cmd().to_owned();
    }
    if ff.entrypoint.is_empty() && ff.cmd.is_empty() {
        anyhow::bail!(
            "could not detect entrypoint or cmd for {}, use --entrypoint and/or --cmd to set them explicitly",
            ff.runtime
        );
    }
    if ff.memory == 0 {
        ff.memory = helper.custom_memory();
    }
    if helper.fix_images_on_init() {
        ff.build_image = helper.build_from_image().await?;
        if helper.is_multi_stage() {
            ff.run_image = helper.run_from_image().await?;
        }
        if verbose {
            println!("Pinned build image {} and run image {}", ff.build_image, ff.run_image);
        }
    }
    Ok(())
}
