//! Function build: shell steps, Dockerfile selection or synthesis, helper
//! hooks and the container build itself.

use std::path::Path;
use std::process::Stdio;

use fn_core::{store_func_file, FuncFile};

use crate::dockerfile::DockerfileGenerator;
use crate::driver::{BuildRequest, Builder};
use crate::error::{Error, ExecError, Result};
use crate::executor::{ContainerExecutor, OutputMode};
use crate::langs::{LangHelper, Registry, DOCKER_RUNTIME};

const RULE: &str = "-----------------------------------------------------------------------";

/// Knobs for one function build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions<'a> {
    pub registry: Option<&'a str>,
    pub build_args: &'a [String],
    pub no_cache: bool,
    pub verbose: bool,
}

/// Image reference a build of `ff` produces. An unset version tags as
/// [`fn_core::bump::INITIAL_VERSION`] without touching the manifest.
pub fn image_for(ff: &FuncFile, registry: Option<&str>) -> String {
    let version = if ff.version.is_empty() {
        fn_core::bump::INITIAL_VERSION
    } else {
        ff.version.as_str()
    };
    fn_core::image::image_name(&ff.name, version, registry)
}

/// Pin `build_image`/`run_image` into a helper-built manifest that has
/// neither, then rewrite it at `path`. Returns whether anything changed.
pub async fn stamp_images(registry: &Registry, path: &Path, ff: &mut FuncFile) -> Result<bool> {
    let dir = path.parent().unwrap_or(Path::new("."));
    if dir.join("Dockerfile").exists()
        || ff.runtime == DOCKER_RUNTIME
        || !ff.build_image.is_empty()
        || !ff.run_image.is_empty()
    {
        return Ok(false);
    }

    let helper = registry.require(&ff.runtime)?;
    let helper = registry.fallback(&helper.runtime()).unwrap_or(helper);

    ff.build_image = helper.build_from_image().await?;
    if helper.is_multi_stage() {
        ff.run_image = helper.run_from_image().await?;
    }
    store_func_file(path, ff)?;
    tracing::debug!(
        path = %path.display(),
        build_image = %ff.build_image,
        run_image = %ff.run_image,
        "stamped images into manifest"
    );
    Ok(true)
}

/// Run the manifest's `build:` steps with `/bin/sh -c` in `dir`, in order.
pub async fn run_build_steps(dir: &Path, steps: &[String]) -> Result<()> {
    for step in steps {
        tracing::debug!(cmd = %step, "running build step");
        let status = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(step)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::BuildStep {
                cmd: step.clone(),
                source: ExecError::NotFound {
                    program: "/bin/sh".to_owned(),
                    source: e,
                },
            })?;
        if !status.success() {
            return Err(Error::BuildStep {
                cmd: step.clone(),
                source: ExecError::CommandFailed {
                    program: "/bin/sh".to_owned(),
                    args: vec!["-c".to_owned(), step.clone()],
                    stderr: status.to_string(),
                },
            });
        }
    }
    Ok(())
}

/// Build the image for the function in `dir` and return its reference.
///
/// A `Dockerfile` in `dir` is used as is; otherwise one is synthesized
/// from the runtime's helper into a temp file that is removed however the
/// build ends.
pub async fn build_function<E: ContainerExecutor>(
    builder: &Builder<E>,
    registry: &Registry,
    dir: &Path,
    ff: &FuncFile,
    opts: &BuildOptions<'_>,
) -> Result<String> {
    builder.check_version().await?;
    run_build_steps(dir, &ff.build).await?;

    let image = image_for(ff, opts.registry);
    let user_dockerfile = dir.join("Dockerfile");

    let (helper, temp): (Option<&dyn LangHelper>, _) = if user_dockerfile.exists() {
        (None, None)
    } else {
        if ff.runtime == DOCKER_RUNTIME {
            return Err(Error::DockerfileRequired {
                dir: dir.to_path_buf(),
            });
        }
        let helper = registry.get(&ff.runtime).ok_or_else(|| Error::NoHelper {
            runtime: ff.runtime.clone(),
        })?;
        let generator = DockerfileGenerator::new(ff, helper);
        let temp = generator.write_temp(dir).await?;
        if opts.verbose {
            let content = generator.render(dir).await?;
            println!("Dockerfile content\n{RULE}\n{content}{RULE}");
        }
        if helper.has_pre_build() {
            pre_build(builder, helper, dir, opts.verbose).await?;
        }
        (Some(helper), Some(temp))
    };

    let dockerfile = temp
        .as_ref()
        .map(|t| t.path().to_path_buf())
        .unwrap_or(user_dockerfile);
    builder
        .build(&BuildRequest {
            dir,
            image: &image,
            dockerfile: &dockerfile,
            build_args: opts.build_args,
            no_cache: opts.no_cache,
            verbose: opts.verbose,
        })
        .await?;
    drop(temp);

    if let Some(helper) = helper {
        helper.after_build(dir)?;
    }
    Ok(image)
}

async fn pre_build<E: ContainerExecutor>(
    builder: &Builder<E>,
    helper: &dyn LangHelper,
    dir: &Path,
    verbose: bool,
) -> Result<()> {
    let Some(cmd) = helper.pre_build(dir)? else {
        return Ok(());
    };
    tracing::debug!(args = ?cmd, "pre-build engine command");
    builder
        .executor()
        .exec_streaming(&cmd, dir, OutputMode::from_verbose(verbose))
        .await
        .map_err(|e| Error::BuildStep {
            cmd: format!("{} {}", builder.engine().program(), cmd.join(" ")),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_defaults_to_initial_version() {
        let ff = FuncFile {
            name: "hello".to_owned(),
            ..Default::default()
        };
        assert_eq!(image_for(&ff, Some("me")), "me/hello:0.0.1");
        let ff = FuncFile {
            version: "0.0.7".to_owned(),
            ..ff
        };
        assert_eq!(image_for(&ff, None), "hello:0.0.7");
    }

    #[tokio::test]
    async fn build_steps_run_in_order_in_the_function_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let steps = vec![
            "echo one > out.txt".to_owned(),
            "echo two >> out.txt".to_owned(),
        ];
        run_build_steps(tmp.path(), &steps).await.unwrap();
        let out = std::fs::read_to_string(tmp.path().join("out.txt")).unwrap();
        assert_eq!(out, "one\ntwo\n");
    }

    #[tokio::test]
    async fn failing_build_step_names_the_command() {
        let tmp = tempfile::TempDir::new().unwrap();
        let steps = vec!["exit 3".to_owned(), "touch never".to_owned()];
        let err = run_build_steps(tmp.path(), &steps).await.unwrap_err();
        assert!(err.to_string().starts_with("error running command exit 3"));
        assert!(!tmp.path().join("never").exists());
    }
}
