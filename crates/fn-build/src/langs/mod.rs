//! Per-language build strategies.
//!
//! A [`LangHelper`] knows which runtime tags it answers to, which base
//! images to build and run on, which Dockerfile lines each stage needs and
//! how to scaffold a new function. The [`Registry`] keeps them in a fixed
//! order and hands out the first one that handles a tag.

mod clojure;
mod dotnet;
mod go;
mod java;
mod kotlin;
mod node;
mod php;
mod python;
mod ruby;
mod rust;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use fn_core::EnvSource;

use crate::error::{Error, Result};
use crate::fdk::{FdkIndex, HelperContext};

pub use clojure::ClojureHelper;
pub use dotnet::DotnetHelper;
pub use go::GoHelper;
pub use java::{Java9Helper, JavaHelper, SvmHelper};
pub use kotlin::KotlinHelper;
pub use node::{LambdaNodeHelper, NodeHelper};
pub use php::PhpHelper;
pub use python::PythonHelper;
pub use ruby::RubyHelper;
pub use rust::RustHelper;

/// Runtime that builds from a user-supplied Dockerfile.
pub const DOCKER_RUNTIME: &str = "docker";

#[async_trait]
pub trait LangHelper: Send + Sync {
    /// Runtime tags this helper answers to; the first is the bare language.
    fn lang_strings(&self) -> Vec<String>;

    /// Source file extensions that hint at this language during `init`.
    fn extensions(&self) -> &'static [&'static str];

    fn handles(&self, lang: &str) -> bool {
        self.lang_strings().iter().any(|s| s == lang)
    }

    /// The bare language tag.
    fn runtime(&self) -> String {
        self.lang_strings().into_iter().next().unwrap_or_default()
    }

    /// Base image of the build stage.
    async fn build_from_image(&self) -> Result<String>;

    /// Base image of the final stage.
    async fn run_from_image(&self) -> Result<String>;

    /// When false the Dockerfile has a single stage built on
    /// [`LangHelper::build_from_image`].
    fn is_multi_stage(&self) -> bool {
        true
    }

    /// Build-stage lines, given the function directory.
    fn dockerfile_build_cmds(&self, _dir: &Path) -> Vec<String> {
        Vec::new()
    }

    /// Final-stage lines that copy artifacts out of the build stage.
    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        Vec::new()
    }

    fn entrypoint(&self) -> &'static str {
        ""
    }

    fn cmd(&self) -> &'static str {
        ""
    }

    /// Memory (MiB) a new function of this language starts with; 0 leaves
    /// it to the server.
    fn custom_memory(&self) -> u64 {
        0
    }

    fn has_pre_build(&self) -> bool {
        false
    }

    /// Host-side check before the build. May return a container engine
    /// command to run in the function directory first.
    fn pre_build(&self, _dir: &Path) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// Host-side cleanup after a successful build.
    fn after_build(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn has_boilerplate(&self) -> bool {
        false
    }

    /// Write starter sources into `dir`. Returns
    /// [`Error::BoilerplateExists`] instead of overwriting a project.
    async fn generate_boilerplate(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    /// Pin `build_image`/`run_image` into new manifests.
    fn fix_images_on_init(&self) -> bool {
        false
    }

    /// Latest published FDK version, when this language has one.
    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Still buildable, but refused for new functions.
    fn is_deprecated(&self) -> bool {
        false
    }
}

/// Ordered set of helpers plus the bare-language fallback table.
pub struct Registry {
    helpers: Vec<Box<dyn LangHelper>>,
    fallbacks: Vec<(&'static str, Box<dyn LangHelper>)>,
}

impl Registry {
    /// All built-in helpers. Order matters: a bare tag such as `java`
    /// resolves to the first helper that lists it.
    pub fn new(env: Arc<dyn EnvSource>, index: Arc<dyn FdkIndex>) -> Self {
        let ctx = HelperContext::new(env, index);
        let helpers: Vec<Box<dyn LangHelper>> = vec![
            Box::new(DotnetHelper::new("8.0", ctx.clone())),
            Box::new(DotnetHelper::new("6.0", ctx.clone())),
            Box::new(DotnetHelper::new("3.1", ctx.clone())),
            Box::new(GoHelper::new("1.20", ctx.clone())),
            Box::new(GoHelper::new("1.19", ctx.clone())),
            Box::new(JavaHelper::new("17", ctx.clone())),
            Box::new(JavaHelper::new("11", ctx.clone())),
            Box::new(JavaHelper::new("8", ctx.clone())),
            Box::new(Java9Helper),
            Box::new(NodeHelper::new("20", ctx.clone())),
            Box::new(NodeHelper::new("18", ctx.clone())),
            Box::new(PythonHelper::new("3.8", ctx.clone())),
            Box::new(PythonHelper::new("3.7", ctx.clone())),
            Box::new(PythonHelper::new("3.6", ctx.clone()).deprecated()),
            Box::new(RubyHelper::new("2.7", ctx.clone())),
            Box::new(RubyHelper::new("2.5", ctx.clone())),
            Box::new(KotlinHelper::new(ctx.clone())),
            Box::new(ClojureHelper::new(ctx.clone())),
            Box::new(RustHelper),
            Box::new(PhpHelper),
            Box::new(LambdaNodeHelper),
            Box::new(SvmHelper::new(ctx.clone())),
        ];
        let fallbacks: Vec<(&'static str, Box<dyn LangHelper>)> = vec![
            ("ruby", Box::new(RubyHelper::new("2.5", ctx.clone()))),
            ("node", Box::new(NodeHelper::new("16", ctx.clone()))),
            ("go", Box::new(GoHelper::new("1.11", ctx))),
        ];
        Self { helpers, fallbacks }
    }

    /// A registry over an explicit helper list, without fallbacks.
    pub fn from_helpers(helpers: Vec<Box<dyn LangHelper>>) -> Self {
        Self {
            helpers,
            fallbacks: Vec::new(),
        }
    }

    pub fn helpers(&self) -> impl Iterator<Item = &dyn LangHelper> {
        self.helpers.iter().map(|h| h.as_ref())
    }

    /// First helper that handles `lang`.
    pub fn get(&self, lang: &str) -> Option<&dyn LangHelper> {
        self.helpers().find(|h| h.handles(lang))
    }

    /// Like [`Registry::get`], failing with the stamp-time message.
    pub fn require(&self, lang: &str) -> Result<&dyn LangHelper> {
        self.get(lang).ok_or_else(|| Error::UnsupportedRuntime {
            runtime: lang.to_owned(),
        })
    }

    /// Oldest supported helper for a bare language tag.
    pub fn fallback(&self, lang: &str) -> Option<&dyn LangHelper> {
        self.fallbacks
            .iter()
            .find(|(tag, _)| *tag == lang)
            .map(|(_, h)| h.as_ref())
    }

    /// Helper for a new function whose directory holds `func<ext>` or
    /// `Func<ext>`, in registry order.
    pub fn detect(&self, dir: &Path) -> Option<&dyn LangHelper> {
        self.helpers().find(|h| {
            h.extensions().iter().any(|ext| {
                dir.join(format!("func{ext}")).exists() || dir.join(format!("Func{ext}")).exists()
            })
        })
    }

    /// Every runtime tag, for help and error text.
    pub fn lang_strings(&self) -> Vec<String> {
        self.helpers().flat_map(|h| h.lang_strings()).collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("helpers", &self.lang_strings())
            .finish()
    }
}

// ── Shared helpers ──

pub(crate) fn write_file(dir: &Path, rel: &str, content: &str) -> Result<()> {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(&path, content).map_err(|e| Error::Write { path, source: e })
}

pub(crate) fn require_project_file(
    dir: &Path,
    marker: &'static str,
    project: &'static str,
) -> Result<()> {
    if dir.join(marker).exists() {
        Ok(())
    } else {
        Err(Error::MissingProjectFile { marker, project })
    }
}

/// `MAVEN_OPTS` for the build stage, carrying the host's proxy settings.
pub(crate) fn maven_opts(env: &dyn EnvSource) -> String {
    let mut opts = String::new();
    for (var, scheme) in [("http_proxy", "http"), ("https_proxy", "https")] {
        let Some(raw) = env.non_empty(var) else {
            continue;
        };
        match url::Url::parse(&raw) {
            Ok(u) => {
                let host = u.host_str().unwrap_or_default();
                let port = u.port().map(|p| p.to_string()).unwrap_or_default();
                opts.push_str(&format!("-D{scheme}.proxyHost={host} -D{scheme}.proxyPort={port} "));
            }
            Err(e) => tracing::warn!(var, error = %e, "ignoring unparseable proxy"),
        }
    }
    let no_proxy = env.var("no_proxy").unwrap_or_default().replace(',', "|");
    opts.push_str(&format!("-Dhttp.nonProxyHosts={no_proxy} "));
    opts.push_str("-Dmaven.repo.local=/usr/share/maven/ref/repository");
    opts
}

/// Build-stage lines for a Maven project.
pub(crate) fn maven_build_cmds(env: &dyn EnvSource) -> Vec<String> {
    vec![
        format!("ENV MAVEN_OPTS {}", maven_opts(env)),
        "ADD pom.xml /function/pom.xml".to_owned(),
        concat!(
            r#"RUN ["mvn", "package", "dependency:copy-dependencies", "-DincludeScope=runtime", "#,
            r#""-DskipTests=true", "-Dmdep.prependGroupId=true", "-DoutputDirectory=target", "--fail-never"]"#
        )
        .to_owned(),
        "ADD src /function/src".to_owned(),
        r#"RUN ["mvn", "package"]"#.to_owned(),
    ]
}

/// A `test.json` with a named and an empty-body case for a greeting
/// function.
pub(crate) const GREETING_TESTS: &str = r#"{
    "tests": [
        {
            "input": {
                "body": {
                    "name": "Johnny"
                }
            },
            "output": {
                "body": {
                    "message": "Hello Johnny"
                }
            }
        },
        {
            "input": {
                "body": ""
            },
            "output": {
                "body": {
                    "message": "Hello World"
                }
            }
        }
    ]
}
"#;
