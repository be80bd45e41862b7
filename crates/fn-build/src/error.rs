use std::path::PathBuf;

/// Failures from running the container engine or another subprocess.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{program} not found, make sure it is installed and on PATH")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} command failed: {args:?}\n{stderr}")]
    CommandFailed {
        program: String,
        args: Vec<String>,
        stderr: String,
    },

    #[error("{program} output was not valid UTF-8")]
    InvalidUtf8 {
        program: String,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to write to {program} stdin")]
    StdinWrite {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to wait for {program}")]
    Wait {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to install signal handler")]
    Signal { source: std::io::Error },

    #[error("build cancelled on signal {signal}")]
    Cancelled { signal: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] fn_core::Error),

    #[error("runtime [{runtime}] is not supported")]
    UnsupportedRuntime { runtime: String },

    #[error("Cannot build, no language helper found for {runtime}")]
    NoHelper { runtime: String },

    #[error("Dockerfile does not exist for 'docker' runtime")]
    DockerfileRequired { dir: PathBuf },

    #[error("entrypoint and cmd are missing, you must provide one or the other")]
    MissingEntrypoint,

    #[error("Could not find {marker} - are you sure this is a {project} project?")]
    MissingProjectFile {
        marker: &'static str,
        project: &'static str,
    },

    #[error("Function boilerplate already exists")]
    BoilerplateExists,

    #[error("{file} already exists, can't generate boilerplate")]
    BoilerplateFileExists { file: &'static str },

    #[error(
        "failed to fetch latest {lang} FDK version from {url}. \
         Check your network settings or manually override the version by setting {env}"
    )]
    FdkFetch {
        lang: &'static str,
        url: String,
        env: &'static str,
        reason: String,
    },

    #[error("unsupported java version {version}")]
    UnsupportedJavaVersion { version: String },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove {path}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot connect to the {engine}, make sure you have it installed and running")]
    EngineUnavailable { engine: String, source: ExecError },

    #[error("could not check {engine} version: {version}")]
    EngineVersion {
        engine: String,
        version: String,
        source: semver::Error,
    },

    #[error("please upgrade your version of Docker to {minimum} or greater")]
    EngineTooOld { found: String, minimum: String },

    #[error("error running command {cmd} ({source})")]
    BuildStep { cmd: String, source: ExecError },

    #[error("error running {engine} build: {source}")]
    Build { engine: String, source: ExecError },

    #[error("error running {engine} push, are you logged?: {source}")]
    Push { engine: String, source: ExecError },

    #[error("error running {engine} run: {source}")]
    Run { engine: String, source: ExecError },

    #[error("failed to read {path}")]
    ExtRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    ExtParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Docker tag required")]
    TagRequired,
}

impl Error {
    /// True for the signal [`Error::BoilerplateExists`]; callers such as
    /// `init` treat it as success.
    pub fn is_boilerplate_exists(&self) -> bool {
        matches!(
            self,
            Error::BoilerplateExists | Error::BoilerplateFileExists { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Build {
                source: ExecError::Cancelled { .. },
                ..
            } | Error::Push {
                source: ExecError::Cancelled { .. },
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
