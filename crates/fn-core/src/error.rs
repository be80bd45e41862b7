use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Manifests ──
    #[error("could not find function file (func.yaml, func.yml or func.json) in {dir}")]
    ManifestNotFound { dir: PathBuf },

    #[error("could not find app file (app.yaml, app.yml or app.json) in {dir}")]
    AppFileNotFound { dir: PathBuf },

    #[error("could not open {path} for parsing")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unexpected file format for function file: {path}")]
    UnexpectedFormat { path: PathBuf },

    #[error("could not parse {path}")]
    ManifestYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("could not parse {path}")]
    ManifestJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unsupported func.yaml version, please use the migrate command")]
    UnsupportedSchema { path: PathBuf },

    #[error("Function name cannot contain a colon")]
    NameHasColon,

    #[error("Function name must be lowercase")]
    NameNotLowercase,

    // ── Image references ──
    #[error("invalid image name {image:?}: {reason}")]
    InvalidImage { image: String, reason: String },

    #[error(
        "image name must have a dockerhub owner or private registry. \
         Be sure to set FN_REGISTRY env var, pass in --registry or configure your context file"
    )]
    ImageMissingOwner { image: String },

    #[error("image name must have a tag")]
    ImageMissingTag { image: String },

    // ── Versions ──
    #[error("invalid version {version:?} in function file")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },

    // ── Schema / migration ──
    #[error("{}", format_schema_errors(errors))]
    SchemaValidation { errors: Vec<String> },

    #[error("built-in function file schema is invalid: {0}")]
    InvalidSchema(String),

    #[error("you have an up to date func.yaml file and do not need to migrate.")]
    AlreadyMigrated { path: PathBuf },

    // ── Walker ──
    #[error("failed to read directory {path}")]
    Walk {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Test cases ──
    #[error("invalid test file {path}")]
    TestFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No tests found for this function")]
    NoTests,

    // ── Contexts ──
    #[error("could not resolve the user's home directory")]
    HomeDirUnavailable,

    #[error("Context file not found: {name}")]
    ContextNotFound { name: String },

    #[error("Context already exists: {name}")]
    ContextExists { name: String },

    #[error("Please enter a context name with only Alphanumeric, _, or -")]
    InvalidContextName { name: String },

    #[error("Invalid Fn API URL: {reason}")]
    InvalidApiUrl { url: String, reason: String },

    #[error("can not delete the current context: {name}")]
    DeleteCurrentContext { name: String },

    #[error("can not delete default context")]
    DeleteDefaultContext,

    #[error("Context {name} currently in use")]
    ContextInUse { name: String },

    #[error("no context currently in use")]
    NoCurrentContext,

    #[error("Context file does not contain key: {key}")]
    ContextKeyMissing { key: String },

    #[error("invalid container engine {0:?}, expected docker or podman")]
    InvalidContainerEngine(String),

    #[error("failed to read {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    // ── Paths ──
    #[error("failed to resolve working directory {path}")]
    WorkingDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// True for the "missing thing" kinds callers may recover from.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ManifestNotFound { .. }
                | Error::AppFileNotFound { .. }
                | Error::ContextNotFound { .. }
        )
    }
}

fn format_schema_errors(errors: &[String]) -> String {
    let mut out = String::from("The func.yaml is not valid. Please see errors:");
    for e in errors {
        out.push_str("\n- ");
        out.push_str(e);
    }
    out
}
