use std::path::PathBuf;

/// Failures of the external signing tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
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
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Remote ──
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("function {id} was modified concurrently")]
    EtagMismatch { id: String },

    #[error("gave up updating {name} after {attempts} concurrent modifications")]
    RetriesExhausted { name: String, attempts: u32 },

    #[error("request to {url} failed")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("unexpected response from {url}")]
    Decode {
        url: String,
        source: reqwest::Error,
    },

    #[error("failed to encode request body")]
    Encode { source: serde_json::Error },

    #[error("invalid URL {url}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    // ── Not found ──
    #[error("app {name} not found")]
    AppNotFound { name: String },

    #[error("function {name} not found")]
    FnNotFound { name: String },

    #[error("trigger {name} not found")]
    TriggerNotFound { name: String },

    // ── Local validation ──
    #[error(transparent)]
    Image(#[from] fn_core::Error),

    #[error("failed to inspect that {kind}'s field")]
    Inspect { kind: &'static str },

    #[error("failed to render {kind} as JSON")]
    Render {
        kind: &'static str,
        source: serde_json::Error,
    },

    // ── Provider ──
    #[error("unknown provider {name:?}, expected one of default, oracle, oracle-ip, oracle-cs")]
    UnknownProvider { name: String },

    #[error("no api-url configured for context {context}, set one with `fn update context api-url URL`")]
    MissingApiUrl { context: String },

    #[error("{key} is missing: set it in the current context, in {config} or through {env}")]
    MissingCredential {
        key: &'static str,
        config: PathBuf,
        env: &'static str,
    },

    #[error("{key} is missing from the current context")]
    MissingContextKey { key: &'static str },

    #[error("could not determine the region: set OCI_CLI_REGION or a region in {config}")]
    MissingRegion { config: PathBuf },

    #[error("failed to read {path}")]
    CredentialRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to build the HTTP client")]
    HttpClient { source: reqwest::Error },

    #[error("invalid value for header {name}")]
    Header {
        name: String,
        source: reqwest::header::InvalidHeaderValue,
    },

    #[error("invalid header name {name}")]
    HeaderName {
        name: String,
        source: reqwest::header::InvalidHeaderName,
    },

    #[error("failed to sign request")]
    Signing { source: ToolError },

    #[error("failed to read the private key passphrase")]
    Passphrase { source: std::io::Error },
}

impl Error {
    /// Missing remote object, either reported by name lookup or by a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::AppNotFound { .. }
                | Error::FnNotFound { .. }
                | Error::TriggerNotFound { .. }
                | Error::Remote { status: 404, .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
