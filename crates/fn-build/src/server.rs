//! The local `fnserver` container and custom server images.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::driver::{BuildRequest, Builder};
use crate::error::{Error, ExecError, Result};
use crate::executor::{ContainerExecutor, OutputMode};
use crate::langs::write_file;

pub const SERVER_IMAGE: &str = "fnproject/fnserver";
pub const SERVER_CONTAINER: &str = "fnserver";
pub const DEFAULT_IOFS_VOLUME: &str = "fnserversocket";
pub const EXT_FILE: &str = "ext.yaml";
pub const SERVER_BUILD_DIR: &str = "tmp";

// ── Start / stop ──

/// Options for `fn start`.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub version: String,
    pub port: u16,
    pub log_level: Option<String>,
    pub env_file: Option<PathBuf>,
    pub detach: bool,
    pub iofs_dir: Option<String>,
    /// `~/.fn`, whose `data/` is mounted into the server.
    pub fn_dir: PathBuf,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            version: "latest".to_owned(),
            port: 8080,
            log_level: None,
            env_file: None,
            detach: false,
            iofs_dir: None,
            fn_dir: PathBuf::from(".fn"),
        }
    }
}

/// Argument list for running the local server container.
pub fn start_args(opts: &StartOptions) -> Vec<String> {
    let iofs = opts.iofs_dir.as_deref().unwrap_or(DEFAULT_IOFS_VOLUME);
    let mut argv: Vec<String> = vec![
        "run".into(),
        "--rm".into(),
        "-i".into(),
        "--name".into(),
        SERVER_CONTAINER.into(),
        "-v".into(),
        format!("{iofs}:/iofs:z"),
        "-e".into(),
        format!("FN_IOFS_DOCKER_PATH={iofs}"),
        "-e".into(),
        "FN_IOFS_PATH=/iofs".into(),
        "-v".into(),
        format!("{}/data:/app/data", opts.fn_dir.display()),
        "-v".into(),
        "/var/run/docker.sock:/var/run/docker.sock".into(),
        "--privileged".into(),
        "-p".into(),
        format!("{}:8080", opts.port),
        "--entrypoint".into(),
        "./fnserver".into(),
    ];
    if let Some(level) = opts.log_level.as_deref().filter(|l| !l.is_empty()) {
        argv.push("-e".into());
        argv.push(format!("FN_LOG_LEVEL={level}"));
    }
    if let Some(env_file) = &opts.env_file {
        argv.push("--env-file".into());
        argv.push(env_file.display().to_string());
    }
    if opts.detach {
        argv.push("-d".into());
    }
    argv.push(format!("{SERVER_IMAGE}:{}", opts.version));
    argv
}

impl<E: ContainerExecutor> Builder<E> {
    /// Run the local server in the foreground. SIGINT/SIGTERM are passed on
    /// to the container and end the call cleanly.
    pub async fn start_server(&self, opts: &StartOptions, dir: &Path) -> Result<()> {
        tracing::warn!("'fn start' should NOT be used for PRODUCTION, see https://github.com/fnproject/fn-helm/");
        match self
            .executor()
            .exec_streaming(&start_args(opts), dir, OutputMode::Verbose)
            .await
        {
            Ok(()) => Ok(()),
            Err(ExecError::Cancelled { signal }) => {
                tracing::info!(signal, "interrupt caught, exiting");
                Ok(())
            }
            Err(e) => Err(Error::Run {
                engine: self.engine().program().to_owned(),
                source: e,
            }),
        }
    }

    pub async fn stop_server(&self) -> Result<()> {
        self.executor()
            .exec(&["stop".to_owned(), SERVER_CONTAINER.to_owned()])
            .await
            .map(|_| ())
            .map_err(|e| Error::Run {
                engine: self.engine().program().to_owned(),
                source: e,
            })
    }
}

// ── Custom server build ──

/// `ext.yaml`: extensions compiled into a custom server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtFile {
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Extension {
    pub name: String,
}

pub fn load_ext_file(path: &Path) -> Result<ExtFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::ExtRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&raw).map_err(|e| Error::ExtParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Go entrypoint that registers every extension with the server.
pub fn render_main(ext: &ExtFile) -> String {
    let imports: String = ext
        .extensions
        .iter()
        .map(|e| format!("\t_ \"{}\"\n", e.name))
        .collect();
    let registrations: String = ext
        .extensions
        .iter()
        .map(|e| format!("\tfuncServer.AddExtensionByName(\"{}\")\n", e.name))
        .collect();
    format!(
        "package main\n\n\
         import (\n\
         \t\"context\"\n\n\
         \t\"github.com/fnproject/fn/api/server\"\n\
         \t_ \"github.com/fnproject/fn/api/server/defaultexts\"\n\
         {imports})\n\n\
         func main() {{\n\
         \tctx := context.Background()\n\
         \tfuncServer := server.NewFromEnv(ctx)\n\
         {registrations}\
         \tfuncServer.Start(ctx)\n\
         }}\n"
    )
}

const SERVER_DOCKERFILE: &str = r#"# build stage
FROM golang:1-alpine AS build-env
RUN apk --no-cache add build-base git bzr mercurial gcc
ENV D=/go/src/github.com/x/y
ADD main.go $D/
RUN cd $D && go get
RUN cd $D && go build -o fnserver && cp fnserver /tmp/

# final stage
FROM fnproject/dind
RUN apk add --no-cache ca-certificates
WORKDIR /app
COPY --from=build-env /tmp/fnserver /app/fnserver
CMD ["./fnserver"]
"#;

/// Write `main.go` and the server Dockerfile under `wd/tmp`, returning
/// that directory.
pub fn prepare_server_build(wd: &Path) -> Result<PathBuf> {
    let ext = load_ext_file(&wd.join(EXT_FILE))?;
    let out = wd.join(SERVER_BUILD_DIR);
    write_file(&out, "main.go", &render_main(&ext))?;
    write_file(&out, "Dockerfile", SERVER_DOCKERFILE)?;
    Ok(out)
}

/// Render and build a custom server image tagged `tag`.
pub async fn build_server<E: ContainerExecutor>(
    builder: &Builder<E>,
    wd: &Path,
    tag: &str,
    no_cache: bool,
    verbose: bool,
) -> Result<()> {
    if tag.is_empty() {
        return Err(Error::TagRequired);
    }
    let dir = prepare_server_build(wd)?;
    builder.check_version().await?;
    builder
        .build(&BuildRequest {
            dir: &dir,
            image: tag,
            dockerfile: &dir.join("Dockerfile"),
            build_args: &[],
            no_cache,
            verbose,
        })
        .await
}
