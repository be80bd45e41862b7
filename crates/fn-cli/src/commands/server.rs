use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use fn_build::server::{StartOptions, SERVER_CONTAINER};

use crate::session::{working_dir, Globals, Session};

#[derive(Args)]
pub struct StartArgs {
    /// Server log level
    #[arg(long)]
    pub log_level: Option<String>,
    /// Run the server in the background
    #[arg(long, short = 'd')]
    pub detach: bool,
    /// File of environment variables passed to the server
    #[arg(long)]
    pub env_file: Option<PathBuf>,
    /// Server image version
    #[arg(long, default_value = "latest")]
    pub version: String,
    #[arg(long, short = 'p', default_value_t = 8080)]
    pub port: u16,
    /// Host directory or volume for the function sockets
    #[arg(long)]
    pub iofs_dir: Option<String>,
}

#[derive(Args)]
pub struct BuildServerArgs {
    /// Tag of the image to build
    #[arg(long, short = 't')]
    pub tag: Option<String>,
    #[arg(long)]
    pub no_cache: bool,
    #[arg(long, short = 'w')]
    pub working_dir: Option<PathBuf>,
}

pub async fn start(g: &Globals, args: StartArgs) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    let opts = StartOptions {
        version: args.version,
        port: args.port,
        log_level: args.log_level,
        env_file: args.env_file,
        detach: args.detach,
        iofs_dir: args.iofs_dir,
        fn_dir: session.store.root().to_path_buf(),
    };
    let wd = working_dir(None)?;
    session.builder().start_server(&opts, &wd).await?;
    Ok(())
}

pub async fn stop(g: &Globals) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    session
        .builder()
        .stop_server()
        .await
        .with_context(|| format!("Failed to stop '{SERVER_CONTAINER}'"))?;
    println!("Successfully stopped '{SERVER_CONTAINER}'");
    Ok(())
}

pub async fn build_server(g: &Globals, args: BuildServerArgs) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    let wd = working_dir(args.working_dir.as_ref())?;
    let tag = args.tag.unwrap_or_default();
    fn_build::server::build_server(&session.builder(), &wd, &tag, args.no_cache, session.verbose).await?;
    println!("Custom Fn server built successfully.");
    Ok(())
}
