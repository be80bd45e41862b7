use std::collections::BTreeMap;
use std::io::{IsTerminal, Read};

use clap::Args;
use fn_cloud::{InvokeRequest, InvokeResponse};
use fn_core::funcfile::DEFAULT_CONTENT_TYPE;
use fn_core::EnvSource;
use serde::Serialize;
use url::Url;

use crate::output::Format;
use crate::session::{Globals, Session};

/// Largest request body read from stdin.
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Flags shared by `invoke` and `call`.
#[derive(Args)]
pub struct RequestArgs {
    /// Content type of the request body
    #[arg(long)]
    pub content_type: Option<String>,
    /// Forward this environment variable as a request header
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,
    /// Print the call ID of the invocation
    #[arg(long)]
    pub display_call_id: bool,
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub output: Format,
}

#[derive(Args)]
pub struct InvokeArgs {
    pub app: String,
    pub function: String,
    /// Invoke this URL instead of the function's invoke endpoint
    #[arg(long)]
    pub endpoint: Option<String>,
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Args)]
pub struct CallArgs {
    pub app: String,
    /// Route path, e.g. /hello
    pub route: String,
    #[command(flatten)]
    pub request: RequestArgs,
}

pub async fn invoke(g: &Globals, args: InvokeArgs) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    let client = session.client().await?;

    let url = match args.endpoint.filter(|e| !e.is_empty()) {
        Some(endpoint) => endpoint,
        None => {
            let (_, f) = client.app_fn(&args.app, &args.function).await?;
            f.invoke_endpoint().map(str::to_owned).ok_or_else(|| {
                anyhow::anyhow!("function {} has no invoke endpoint, use --endpoint", f.name)
            })?
        }
    };

    let req = build_request(&args.request, session.env.as_ref())?;
    let resp = client.invoke(&url, &req).await?;
    print_response(&args.request, &resp)
}

pub async fn call(g: &Globals, args: CallArgs) -> anyhow::Result<()> {
    let session = Session::open(g)?;
    let api_url = session
        .api_url()
        .ok_or_else(|| anyhow::anyhow!("no api-url configured for context {}", session.active.name))?;
    let url = route_url(&api_host(&api_url)?, &args.app, &args.route);

    let client = session.client().await?;
    let req = build_request(&args.request, session.env.as_ref())?;
    let resp = client.invoke(&url, &req).await?;
    print_response(&args.request, &resp)
}

/// Scheme, host and port of `api_url`, without its path.
pub(crate) fn api_host(api_url: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(api_url)?;
    url.set_path("");
    url.set_query(None);
    Ok(url)
}

fn route_url(host: &Url, app: &str, route: &str) -> String {
    format!(
        "{}/r/{app}{}",
        host.as_str().trim_end_matches('/'),
        fn_core::funcfile::normalize_source(route)
    )
}

fn build_request(args: &RequestArgs, env: &dyn EnvSource) -> anyhow::Result<InvokeRequest> {
    Ok(InvokeRequest {
        body: read_stdin()?,
        content_type: content_type(args.content_type.as_deref()),
        headers: forwarded_headers(&args.env, env),
    })
}

/// Stdin, at most [`MAX_BODY_BYTES`]; nothing when stdin is a terminal.
fn read_stdin() -> anyhow::Result<Vec<u8>> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }
    read_body(stdin.lock(), MAX_BODY_BYTES)
}

/// Read all of `reader`, failing rather than truncating past `limit` bytes.
fn read_body(reader: impl Read, limit: u64) -> anyhow::Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        anyhow::bail!("request body is larger than the {limit} byte limit");
    }
    Ok(body)
}

/// `--content-type`, else the local manifest's, else text/plain.
fn content_type(flag: Option<&str>) -> String {
    if let Some(ct) = flag.filter(|c| !c.is_empty()) {
        return ct.to_owned();
    }
    let local = fn_core::paths::working_dir(None).and_then(|wd| fn_core::load_func_file(&wd));
    match local {
        Ok((_, ff)) => ff.content_type_or_default().to_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "no local function file, using the default content type");
            DEFAULT_CONTENT_TYPE.to_owned()
        }
    }
}

fn forwarded_headers(names: &[String], env: &dyn EnvSource) -> Vec<(String, String)> {
    names
        .iter()
        .filter_map(|name| match env.var(name) {
            Some(value) => Some((name.clone(), value)),
            None => {
                tracing::warn!(variable = %name, "environment variable is not set, not forwarding it");
                None
            }
        })
        .collect()
}

#[derive(Serialize)]
struct JsonResponse {
    body: String,
    headers: BTreeMap<String, Vec<String>>,
    status_code: u16,
}

fn print_response(args: &RequestArgs, resp: &InvokeResponse) -> anyhow::Result<()> {
    if args.display_call_id {
        if let Some(id) = resp.call_id() {
            println!("Call ID: {id}");
        }
    }

    let body = String::from_utf8_lossy(&resp.body).into_owned();
    let text = match args.output {
        Format::Json => serde_json::to_string_pretty(&JsonResponse {
            body,
            headers: resp.headers.clone(),
            status_code: resp.status,
        })?,
        Format::Table => match resp.error_message() {
            Some(message) => format!(
                "Error invoking function. status: {} message: {message}",
                resp.status
            ),
            None => body,
        },
    };
    print!("{}", with_newline(text));
    Ok(())
}

fn with_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
