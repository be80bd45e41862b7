use fn_core::config::CLI_VERSION;

use crate::session::{Globals, Session};

pub async fn version(g: &Globals) -> anyhow::Result<()> {
    println!("Client version: {CLI_VERSION}");

    let session = Session::open(g)?;
    let server = match session.client().await {
        Ok(client) => match client.server_version().await {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "server version unavailable");
                "?".to_owned()
            }
        },
        Err(e) => {
            tracing::debug!(error = %e, "no client for the current context");
            "?".to_owned()
        }
    };
    println!("Server version: {server}");
    Ok(())
}
