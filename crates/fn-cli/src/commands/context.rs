use clap::Args;
use fn_core::config::{DEFAULT_API_URL, PROVIDER_DEFAULT};
use fn_core::ProcessEnv;

use crate::output::{print_json, Format, Table};
use crate::session::{open_store, Globals};

#[derive(Args)]
pub struct CreateArgs {
    pub name: String,
    #[arg(long, default_value = PROVIDER_DEFAULT)]
    pub provider: String,
    /// Functions API URL, defaults to the local server for the default provider
    #[arg(long)]
    pub api_url: Option<String>,
    /// Registry prefix for image names
    #[arg(long, default_value = "")]
    pub registry: String,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub output: Format,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Context to show, defaults to the current one
    pub name: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub key: String,
    pub value: Option<String>,
    /// Remove the key instead of setting it
    #[arg(long, conflicts_with = "value")]
    pub delete: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub name: String,
}

#[derive(Args)]
pub struct UseArgs {
    pub name: String,
}

pub fn create(args: CreateArgs) -> anyhow::Result<()> {
    let store = open_store(&ProcessEnv)?;
    let api_url = args.api_url.unwrap_or_else(|| {
        if args.provider == PROVIDER_DEFAULT {
            DEFAULT_API_URL.to_owned()
        } else {
            String::new()
        }
    });
    store.create(&args.name, &args.provider, &api_url, &args.registry)?;
    println!("Successfully created context: {}", args.name);
    Ok(())
}

pub fn list(args: ListArgs) -> anyhow::Result<()> {
    let store = open_store(&ProcessEnv)?;
    let contexts = store.list()?;
    if args.output == Format::Json {
        return print_json(&contexts);
    }
    let mut table = Table::new(["CURRENT", "NAME", "PROVIDER", "API URL", "REGISTRY"]);
    for c in contexts {
        let marker = if c.current { "*" } else { "" };
        table.row([marker.to_owned(), c.name, c.provider, c.api_url, c.registry]);
    }
    table.print();
    Ok(())
}

pub fn inspect(g: &Globals, args: InspectArgs) -> anyhow::Result<()> {
    let store = open_store(&ProcessEnv)?;
    let name = match args.name {
        Some(name) => name,
        None => store.resolve(g.context.as_deref(), &ProcessEnv)?.name,
    };
    let raw = store.read_raw(&name)?;
    println!("Current context: {name}\n");
    print!("{raw}");
    Ok(())
}

pub fn update(args: UpdateArgs) -> anyhow::Result<()> {
    validate_key(&args.key)?;
    let store = open_store(&ProcessEnv)?;
    if args.delete {
        store.remove_key(&args.key)?;
        println!("Current context deleted {}", args.key);
        return Ok(());
    }
    let value = args
        .value
        .ok_or_else(|| anyhow::anyhow!("a value is required to update {}, or pass --delete", args.key))?;
    store.update(&args.key, &value)?;
    println!("Current context updated {} with {value}", args.key);
    Ok(())
}

/// Keys follow context names, plus `.` for namespaced keys such as
/// `oracle.profile`.
fn validate_key(key: &str) -> anyhow::Result<()> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !ok {
        anyhow::bail!("invalid context key {key:?}: use letters, digits, '_', '-' and '.'");
    }
    Ok(())
}

pub fn delete(args: DeleteArgs) -> anyhow::Result<()> {
    let store = open_store(&ProcessEnv)?;
    store.delete(&args.name)?;
    println!("Successfully deleted context {}", args.name);
    Ok(())
}

pub fn use_context(args: UseArgs) -> anyhow::Result<()> {
    let store = open_store(&ProcessEnv)?;
    store.use_context(&args.name)?;
    println!("Now using context: {}", args.name);
    Ok(())
}

pub fn unset() -> anyhow::Result<()> {
    let store = open_store(&ProcessEnv)?;
    store.unset()?;
    println!("Successfully unset current context");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keys_allow_namespaces() {
        assert!(validate_key("api-url").is_ok());
        assert!(validate_key("oracle.compartment-id").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("bad key").is_err());
    }
}
