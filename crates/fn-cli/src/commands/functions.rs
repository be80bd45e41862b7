use clap::{Args, Subcommand};
use fn_cloud::inspect::render;
use fn_cloud::{FnChange, Upsert};

use super::{parse_annotations, parse_config};
use crate::output::{print_json, Format, Table};
use crate::session::{Globals, Session};

/// Resource flags shared by create and update.
#[derive(Args)]
pub struct FnFlags {
    /// Memory in MiB
    #[arg(long, short = 'm')]
    pub memory: Option<u64>,
    /// Maximum run time in seconds
    #[arg(long)]
    pub timeout: Option<i32>,
    /// Seconds an idle container is kept
    #[arg(long)]
    pub idle_timeout: Option<i32>,
    /// Function configuration, KEY=VALUE
    #[arg(long, short = 'c')]
    pub config: Vec<String>,
    /// Function annotation, KEY=JSONVALUE
    #[arg(long)]
    pub annotation: Vec<String>,
}

impl FnFlags {
    fn change(&self, image: Option<String>) -> anyhow::Result<FnChange> {
        Ok(FnChange {
            image,
            memory: self.memory,
            timeout: self.timeout,
            idle_timeout: self.idle_timeout,
            config: parse_config(&self.config),
            annotations: parse_annotations(&self.annotation)?,
        })
    }
}

#[derive(Args)]
pub struct CreateArgs {
    pub app: String,
    pub name: String,
    pub image: String,
    #[command(flatten)]
    pub flags: FnFlags,
}

#[derive(Args)]
pub struct ListArgs {
    pub app: String,
    /// Number of functions to return
    #[arg(short = 'n', default_value_t = 100)]
    pub limit: usize,
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub output: Format,
}

#[derive(Args)]
pub struct InspectArgs {
    pub app: String,
    pub name: String,
    /// Dotted path of a field to show
    pub property: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub app: String,
    pub name: String,
    pub image: Option<String>,
    #[command(flatten)]
    pub flags: FnFlags,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub app: String,
    pub name: String,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show one configuration value
    Get { app: String, function: String, key: String },
    /// Set a configuration value
    Set {
        app: String,
        function: String,
        key: String,
        value: String,
    },
    /// Remove a configuration value
    Unset { app: String, function: String, key: String },
    /// Show all configuration values
    #[command(alias = "ls")]
    List { app: String, function: String },
}

pub async fn create(g: &Globals, args: CreateArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let change = args.flags.change(Some(args.image))?;
    let app = client.app_by_name(&args.app).await?;
    let (f, upsert) = client.put_fn(&app, &args.name, &change).await?;
    match upsert {
        Upsert::Created => println!("Successfully created function: {} with {}", f.name, f.image),
        Upsert::Updated => println!("Successfully updated function: {} with {}", f.name, f.image),
    }
    Ok(())
}

pub async fn list(g: &Globals, args: ListArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let app = client.app_by_name(&args.app).await?;
    let fns = client.list_fns(&app.id, Some(args.limit)).await?;
    if args.output == Format::Json {
        return print_json(&fns);
    }
    if fns.is_empty() {
        println!("No functions found for app: {}", app.name);
        return Ok(());
    }
    let mut table = Table::new(["NAME", "IMAGE", "ID"]);
    for f in fns {
        table.row([f.name, f.image, f.id]);
    }
    table.print();
    Ok(())
}

pub async fn inspect(g: &Globals, args: InspectArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let (_, f) = client.app_fn(&args.app, &args.name).await?;
    print!("{}", render("function", &f, args.property.as_deref())?);
    Ok(())
}

pub async fn update(g: &Globals, args: UpdateArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let change = args.flags.change(args.image)?;
    let app = client.app_by_name(&args.app).await?;
    client.update_fn(&app, &args.name, &change).await?;
    println!("{} updated", args.name);
    Ok(())
}

pub async fn delete(g: &Globals, args: DeleteArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    client.delete_fn(&args.app, &args.name).await?;
    println!("Function {} deleted", args.name);
    Ok(())
}

pub async fn config(g: &Globals, args: ConfigArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    match args.action {
        ConfigAction::Get { app, function, key } => {
            let (_, f) = client.app_fn(&app, &function).await?;
            let value = f
                .config
                .get(&key)
                .ok_or_else(|| anyhow::anyhow!("config key {key} does not exist on function {}", f.name))?;
            println!("{value}");
        }
        ConfigAction::Set {
            app,
            function,
            key,
            value,
        } => {
            set_config(&client, &app, &function, &key, value).await?;
            println!("{app} {function} updated {key}");
        }
        ConfigAction::Unset { app, function, key } => {
            set_config(&client, &app, &function, &key, String::new()).await?;
            println!("Removed key '{key}' from function '{function}'");
        }
        ConfigAction::List { app, function } => {
            let (_, f) = client.app_fn(&app, &function).await?;
            let mut table = Table::new(["KEY", "VALUE"]);
            for (k, v) in f.config {
                table.row([k, v]);
            }
            table.print();
        }
    }
    Ok(())
}

/// Merge one key into the function's config; an empty value removes it.
async fn set_config(
    client: &fn_cloud::FnClient,
    app: &str,
    function: &str,
    key: &str,
    value: String,
) -> anyhow::Result<()> {
    let app = client.app_by_name(app).await?;
    let change = FnChange {
        config: [(key.to_owned(), value)].into(),
        ..Default::default()
    };
    client.update_fn(&app, function, &change).await?;
    Ok(())
}
