use clap::{Args, Subcommand};
use fn_cloud::inspect::render;
use fn_cloud::{AppChange, AppContents};

use super::{parse_annotations, parse_config};
use crate::output::{print_json, Format, Table};
use crate::prompt::confirm;
use crate::session::{Globals, Session};

#[derive(Args)]
pub struct CreateArgs {
    pub name: String,
    /// Application configuration, KEY=VALUE
    #[arg(long)]
    pub config: Vec<String>,
    /// Application annotation, KEY=JSONVALUE
    #[arg(long)]
    pub annotation: Vec<String>,
    #[arg(long)]
    pub syslog_url: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Number of apps to return
    #[arg(short = 'n', default_value_t = 100)]
    pub limit: usize,
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub output: Format,
}

#[derive(Args)]
pub struct InspectArgs {
    pub name: String,
    /// Dotted path of a field to show
    pub property: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub name: String,
    #[arg(long)]
    pub config: Vec<String>,
    #[arg(long)]
    pub annotation: Vec<String>,
    #[arg(long)]
    pub syslog_url: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub name: String,
    /// Also delete the app's functions and triggers
    #[arg(long)]
    pub recursive: bool,
    /// Don't ask before a recursive delete
    #[arg(long, requires = "recursive")]
    pub force: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show one configuration value
    Get { app: String, key: String },
    /// Set a configuration value
    Set { app: String, key: String, value: String },
    /// Remove a configuration value
    Unset { app: String, key: String },
    /// Show all configuration values
    #[command(alias = "ls")]
    List { app: String },
}

fn app_change(config: &[String], annotations: &[String], syslog_url: Option<String>) -> anyhow::Result<AppChange> {
    Ok(AppChange {
        config: parse_config(config),
        annotations: parse_annotations(annotations)?,
        syslog_url,
    })
}

pub async fn create(g: &Globals, args: CreateArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let change = app_change(&args.config, &args.annotation, args.syslog_url)?;
    let app = client.create_app(&args.name, &change).await?;
    println!("Successfully created app: {}", app.name);
    Ok(())
}

pub async fn list(g: &Globals, args: ListArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let apps = client.list_apps(Some(args.limit)).await?;
    if args.output == Format::Json {
        return print_json(&apps);
    }
    if apps.is_empty() {
        println!("No apps found");
        return Ok(());
    }
    let mut table = Table::new(["NAME", "ID"]);
    for app in apps {
        table.row([app.name, app.id]);
    }
    table.print();
    Ok(())
}

pub async fn inspect(g: &Globals, args: InspectArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let app = client.app_by_name(&args.name).await?;
    print!("{}", render("app", &app, args.property.as_deref())?);
    Ok(())
}

pub async fn update(g: &Globals, args: UpdateArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let change = app_change(&args.config, &args.annotation, args.syslog_url)?;
    client.update_app(&args.name, &change).await?;
    println!("app {} updated", args.name);
    Ok(())
}

pub async fn delete(g: &Globals, args: DeleteArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    if !args.recursive {
        client.delete_app(&args.name).await?;
        println!("App {} deleted", args.name);
        return Ok(());
    }

    let contents = client.app_contents(&args.name).await?;
    print_contents(&contents);
    if !args.force && !confirm("Are you sure you want to delete all of the above?")? {
        println!("Cancelled, nothing was deleted");
        return Ok(());
    }
    client.delete_app_recursive(&contents).await?;
    println!("App {} and its contents deleted", args.name);
    Ok(())
}

fn print_contents(contents: &AppContents) {
    println!("App {} contains:", contents.app.name);
    if contents.fns.is_empty() && contents.triggers.is_empty() {
        println!("  nothing");
        return;
    }
    for f in &contents.fns {
        println!("  function {}", f.name);
    }
    for t in &contents.triggers {
        println!("  trigger {}", t.name);
    }
}

pub async fn config(g: &Globals, args: ConfigArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    match args.action {
        ConfigAction::Get { app, key } => {
            let app = client.app_by_name(&app).await?;
            let value = app
                .config
                .get(&key)
                .ok_or_else(|| anyhow::anyhow!("config key {key} does not exist on app {}", app.name))?;
            println!("{value}");
        }
        ConfigAction::Set { app, key, value } => {
            let change = AppChange {
                config: [(key.clone(), value)].into(),
                ..Default::default()
            };
            client.update_app(&app, &change).await?;
            println!("{app} updated {key}");
        }
        ConfigAction::Unset { app, key } => {
            let change = AppChange {
                config: [(key.clone(), String::new())].into(),
                ..Default::default()
            };
            client.update_app(&app, &change).await?;
            println!("Removed key '{key}' from app '{app}'");
        }
        ConfigAction::List { app } => {
            let app = client.app_by_name(&app).await?;
            let mut table = Table::new(["KEY", "VALUE"]);
            for (k, v) in app.config {
                table.row([k, v]);
            }
            table.print();
        }
    }
    Ok(())
}
