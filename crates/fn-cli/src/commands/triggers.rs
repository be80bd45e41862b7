use clap::Args;
use fn_cloud::inspect::render;
use fn_cloud::Upsert;

use super::parse_annotations;
use crate::output::{print_json, Format, Table};
use crate::session::{Globals, Session};

#[derive(Args)]
pub struct CreateArgs {
    pub app: String,
    pub function: String,
    pub name: String,
    /// Path the trigger answers on
    #[arg(long, short = 's')]
    pub source: String,
    #[arg(long = "type", short = 't', default_value = "http")]
    pub kind: String,
    /// Trigger annotation, KEY=JSONVALUE
    #[arg(long)]
    pub annotation: Vec<String>,
}

#[derive(Args)]
pub struct ListArgs {
    pub app: String,
    /// Only triggers of this function
    pub function: Option<String>,
    /// Number of triggers to return
    #[arg(short = 'n', default_value_t = 100)]
    pub limit: usize,
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub output: Format,
}

#[derive(Args)]
pub struct InspectArgs {
    pub app: String,
    pub function: String,
    pub name: String,
    /// Dotted path of a field to show
    pub property: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub app: String,
    pub function: String,
    pub name: String,
    #[arg(long)]
    pub annotation: Vec<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub app: String,
    pub function: String,
    pub name: String,
}

pub async fn create(g: &Globals, args: CreateArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let annotations = parse_annotations(&args.annotation)?;
    let (_, f) = client.app_fn(&args.app, &args.function).await?;
    let (t, upsert) = client
        .put_trigger(&f, &args.name, &args.kind, &args.source, &annotations)
        .await?;
    match upsert {
        Upsert::Created => println!("Successfully created trigger: {}", t.name),
        Upsert::Updated => println!("Successfully updated trigger: {}", t.name),
    }
    Ok(())
}

pub async fn list(g: &Globals, args: ListArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let app = client.app_by_name(&args.app).await?;
    let fns = client.list_fns(&app.id, None).await?;

    let fn_id = match &args.function {
        Some(name) => Some(
            fns.iter()
                .find(|f| &f.name == name)
                .map(|f| f.id.clone())
                .ok_or_else(|| fn_cloud::Error::FnNotFound { name: name.clone() })?,
        ),
        None => None,
    };
    let triggers = client
        .list_triggers(&app.id, fn_id.as_deref(), Some(args.limit))
        .await?;
    if args.output == Format::Json {
        return print_json(&triggers);
    }
    if triggers.is_empty() {
        println!("No triggers found for app: {}", app.name);
        return Ok(());
    }

    let mut table = Table::new(["FUNCTION", "NAME", "ID", "TYPE", "SOURCE"]);
    for t in triggers {
        let fn_name = fns
            .iter()
            .find(|f| f.id == t.fn_id)
            .map(|f| f.name.clone())
            .unwrap_or_default();
        table.row([fn_name, t.name, t.id, t.kind, t.source]);
    }
    table.print();
    Ok(())
}

pub async fn inspect(g: &Globals, args: InspectArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let (_, f) = client.app_fn(&args.app, &args.function).await?;
    let t = client.trigger_by_name(&f.app_id, &f.id, &args.name).await?;
    print!("{}", render("trigger", &t, args.property.as_deref())?);
    Ok(())
}

pub async fn update(g: &Globals, args: UpdateArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let annotations = parse_annotations(&args.annotation)?;
    let (_, f) = client.app_fn(&args.app, &args.function).await?;
    client.update_trigger(&f, &args.name, &annotations).await?;
    println!("Trigger {} updated", args.name);
    Ok(())
}

pub async fn delete(g: &Globals, args: DeleteArgs) -> anyhow::Result<()> {
    let client = Session::open(g)?.client().await?;
    let (_, f) = client.app_fn(&args.app, &args.function).await?;
    client.delete_trigger(&f, &args.name).await?;
    println!("Trigger {} deleted", args.name);
    Ok(())
}
