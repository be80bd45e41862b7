mod commands;
mod output;
mod prompt;
mod session;

use clap::{Parser, Subcommand};

use commands::{apps, context, functions, triggers};

#[derive(Parser)]
#[command(name = "fn", about = "Build, deploy and manage functions")]
#[command(version)]
struct Cli {
    /// Print more details, including debug logs
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Use this context instead of the current one
    #[arg(long, global = true, env = "FN_CONTEXT")]
    context: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a function in the current or a new directory
    Init(commands::init::InitArgs),
    /// Build the function image
    Build(commands::build::BuildArgs),
    /// Push the function image to its registry
    Push(commands::build::PushArgs),
    /// Bump the function version
    Bump(commands::build::BumpArgs),
    /// Bump, build, push and register functions
    Deploy(commands::deploy::DeployArgs),
    /// Upgrade a func.yaml to the latest schema
    Migrate(commands::migrate::MigrateArgs),
    /// Run the tests declared for a function
    Test(commands::test::TestArgs),
    /// Invoke a function
    Invoke(commands::invoke::InvokeArgs),
    /// Call a legacy route
    Call(commands::invoke::CallArgs),

    /// Create an object
    #[command(subcommand)]
    Create(CreateCmd),
    /// List objects
    #[command(subcommand, alias = "ls")]
    List(ListCmd),
    /// Show an object or one of its fields
    #[command(subcommand, alias = "get")]
    Inspect(InspectCmd),
    /// Update an object
    #[command(subcommand)]
    Update(UpdateCmd),
    /// Delete an object
    #[command(subcommand, alias = "rm")]
    Delete(DeleteCmd),
    /// Manage app and function configuration
    #[command(subcommand, alias = "cf")]
    Config(ConfigCmd),
    /// Select the current context
    #[command(subcommand)]
    Use(UseCmd),
    /// Clear the current context
    #[command(subcommand)]
    Unset(UnsetCmd),

    /// Start a local functions server
    Start(commands::server::StartArgs),
    /// Stop the local functions server
    Stop,
    /// Build a custom functions server with extensions
    BuildServer(commands::server::BuildServerArgs),
    /// Show client and server versions
    Version,
}

#[derive(Subcommand)]
enum CreateCmd {
    /// Create an application
    #[command(alias = "app", alias = "a")]
    Apps(apps::CreateArgs),
    /// Create a function on an application
    #[command(alias = "function", alias = "fn", alias = "f")]
    Functions(functions::CreateArgs),
    /// Create a trigger on a function
    #[command(alias = "trigger", alias = "tr", alias = "t")]
    Triggers(triggers::CreateArgs),
    /// Create a context
    #[command(alias = "contexts", alias = "ctx")]
    Context(context::CreateArgs),
}

#[derive(Subcommand)]
enum ListCmd {
    /// List applications
    #[command(alias = "app", alias = "a")]
    Apps(apps::ListArgs),
    /// List the functions of an application
    #[command(alias = "function", alias = "fn", alias = "f")]
    Functions(functions::ListArgs),
    /// List triggers of an application or function
    #[command(alias = "trigger", alias = "tr", alias = "t")]
    Triggers(triggers::ListArgs),
    /// List contexts
    #[command(alias = "contexts", alias = "ctx")]
    Context(context::ListArgs),
}

#[derive(Subcommand)]
enum InspectCmd {
    #[command(alias = "app", alias = "a")]
    Apps(apps::InspectArgs),
    #[command(alias = "function", alias = "fn", alias = "f")]
    Functions(functions::InspectArgs),
    #[command(alias = "trigger", alias = "tr", alias = "t")]
    Triggers(triggers::InspectArgs),
    #[command(alias = "contexts", alias = "ctx")]
    Context(context::InspectArgs),
}

#[derive(Subcommand)]
enum UpdateCmd {
    #[command(alias = "app", alias = "a")]
    Apps(apps::UpdateArgs),
    #[command(alias = "function", alias = "fn", alias = "f")]
    Functions(functions::UpdateArgs),
    #[command(alias = "trigger", alias = "tr", alias = "t")]
    Triggers(triggers::UpdateArgs),
    /// Set or remove a key of the current context
    #[command(alias = "contexts", alias = "ctx")]
    Context(context::UpdateArgs),
}

#[derive(Subcommand)]
enum DeleteCmd {
    #[command(alias = "app", alias = "a")]
    Apps(apps::DeleteArgs),
    #[command(alias = "function", alias = "fn", alias = "f")]
    Functions(functions::DeleteArgs),
    #[command(alias = "trigger", alias = "tr", alias = "t")]
    Triggers(triggers::DeleteArgs),
    #[command(alias = "contexts", alias = "ctx")]
    Context(context::DeleteArgs),
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Configuration of an application
    #[command(alias = "app", alias = "a")]
    Apps(apps::ConfigArgs),
    /// Configuration of a function
    #[command(alias = "function", alias = "fn", alias = "f")]
    Functions(functions::ConfigArgs),
}

#[derive(Subcommand)]
enum UseCmd {
    #[command(alias = "contexts", alias = "ctx")]
    Context(context::UseArgs),
}

#[derive(Subcommand)]
enum UnsetCmd {
    #[command(alias = "contexts", alias = "ctx")]
    Context,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,fn_cli=debug,fn_core=debug,fn_build=debug,fn_cloud=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        if e.downcast_ref::<fn_build::Error>().is_some_and(fn_build::Error::is_cancelled) {
            eprintln!("Interrupted");
            std::process::exit(130);
        }
        eprintln!("ERROR: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let g = session::Globals {
        verbose: cli.verbose,
        context: cli.context,
    };

    match cli.command {
        Commands::Init(args) => commands::init::init(&g, args).await?,
        Commands::Build(args) => commands::build::build(&g, args).await?,
        Commands::Push(args) => commands::build::push(&g, args).await?,
        Commands::Bump(args) => commands::build::bump(args)?,
        Commands::Deploy(args) => commands::deploy::deploy(&g, args).await?,
        Commands::Migrate(args) => commands::migrate::migrate(args)?,
        Commands::Test(args) => commands::test::test(&g, args).await?,
        Commands::Invoke(args) => commands::invoke::invoke(&g, args).await?,
        Commands::Call(args) => commands::invoke::call(&g, args).await?,

        Commands::Create(cmd) => match cmd {
            CreateCmd::Apps(a) => apps::create(&g, a).await?,
            CreateCmd::Functions(a) => functions::create(&g, a).await?,
            CreateCmd::Triggers(a) => triggers::create(&g, a).await?,
            CreateCmd::Context(a) => context::create(a)?,
        },
        Commands::List(cmd) => match cmd {
            ListCmd::Apps(a) => apps::list(&g, a).await?,
            ListCmd::Functions(a) => functions::list(&g, a).await?,
            ListCmd::Triggers(a) => triggers::list(&g, a).await?,
            ListCmd::Context(a) => context::list(a)?,
        },
        Commands::Inspect(cmd) => match cmd {
            InspectCmd::Apps(a) => apps::inspect(&g, a).await?,
            InspectCmd::Functions(a) => functions::inspect(&g, a).await?,
            InspectCmd::Triggers(a) => triggers::inspect(&g, a).await?,
            InspectCmd::Context(a) => context::inspect(&g, a)?,
        },
        Commands::Update(cmd) => match cmd {
            UpdateCmd::Apps(a) => apps::update(&g, a).await?,
            UpdateCmd::Functions(a) => functions::update(&g, a).await?,
            UpdateCmd::Triggers(a) => triggers::update(&g, a).await?,
            UpdateCmd::Context(a) => context::update(a)?,
        },
        Commands::Delete(cmd) => match cmd {
            DeleteCmd::Apps(a) => apps::delete(&g, a).await?,
            DeleteCmd::Functions(a) => functions::delete(&g, a).await?,
            DeleteCmd::Triggers(a) => triggers::delete(&g, a).await?,
            DeleteCmd::Context(a) => context::delete(a)?,
        },
        Commands::Config(cmd) => match cmd {
            ConfigCmd::Apps(a) => apps::config(&g, a).await?,
            ConfigCmd::Functions(a) => functions::config(&g, a).await?,
        },
        Commands::Use(UseCmd::Context(a)) => context::use_context(a)?,
        Commands::Unset(UnsetCmd::Context) => context::unset()?,

        Commands::Start(args) => commands::server::start(&g, args).await?,
        Commands::Stop => commands::server::stop(&g).await?,
        Commands::BuildServer(args) => commands::server::build_server(&g, args).await?,
        Commands::Version => commands::version::version(&g).await?,
    }

    Ok(())
}
