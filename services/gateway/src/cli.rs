use crate::demo::{run_applications, run_demo, ApplicationsCommand, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use admission_desk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Admission Desk",
    about = "Accept admission applications, route them to the reviewer, and relay decisions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP gateway (default command)
    Serve(ServeArgs),
    /// Inspect applications stored in the local database
    Applications {
        #[command(subcommand)]
        command: ApplicationsCommand,
    },
    /// Run the submission and review scenarios against an in-memory store
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Applications { command } => run_applications(command),
        Command::Demo(args) => run_demo(args),
    }
}
