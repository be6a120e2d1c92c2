use crate::demo::{run_demo, run_summary, DemoArgs, SummaryArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use permit_flow::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Authorization Request Pipeline",
    about = "Run and demonstrate the authorization request pipeline from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Drive a request through every desk, printing each step
    Demo(DemoArgs),
    /// Print the per-state dashboard counts for a demo pipeline
    Summary(SummaryArgs),
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
        Command::Demo(args) => run_demo(args),
        Command::Summary(args) => run_summary(args),
    }
}
