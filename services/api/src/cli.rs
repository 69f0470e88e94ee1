use crate::commands::{
    run_catalog, run_score, run_submit, run_watermark, ScoreArgs, SubmitArgs, WatermarkArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use site_inspector::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Site Inspector",
    about = "Score facility inspections and publish their photo evidence",
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
    /// Print the active component catalog
    Catalog,
    /// Compute the weighted score for a set of star ratings
    Score(ScoreArgs),
    /// Compress and watermark a single photo
    Watermark(WatermarkArgs),
    /// Submit an inspection with photos against the local object store
    Submit(SubmitArgs),
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
        Command::Catalog => run_catalog().await,
        Command::Score(args) => run_score(args).await,
        Command::Watermark(args) => run_watermark(args).await,
        Command::Submit(args) => run_submit(args).await,
    }
}
