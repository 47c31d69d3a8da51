use crate::demo::{run_demo, run_evaluate, run_grade, DemoArgs, EvaluateArgs, GradeArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use staff_appraisal::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Staff Appraisal",
    about = "Score employee appraisals from formula rules, attendance stats and manual ratings",
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
    /// Evaluate a rule set against a stat CSV export
    Evaluate(EvaluateArgs),
    /// Map a total score to its grade
    Grade(GradeArgs),
    /// Run the built-in rule set over a few synthetic employees
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
    /// JSON rule list used for stored evaluations (defaults to the built-in set)
    #[arg(long)]
    pub(crate) rules: Option<PathBuf>,
    /// JSON question list used for stored evaluations (defaults to the built-in set)
    #[arg(long)]
    pub(crate) questions: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Evaluate(args) => run_evaluate(args),
        Command::Grade(args) => run_grade(args),
        Command::Demo(args) => run_demo(args),
    }
}
