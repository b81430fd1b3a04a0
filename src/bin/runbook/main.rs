mod list;
mod run;
mod show;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use runbook::{find_library_root, load_library, logger};

#[derive(Parser, Debug)]
#[command(
    name = "runbook",
    about = "Run predefined bundles of parameterized shell commands"
)]
struct Cli {
    /// Library root containing tasks/ and pipelines/ (auto-detected if not
    /// specified)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Log file path (enables file logging in addition to stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available tasks and pipelines
    List,
    /// Show a task's commands and arguments
    Show(show::ShowArgs),
    /// Execute a task or pipeline
    Run(run::RunArgs),
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run_cli() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_file = cli
        .log_file
        .as_ref()
        .map(std::fs::File::create)
        .transpose()?;
    logger::init(log_file);

    let root = match cli.dir {
        Some(dir) => dir,
        None => find_library_root()?,
    };
    let library = load_library(&root)?;

    match cli.command {
        Commands::List => Ok(list::run(&library)),
        Commands::Show(ref args) => Ok(show::run(args, &library)),
        Commands::Run(args) => run::run(args, library).await,
    }
}
