use std::io::IsTerminal;
use std::process::ExitCode;

use runbook::Library;
use runbook::exec::messages::Palette;

/// Print tasks, pipelines, and any load errors collected along the way.
pub fn run(library: &Library) -> ExitCode {
    let palette = Palette::new(std::io::stdout().is_terminal());

    if library.tasks.is_empty() && library.pipelines.is_empty() {
        println!("No tasks or pipelines found.");
    }

    if !library.tasks.is_empty() {
        println!("Tasks:");
        for task in &library.tasks {
            println!("  {:<20} {}", task.name, task.description);
        }
    }
    if !library.pipelines.is_empty() {
        println!("Pipelines:");
        for pipeline in &library.pipelines {
            println!(
                "  {:<20} {} ({} tasks)",
                pipeline.name,
                pipeline.description,
                pipeline.tasks.len()
            );
        }
    }

    if !library.errors.is_empty() {
        println!();
        println!("{} definition files could not be loaded:", library.errors.len());
        for error in &library.errors {
            let location = error
                .line()
                .map(|line| format!(" (line {line})"))
                .unwrap_or_default();
            println!(
                "  {}{location} [{:?}]",
                error.file().display(),
                error.kind()
            );
            println!("    {error}");
            println!("    {}", palette.hint(error.suggestion()));
        }
    }

    ExitCode::SUCCESS
}
