use std::collections::HashMap;
use std::process::ExitCode;

use clap::Args;

use runbook::Library;
use runbook::render::render_preview;
use runbook::tasks::argument::Argument;
use runbook::tasks::task::Task;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task or pipeline name
    pub name: String,
}

fn describe_argument(arg: &Argument) -> String {
    let mut notes = Vec::new();
    if arg.required {
        notes.push("required".to_string());
    }
    if !arg.default.is_empty() {
        notes.push(format!("default: {}", arg.default));
    }
    let notes = if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join(", "))
    };
    format!("{:<12} {}{notes}", arg.code, arg.name)
}

fn show_task(task: &Task) {
    if task.description.is_empty() {
        println!("{}", task.name);
    } else {
        println!("{}: {}", task.name, task.description);
    }

    if !task.args.is_empty() {
        println!();
        println!("Shared arguments:");
        for shared in &task.args {
            println!("  {}", describe_argument(&shared.argument));
            for target in &shared.targets {
                println!("    -> {}.{}", target.command, target.argument);
            }
        }
    }

    println!();
    println!("Commands:");
    for command in &task.commands {
        // Preview with nothing but defaults filled in
        let values: HashMap<String, String> = command
            .args
            .iter()
            .map(|a| (a.code.clone(), a.derive_value(None)))
            .collect();
        println!("  {}: {}", command.name, render_preview(command, &values));
        for arg in &command.args {
            println!("    {}", describe_argument(arg));
        }
    }
}

pub fn run(args: &ShowArgs, library: &Library) -> ExitCode {
    if let Some(task) = library.task(&args.name) {
        show_task(task);
        return ExitCode::SUCCESS;
    }
    if let Some(pipeline) = library.pipeline(&args.name) {
        if pipeline.description.is_empty() {
            println!("{} (pipeline)", pipeline.name);
        } else {
            println!("{} (pipeline): {}", pipeline.name, pipeline.description);
        }
        for task in &pipeline.tasks {
            println!();
            show_task(task);
        }
        return ExitCode::SUCCESS;
    }

    eprintln!("No task or pipeline named '{}'", args.name);
    ExitCode::FAILURE
}
