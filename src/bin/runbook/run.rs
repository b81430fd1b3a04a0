use std::collections::HashMap;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Instant;

use clap::Args;
use log::warn;
use tokio::sync::mpsc;

use runbook::Library;
use runbook::cache::ValueCache;
use runbook::exec::messages::Palette;
use runbook::exec::pipeline::{ExecutionStep, RunEvent, RunOutcome, Runner};
use runbook::exec::process::OutputSource;
use runbook::render::render_for_execution;
use runbook::tasks::propagate::apply_shared_values;
use runbook::tasks::task::Task;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task or pipeline name
    pub name: String,

    /// Argument value as CODE=VALUE (repeatable)
    #[arg(short = 'a', long = "arg", value_name = "CODE=VALUE")]
    pub args: Vec<String>,

    /// Only execute the named commands (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "COMMAND")]
    pub only: Vec<String>,

    /// Print the rendered commands without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Restore argument values saved by the previous run
    #[arg(long)]
    pub reuse: bool,

    /// Do not save argument values for later --reuse
    #[arg(long)]
    pub no_save: bool,
}

fn parse_values(pairs: &[String]) -> Result<HashMap<String, String>, String> {
    let mut values = HashMap::new();
    for pair in pairs {
        let Some((code, value)) = pair.split_once('=') else {
            return Err(format!("Invalid argument '{pair}', expected CODE=VALUE"));
        };
        values.insert(code.to_string(), value.to_string());
    }
    Ok(values)
}

/// Propagate values and render every selected command into execution steps.
/// Returns the steps and the list of required arguments still missing.
fn build_steps(
    tasks: Vec<Task>,
    values: &HashMap<String, String>,
    only: &[String],
) -> (Vec<ExecutionStep>, Vec<String>) {
    let mut steps = Vec::new();
    let mut missing = Vec::new();
    for mut task in tasks {
        apply_shared_values(&mut task, values);
        for command in &task.commands {
            if !only.is_empty() && !only.iter().any(|o| o == &command.name) {
                continue;
            }
            let mut rendered_values = HashMap::new();
            for arg in &command.args {
                let derived = arg.derive_value(values.get(&arg.code).map(String::as_str));
                if arg.required && derived.is_empty() {
                    missing.push(format!("{} (command '{}')", arg.code, command.name));
                }
                rendered_values.insert(arg.code.clone(), derived);
            }
            steps.push(ExecutionStep {
                name: command.name.clone(),
                command: render_for_execution(command, &rendered_values),
                env: command.env.clone(),
                cwd: command.cwd.clone(),
            });
        }
    }
    (steps, missing)
}

pub async fn run(
    args: RunArgs,
    library: Library,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let tasks: Vec<Task> = if let Some(task) = library.task(&args.name) {
        vec![task.clone()]
    } else if let Some(pipeline) = library.pipeline(&args.name) {
        pipeline.tasks.clone()
    } else {
        eprintln!("No task or pipeline named '{}'", args.name);
        return Ok(ExitCode::FAILURE);
    };

    let mut values = parse_values(&args.args)?;
    if args.reuse {
        match ValueCache::open_default().and_then(|c| c.restore(&args.name)) {
            Ok(Some(saved)) => {
                for (code, value) in saved {
                    // Explicit --arg values win over restored ones
                    values.entry(code).or_insert(value);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Could not restore saved values: {e}"),
        }
    }

    let (steps, missing) = build_steps(tasks, &values, &args.only);
    if !missing.is_empty() {
        eprintln!("Missing required arguments:");
        for entry in &missing {
            eprintln!("  {entry}");
        }
        return Ok(ExitCode::FAILURE);
    }
    if steps.is_empty() {
        eprintln!("Nothing to run.");
        return Ok(ExitCode::FAILURE);
    }

    let palette = Palette::new(std::io::stdout().is_terminal());
    if args.dry_run {
        for (i, step) in steps.iter().enumerate() {
            println!("{}", palette.step_header(i, steps.len(), &step.name, &step.command));
        }
        return Ok(ExitCode::SUCCESS);
    }

    if !args.no_save && !values.is_empty() {
        match ValueCache::open_default() {
            Ok(cache) => {
                if let Err(e) = cache.save(&args.name, &values) {
                    warn!("Could not save values: {e}");
                }
            }
            Err(e) => warn!("Could not open value cache: {e}"),
        }
    }

    let total = steps.len();
    let mut runner = Runner::new();
    let (tx, mut rx) = mpsc::channel(256);
    runner.execute(steps, tx).await;

    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    let mut interrupted = false;
    let mut step_started = Instant::now();
    let mut outcome = None;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(RunEvent::StepStarted { index, name, command }) => {
                    step_started = Instant::now();
                    println!("{}", palette.step_header(index, total, &name, &command));
                }
                Some(RunEvent::StepOutput { source, line, .. }) => match source {
                    OutputSource::Stdout => println!("{line}"),
                    OutputSource::Stderr => eprintln!("{line}"),
                },
                Some(RunEvent::StepSpawnFailed { message, .. }) => {
                    eprintln!("{}", palette.spawn_failure_line(&message));
                }
                Some(RunEvent::StepFinished { exit_code: 0, .. }) => {
                    println!("{}", palette.success_line(step_started.elapsed()));
                }
                Some(RunEvent::StepFinished { exit_code, .. }) => {
                    println!("{}", palette.failure_line(exit_code, step_started.elapsed()));
                }
                Some(RunEvent::RunFinished(result)) => outcome = Some(result),
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                runner.request_stop();
            }
        }
    }
    runner.wait().await;

    let Some(outcome) = outcome else {
        return Ok(ExitCode::FAILURE);
    };
    println!();
    println!("{}", palette.summary(&outcome, total));
    Ok(if outcome.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
