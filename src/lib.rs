//! Core implementation of the runbook task runner
//!
//! Runbook executes predefined "tasks": named bundles of shell commands with
//! parameterized arguments. Task definitions live in YAML/JSON files that can
//! be composed through `!include` directives; argument values are filled in
//! by the user, propagated from task level into the individual commands,
//! rendered into final command strings, and executed sequentially with
//! streamed output and stop-on-error semantics.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config_file::{LoadError, load_pipeline_file, load_task_file};
use crate::tasks::task::{Pipeline, Task};

pub mod cache;
pub mod config_file;
pub mod exec;
pub mod include;
pub mod logger;
pub mod render;
pub mod tasks;

/// Directory holding task definition files, relative to the library root
pub const TASKS_DIR: &str = "tasks";
/// Directory holding pipeline definition files
pub const PIPELINES_DIR: &str = "pipelines";
/// Directory conventionally holding shared command files pulled in via
/// `!include`; never loaded directly
pub const COMMANDS_DIR: &str = "commands";

/// Everything loaded from a data directory: the usable entities plus the
/// per-file errors collected along the way.
#[derive(Debug, Default)]
pub struct Library {
    pub tasks: Vec<Task>,
    pub pipelines: Vec<Pipeline>,
    pub errors: Vec<LoadError>,
}

impl Library {
    /// Look up a task by name
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Look up a pipeline by name
    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}

/// Load a task file and validate the resulting definition.
///
/// # Errors
///
/// Returns `LoadError` if the file is missing, malformed, or fails
/// validation.
pub fn load_task(path: &Path) -> Result<Task, LoadError> {
    let task = load_task_file(path)?;
    validate_task(&task).map_err(|message| LoadError::Validation {
        path: path.to_path_buf(),
        message,
    })?;
    warn_unknown_targets(&task);
    Ok(task)
}

/// Load a pipeline file and validate every task it carries.
///
/// # Errors
///
/// Returns `LoadError` if the file is missing, malformed, or fails
/// validation.
pub fn load_pipeline(path: &Path) -> Result<Pipeline, LoadError> {
    let pipeline = load_pipeline_file(path)?;
    if pipeline.name.trim().is_empty() {
        return Err(LoadError::Validation {
            path: path.to_path_buf(),
            message: "Pipeline has an empty name".to_string(),
        });
    }
    for task in &pipeline.tasks {
        validate_task(task).map_err(|message| LoadError::Validation {
            path: path.to_path_buf(),
            message,
        })?;
        warn_unknown_targets(task);
    }
    Ok(pipeline)
}

/// Load a batch of task files, best-effort.
///
/// One bad file never aborts the batch: its error is collected and the
/// remaining files still load. Tasks and errors each keep input order, and
/// every path contributes exactly one entry to one of the two lists.
#[must_use]
pub fn load_tasks(paths: &[PathBuf]) -> (Vec<Task>, Vec<LoadError>) {
    let mut tasks = Vec::new();
    let mut errors = Vec::new();
    for path in paths {
        match load_task(path) {
            Ok(task) => tasks.push(task),
            Err(err) => errors.push(err),
        }
    }
    (tasks, errors)
}

/// Load a batch of pipeline files, best-effort. Same contract as
/// [`load_tasks`].
#[must_use]
pub fn load_pipelines(paths: &[PathBuf]) -> (Vec<Pipeline>, Vec<LoadError>) {
    let mut pipelines = Vec::new();
    let mut errors = Vec::new();
    for path in paths {
        match load_pipeline(path) {
            Ok(pipeline) => pipelines.push(pipeline),
            Err(err) => errors.push(err),
        }
    }
    (pipelines, errors)
}

/// Load all task and pipeline definitions under a library root.
///
/// # Errors
///
/// Returns `LoadError::NotFound` if the root directory does not exist.
/// Per-file failures inside the root are collected on the returned
/// `Library`, not raised.
pub fn load_library(root: &Path) -> Result<Library, LoadError> {
    if !root.is_dir() {
        return Err(LoadError::NotFound {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        });
    }
    info!("Loading library from {}", root.display());
    let (tasks, mut errors) = load_tasks(&definition_files(&root.join(TASKS_DIR)));
    let (pipelines, pipeline_errors) =
        load_pipelines(&definition_files(&root.join(PIPELINES_DIR)));
    errors.extend(pipeline_errors);
    debug!(
        "Loaded {} tasks, {} pipelines ({} errors)",
        tasks.len(),
        pipelines.len(),
        errors.len()
    );
    Ok(Library {
        tasks,
        pipelines,
        errors,
    })
}

/// Searches upward from the current directory for a library root (a
/// directory containing `tasks/` or `pipelines/`).
///
/// # Errors
///
/// Returns `LoadError::NotFound` if no candidate directory is found.
pub fn find_library_root() -> Result<PathBuf, LoadError> {
    let cwd = std::env::current_dir().map_err(|source| LoadError::NotFound {
        path: PathBuf::from("."),
        source,
    })?;
    let mut path = cwd.clone();
    debug!("Searching for library root from {}", cwd.display());
    loop {
        if path.join(TASKS_DIR).is_dir() || path.join(PIPELINES_DIR).is_dir() {
            info!("Found library root: {}", path.display());
            return Ok(path);
        }
        if !path.pop() {
            return Err(LoadError::NotFound {
                path: cwd,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no tasks/ or pipelines/ directory in this directory or its parents",
                ),
            });
        }
    }
}

/// List definition files in a directory, sorted by file name for
/// deterministic load order. A missing directory is simply empty.
fn definition_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml" || ext == "json")
        })
        .collect();
    files.sort();
    files
}

/// Validate a task definition: non-empty names and templates, unique command
/// names, and unique argument codes per owner.
fn validate_task(task: &Task) -> Result<(), String> {
    if task.name.trim().is_empty() {
        return Err("Task has an empty name".to_string());
    }

    let mut command_names = HashSet::new();
    for command in &task.commands {
        if command.name.trim().is_empty() {
            return Err(format!("Task '{}' has a command with an empty name", task.name));
        }
        if !command_names.insert(command.name.as_str()) {
            return Err(format!(
                "Task '{}' has duplicate command name '{}'",
                task.name, command.name
            ));
        }
        if command.template.trim().is_empty() {
            return Err(format!(
                "Command '{}' has an empty command string",
                command.name
            ));
        }
        check_unique_codes(
            command.args.iter().map(|a| a.code.as_str()),
            &format!("command '{}'", command.name),
        )?;
    }

    check_unique_codes(
        task.args.iter().map(|a| a.argument.code.as_str()),
        &format!("task '{}'", task.name),
    )
}

fn check_unique_codes<'a>(
    codes: impl Iterator<Item = &'a str>,
    owner: &str,
) -> Result<(), String> {
    let mut seen = HashSet::new();
    for code in codes {
        if code.trim().is_empty() {
            return Err(format!("{owner} has an argument with an empty code"));
        }
        if !seen.insert(code) {
            return Err(format!("Duplicate argument code '{code}' in {owner}"));
        }
    }
    Ok(())
}

/// Propagation targets pointing at nothing are legal (they are skipped at
/// propagation time), but almost always a typo worth surfacing.
fn warn_unknown_targets(task: &Task) {
    for shared in &task.args {
        for target in &shared.targets {
            let Some(command) = task.command(&target.command) else {
                warn!(
                    "Task '{}': shared argument '{}' targets unknown command '{}'",
                    task.name, shared.argument.code, target.command
                );
                continue;
            };
            if !command.args.iter().any(|a| a.code == target.argument) {
                warn!(
                    "Task '{}': shared argument '{}' targets unknown argument '{}' on command '{}'",
                    task.name, shared.argument.code, target.argument, target.command
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::argument::Argument;
    use crate::tasks::command::Command;

    fn make_cmd(name: &str, codes: &[&str]) -> Command {
        Command {
            name: name.to_string(),
            template: "echo test".to_string(),
            args: codes
                .iter()
                .map(|c| Argument {
                    code: (*c).to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_argument_code_rejected() {
        let task = Task {
            name: "t".to_string(),
            commands: vec![make_cmd("c", &["A", "A"])],
            ..Default::default()
        };
        let err = validate_task(&task).unwrap_err();
        assert!(err.contains("Duplicate argument code 'A'"), "got: {err}");
    }

    #[test]
    fn test_duplicate_command_name_rejected() {
        let task = Task {
            name: "t".to_string(),
            commands: vec![make_cmd("c", &[]), make_cmd("c", &[])],
            ..Default::default()
        };
        let err = validate_task(&task).unwrap_err();
        assert!(err.contains("duplicate command name"), "got: {err}");
    }

    #[test]
    fn test_empty_template_rejected() {
        let task = Task {
            name: "t".to_string(),
            commands: vec![Command {
                name: "c".to_string(),
                template: "  ".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(validate_task(&task).is_err());
    }

    #[test]
    fn test_valid_task_passes() {
        let task = Task {
            name: "t".to_string(),
            commands: vec![make_cmd("a", &["X"]), make_cmd("b", &["X"])],
            ..Default::default()
        };
        // The same code on different commands is fine
        assert!(validate_task(&task).is_ok());
    }

    #[test]
    fn test_batch_load_accounts_for_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.yaml");
        std::fs::write(&good, "name: good\ncommands:\n  - name: c\n    command: echo hi\n")
            .unwrap();
        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "name: bad\ncommands:\n  - name: c\n").unwrap();
        let missing = dir.path().join("missing.yaml");

        let paths = vec![good, bad, missing];
        let (tasks, errors) = load_tasks(&paths);
        assert_eq!(tasks.len() + errors.len(), paths.len());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "good");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_load_library_scans_data_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(TASKS_DIR)).unwrap();
        std::fs::create_dir(dir.path().join(PIPELINES_DIR)).unwrap();
        std::fs::write(
            dir.path().join(TASKS_DIR).join("t.yaml"),
            "name: t\ncommands:\n  - name: c\n    command: echo hi\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(PIPELINES_DIR).join("p.yaml"),
            "name: p\ntasks:\n  - name: inner\n    commands: []\n",
        )
        .unwrap();

        let library = load_library(dir.path()).unwrap();
        assert!(library.task("t").is_some());
        assert!(library.pipeline("p").is_some());
        assert!(library.errors.is_empty());
    }

    #[test]
    fn test_load_library_missing_root() {
        assert!(matches!(
            load_library(Path::new("/nonexistent/library")),
            Err(LoadError::NotFound { .. })
        ));
    }
}
