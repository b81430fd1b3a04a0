//! Definition file handling
//!
//! Tasks and pipelines are described in YAML (primary) or JSON (legacy)
//! documents. Parsing goes through a shared value model: includes are
//! resolved first, nested command/task sequences are flattened, and only
//! then is the document mapped onto the typed wire structs below and
//! converted into the domain types.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use thiserror::Error;

use crate::include::{flatten_nested, resolve_file};
use crate::tasks::argument::{ArgKind, ArgTarget, Argument, TaskArgument};
use crate::tasks::command::Command;
use crate::tasks::task::{Pipeline, Task};

/// Errors that can occur while loading definition files
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {path}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse YAML file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Unable to parse JSON file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid definition in {path}: {message}")]
    Validation { path: PathBuf, message: String },
    #[error("Circular include detected at {path} (chain: {chain})")]
    CircularInclude { path: PathBuf, chain: String },
    #[error("Unable to load {path}: {message}")]
    Other { path: PathBuf, message: String },
}

/// Closed classification of load failures, used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    NotFound,
    Syntax,
    Validation,
    CircularInclude,
    Other,
}

impl LoadError {
    /// The file the failure is attributed to
    #[must_use]
    pub fn file(&self) -> &Path {
        match self {
            LoadError::NotFound { path, .. }
            | LoadError::Yaml { path, .. }
            | LoadError::Json { path, .. }
            | LoadError::Validation { path, .. }
            | LoadError::CircularInclude { path, .. }
            | LoadError::Other { path, .. } => path,
        }
    }

    #[must_use]
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            LoadError::NotFound { .. } => LoadErrorKind::NotFound,
            LoadError::Yaml { .. } | LoadError::Json { .. } => LoadErrorKind::Syntax,
            LoadError::Validation { .. } => LoadErrorKind::Validation,
            LoadError::CircularInclude { .. } => LoadErrorKind::CircularInclude,
            LoadError::Other { .. } => LoadErrorKind::Other,
        }
    }

    /// Line number of the failure, when the parser can point at one
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            LoadError::Yaml { source, .. } => source.location().map(|l| l.line()),
            LoadError::Json { source, .. } => match source.line() {
                0 => None,
                line => Some(line),
            },
            _ => None,
        }
    }

    /// A fixed, kind-specific hint shown next to the error message
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self.kind() {
            LoadErrorKind::NotFound => {
                "Check that the file exists and the path is spelled correctly"
            }
            LoadErrorKind::Syntax => "Check indentation and YAML syntax",
            LoadErrorKind::Validation => {
                "Check that all required fields are present and correctly typed"
            }
            LoadErrorKind::CircularInclude => "Break the include cycle between the listed files",
            LoadErrorKind::Other => "Inspect the file for unsupported constructs",
        }
    }

    /// Everything except the generic fallback blocks use of the file
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.kind() != LoadErrorKind::Other
    }
}

/// Accepts `true`/`false` as well as the legacy `0`/`1` spelling
fn truthy_field<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
    }
    Ok(match BoolOrInt::deserialize(deserializer)? {
        BoolOrInt::Bool(b) => b,
        BoolOrInt::Int(i) => i != 0,
    })
}

/// Wire form of a command argument
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigArgument {
    pub code: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ArgKind>,
    #[serde(default, deserialize_with = "truthy_field")]
    pub required: bool,
    pub default: Option<String>,
    pub value: Option<String>,
    /// Accepted for forward compatibility; nothing beyond the required
    /// check is evaluated today.
    pub validation: Option<Value>,
}

impl From<ConfigArgument> for Argument {
    fn from(config: ConfigArgument) -> Self {
        Argument {
            name: config.name.unwrap_or_else(|| config.code.clone()),
            code: config.code,
            description: config.description.unwrap_or_default(),
            kind: config.kind.unwrap_or_default(),
            required: config.required,
            default: config.default.unwrap_or_default(),
            value: config.value,
        }
    }
}

/// Wire form of a shared-argument propagation target: either a
/// `{command, argument}` mapping or a `[command, argument]` pair
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConfigArgTarget {
    Target { command: String, argument: String },
    Pair(String, String),
}

impl From<ConfigArgTarget> for ArgTarget {
    fn from(config: ConfigArgTarget) -> Self {
        match config {
            ConfigArgTarget::Target { command, argument }
            | ConfigArgTarget::Pair(command, argument) => ArgTarget { command, argument },
        }
    }
}

/// Wire form of a task-level shared argument
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigTaskArgument {
    #[serde(flatten)]
    pub argument: ConfigArgument,
    pub values: Option<Vec<ConfigArgTarget>>,
}

impl From<ConfigTaskArgument> for TaskArgument {
    fn from(config: ConfigTaskArgument) -> Self {
        TaskArgument {
            argument: config.argument.into(),
            targets: config
                .values
                .unwrap_or_default()
                .into_iter()
                .map(ArgTarget::from)
                .collect(),
        }
    }
}

/// Wire form of a single command
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigCommand {
    pub name: String,
    pub description: Option<String>,
    pub command: String,
    pub args: Option<Vec<ConfigArgument>>,
    pub env: Option<HashMap<String, String>>,
    pub cwd: Option<PathBuf>,
}

impl From<ConfigCommand> for Command {
    fn from(config: ConfigCommand) -> Self {
        Command {
            name: config.name,
            description: config.description.unwrap_or_default(),
            template: config.command,
            args: config
                .args
                .unwrap_or_default()
                .into_iter()
                .map(Argument::from)
                .collect(),
            env: config.env.unwrap_or_default(),
            cwd: config.cwd.unwrap_or_default(),
        }
    }
}

/// Wire form of a task
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigTask {
    pub name: String,
    pub description: Option<String>,
    pub args: Option<Vec<ConfigTaskArgument>>,
    pub commands: Option<Vec<ConfigCommand>>,
}

impl From<ConfigTask> for Task {
    fn from(config: ConfigTask) -> Self {
        Task {
            name: config.name,
            description: config.description.unwrap_or_default(),
            args: config
                .args
                .unwrap_or_default()
                .into_iter()
                .map(TaskArgument::from)
                .collect(),
            commands: config
                .commands
                .unwrap_or_default()
                .into_iter()
                .map(Command::from)
                .collect(),
        }
    }
}

/// Wire form of a pipeline
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigPipeline {
    pub name: String,
    pub description: Option<String>,
    pub tasks: Option<Vec<ConfigTask>>,
}

impl From<ConfigPipeline> for Pipeline {
    fn from(config: ConfigPipeline) -> Self {
        Pipeline {
            name: config.name,
            description: config.description.unwrap_or_default(),
            tasks: config
                .tasks
                .unwrap_or_default()
                .into_iter()
                .map(Task::from)
                .collect(),
        }
    }
}

/// Flatten the sequence stored under `key`, splicing nested sequences
fn flatten_key(value: &mut Value, key: &str) {
    if let Value::Mapping(map) = value {
        for (k, v) in map.iter_mut() {
            if k.as_str() == Some(key)
                && let Value::Sequence(seq) = v
            {
                *v = Value::Sequence(flatten_nested(std::mem::take(seq)));
            }
        }
    }
}

fn normalize_task(value: &mut Value) {
    flatten_key(value, "commands");
}

fn normalize_pipeline(value: &mut Value) {
    flatten_key(value, "tasks");
    if let Value::Mapping(map) = value {
        for (k, v) in map.iter_mut() {
            if k.as_str() == Some("tasks")
                && let Value::Sequence(tasks) = v
            {
                for task in tasks.iter_mut() {
                    normalize_task(task);
                }
            }
        }
    }
}

fn typed<T>(value: Value, path: &Path) -> Result<T, LoadError>
where
    T: serde::de::DeserializeOwned,
{
    serde_yaml::from_value(value).map_err(|e| LoadError::Validation {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a single task definition file.
///
/// Includes are resolved, the command list is flattened, and the document is
/// validated against the task schema.
///
/// # Errors
///
/// Returns `LoadError` for missing files, syntax errors, include problems,
/// and schema violations.
pub fn load_task_file(path: &Path) -> Result<Task, LoadError> {
    let mut value = resolve_file(path)?;
    normalize_task(&mut value);
    let config: ConfigTask = typed(value, path)?;
    Ok(config.into())
}

/// Load a single pipeline definition file.
///
/// # Errors
///
/// Same failure modes as [`load_task_file`].
pub fn load_pipeline_file(path: &Path) -> Result<Pipeline, LoadError> {
    let mut value = resolve_file(path)?;
    normalize_pipeline(&mut value);
    let config: ConfigPipeline = typed(value, path)?;
    Ok(config.into())
}
