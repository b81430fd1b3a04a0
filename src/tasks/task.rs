use std::collections::HashMap;

use crate::tasks::argument::{Argument, TaskArgument};
use crate::tasks::command::Command;

/// A named, user-selectable bundle of commands plus shared arguments
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub name: String,
    pub description: String,
    /// Task-level shared arguments, in declaration order
    pub args: Vec<TaskArgument>,
    /// Commands in execution order
    pub commands: Vec<Command>,
}

impl Task {
    /// Look up a command by name
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// An ordered sequence of tasks executed as one batch
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub name: String,
    pub description: String,
    pub tasks: Vec<Task>,
}

/// Shared behavior for entities that carry arguments (tasks and commands).
///
/// Implemented over a flat borrowed view so the two argument shapes
/// (`Argument`, `TaskArgument`) share one interface without inheritance.
pub trait HasArguments {
    /// All arguments in declaration order
    fn arguments(&self) -> Vec<&Argument>;

    /// Look up an argument by code
    fn by_code(&self, code: &str) -> Option<&Argument> {
        self.arguments().into_iter().find(|a| a.code == code)
    }

    /// Arguments that must have a non-empty value before execution
    fn required_arguments(&self) -> Vec<&Argument> {
        self.arguments().into_iter().filter(|a| a.required).collect()
    }

    /// Arguments that may be left empty
    fn optional_arguments(&self) -> Vec<&Argument> {
        self.arguments()
            .into_iter()
            .filter(|a| !a.required)
            .collect()
    }

    /// Current code → default mapping, the starting point for form state
    fn default_values(&self) -> HashMap<String, String> {
        self.arguments()
            .into_iter()
            .map(|a| (a.code.clone(), a.default.clone()))
            .collect()
    }
}

impl HasArguments for Command {
    fn arguments(&self) -> Vec<&Argument> {
        self.args.iter().collect()
    }
}

impl HasArguments for Task {
    fn arguments(&self) -> Vec<&Argument> {
        self.args.iter().map(|a| &a.argument).collect()
    }
}
