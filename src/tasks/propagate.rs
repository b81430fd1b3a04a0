//! Shared-argument propagation
//!
//! Writes task-level argument values into the command arguments that declared
//! themselves as propagation targets. Priority order: explicit shared value >
//! task-argument default; the target argument's own default is always
//! overwritten and never wins. An empty effective value skips the task
//! argument entirely, leaving its targets untouched.

use std::collections::HashMap;

use log::debug;

use crate::tasks::task::Task;

/// Apply shared values to the task's command arguments, in place.
///
/// Targets naming an unknown command or argument are skipped silently.
/// Repeated calls do not accumulate: each call overwrites target defaults
/// from scratch, so the last call wins.
pub fn apply_shared_values(task: &mut Task, shared_values: &HashMap<String, String>) {
    // Indexed loop because the targets borrow task.args while task.commands
    // is mutated.
    for i in 0..task.args.len() {
        let effective = match shared_values.get(&task.args[i].argument.code) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => task.args[i].argument.default.clone(),
        };
        if effective.is_empty() {
            continue;
        }

        let targets = task.args[i].targets.clone();
        for target in targets {
            let Some(command) = task.commands.iter_mut().find(|c| c.name == target.command)
            else {
                debug!(
                    "Shared argument target skipped: no command '{}'",
                    target.command
                );
                continue;
            };
            let Some(arg) = command.args.iter_mut().find(|a| a.code == target.argument) else {
                debug!(
                    "Shared argument target skipped: command '{}' has no argument '{}'",
                    target.command, target.argument
                );
                continue;
            };
            arg.default = effective.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::argument::{ArgTarget, Argument, TaskArgument};
    use crate::tasks::command::Command;

    fn task_with_shared(default: &str) -> Task {
        Task {
            name: "task".to_string(),
            args: vec![TaskArgument {
                argument: Argument {
                    code: "SHARED".to_string(),
                    default: default.to_string(),
                    ..Default::default()
                },
                targets: vec![
                    ArgTarget {
                        command: "first".to_string(),
                        argument: "IN".to_string(),
                    },
                    ArgTarget {
                        command: "missing".to_string(),
                        argument: "IN".to_string(),
                    },
                ],
            }],
            commands: vec![Command {
                name: "first".to_string(),
                template: "run {IN}".to_string(),
                args: vec![Argument {
                    code: "IN".to_string(),
                    default: "X".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn target_default(task: &Task) -> &str {
        &task.commands[0].args[0].default
    }

    #[test]
    fn test_task_default_overwrites_command_default() {
        let mut task = task_with_shared("D");
        apply_shared_values(&mut task, &HashMap::new());
        assert_eq!(target_default(&task), "D");
    }

    #[test]
    fn test_explicit_value_wins_over_task_default() {
        let mut task = task_with_shared("D");
        let values = HashMap::from([("SHARED".to_string(), "U".to_string())]);
        apply_shared_values(&mut task, &values);
        assert_eq!(target_default(&task), "U");
    }

    #[test]
    fn test_empty_explicit_value_falls_back_to_task_default() {
        let mut task = task_with_shared("D");
        let values = HashMap::from([("SHARED".to_string(), String::new())]);
        apply_shared_values(&mut task, &values);
        assert_eq!(target_default(&task), "D");
    }

    #[test]
    fn test_all_empty_leaves_target_untouched() {
        let mut task = task_with_shared("");
        apply_shared_values(&mut task, &HashMap::new());
        assert_eq!(target_default(&task), "X");
    }

    #[test]
    fn test_repeated_calls_last_wins() {
        let mut task = task_with_shared("D");
        let first = HashMap::from([("SHARED".to_string(), "one".to_string())]);
        let second = HashMap::from([("SHARED".to_string(), "two".to_string())]);
        apply_shared_values(&mut task, &first);
        apply_shared_values(&mut task, &second);
        assert_eq!(target_default(&task), "two");
    }

    #[test]
    fn test_missing_targets_are_skipped_silently() {
        let mut task = task_with_shared("D");
        // The second target names a command that does not exist; the call
        // must still apply the first target and not fail.
        apply_shared_values(&mut task, &HashMap::new());
        assert_eq!(target_default(&task), "D");
    }
}
