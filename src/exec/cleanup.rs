//! Stale process cleanup
//!
//! A previous run that was aborted uncleanly can leave its subprocesses
//! behind. Before a batch starts, any still-running process whose executable
//! name matches a step's program is terminated, except for a fixed denylist
//! of host shells whose termination would take the session down with it.
//! The sweep is advisory: every failure is swallowed.

use std::collections::HashSet;

use log::debug;
use sysinfo::System;

use crate::exec::pipeline::ExecutionStep;

/// Executables never touched by the sweep
const PROTECTED: &[&str] = &[
    "sh",
    "bash",
    "zsh",
    "dash",
    "fish",
    "cmd.exe",
    "powershell.exe",
    "pwsh",
];

/// First whitespace-separated token of the command string, reduced to its
/// base name.
pub(crate) fn program_name(command: &str) -> Option<String> {
    let token = command.split_whitespace().next()?;
    let base = token.rsplit(['/', '\\']).next().unwrap_or(token);
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

pub(crate) fn is_protected(name: &str) -> bool {
    PROTECTED.contains(&name)
}

/// Terminate leftover processes matching the programs about to run.
pub fn kill_stale_processes(steps: &[ExecutionStep]) {
    let programs: HashSet<String> = steps
        .iter()
        .filter_map(|s| program_name(&s.command))
        .filter(|p| !is_protected(p))
        .collect();
    if programs.is_empty() {
        return;
    }

    let system = System::new_all();
    let own_pid = sysinfo::get_current_pid().ok();
    for (pid, process) in system.processes() {
        if Some(*pid) == own_pid {
            continue;
        }
        let name = process.name().to_string_lossy();
        if programs.contains(name.as_ref()) {
            debug!("Terminating stale process '{name}' (pid {pid})");
            if !process.kill() {
                debug!("Could not terminate stale process '{name}' (pid {pid})");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_name_extraction() {
        assert_eq!(program_name("make all"), Some("make".to_string()));
        assert_eq!(program_name("/usr/bin/rsync -av a b"), Some("rsync".to_string()));
        assert_eq!(program_name("   "), None);
        assert_eq!(program_name(""), None);
    }

    #[test]
    fn test_shells_are_protected() {
        assert!(is_protected("sh"));
        assert!(is_protected("bash"));
        assert!(!is_protected("make"));
    }

    #[test]
    fn test_protected_programs_never_selected() {
        let steps = vec![
            ExecutionStep::new("shell", "bash -c 'echo hi'"),
            ExecutionStep::new("empty", ""),
        ];
        let programs: Vec<_> = steps
            .iter()
            .filter_map(|s| program_name(&s.command))
            .filter(|p| !is_protected(p))
            .collect();
        assert!(programs.is_empty());
    }
}
