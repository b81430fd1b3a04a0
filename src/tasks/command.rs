use std::collections::HashMap;
use std::path::PathBuf;

use crate::tasks::argument::Argument;

/// A single templated shell invocation with its arguments
#[derive(Debug, Clone, Default)]
pub struct Command {
    /// Unique within the owning task, used for display and step selection
    pub name: String,
    pub description: String,
    /// Template string with `{code}` placeholders
    pub template: String,
    /// Arguments in declaration order
    pub args: Vec<Argument>,
    pub env: HashMap<String, String>,
    /// Working directory for execution; empty means the caller's cwd
    pub cwd: PathBuf,
}
