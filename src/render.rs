//! Command template rendering
//!
//! Substitutes `{code}` placeholders in a command template with argument
//! values. Rendering is pure and never fails: unknown codes are treated as
//! empty. Two contexts exist: previews keep a human-readable marker for
//! unfilled arguments, execution strings drop them and clean up the
//! whitespace left behind.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::tasks::argument::Argument;
use crate::tasks::command::Command;

static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("  +").expect("static regex is valid"));

fn substitute<F>(command: &Command, values: &HashMap<String, String>, on_empty: F) -> String
where
    F: Fn(&Argument) -> String,
{
    let mut rendered = command.template.clone();
    for arg in &command.args {
        let placeholder = format!("{{{}}}", arg.code);
        let value = values.get(&arg.code).map_or("", String::as_str);
        if value.is_empty() {
            rendered = rendered.replace(&placeholder, &on_empty(arg));
        } else {
            rendered = rendered.replace(&placeholder, value);
        }
    }
    rendered
}

/// Render the final string handed to the shell.
///
/// Unfilled placeholders are removed together with the redundant whitespace
/// they leave behind: runs of spaces collapse to one and incidental
/// leading/trailing space is trimmed.
#[must_use]
pub fn render_for_execution(command: &Command, values: &HashMap<String, String>) -> String {
    let rendered = substitute(command, values, |_| String::new());
    MULTI_SPACE.replace_all(&rendered, " ").trim().to_string()
}

/// Render a display preview: unfilled placeholders become `[Display Name]`
/// so the user can see which slots are still open.
#[must_use]
pub fn render_preview(command: &Command, values: &HashMap<String, String>) -> String {
    substitute(command, values, |arg| {
        let label = if arg.name.is_empty() { &arg.code } else { &arg.name };
        format!("[{label}]")
    })
}
