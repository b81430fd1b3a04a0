use serde::{Deserialize, Serialize};

/// The widget-level type of an argument, deciding how a supplied value is
/// turned into command-line text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// Free-form text, used verbatim
    #[default]
    Plain,
    /// Path to a file, used verbatim
    File,
    /// Path to a directory, used verbatim
    Directory,
    /// Boolean switch: emits an "on" token when set, nothing otherwise
    Flag,
    /// Checkbox-gated value: emits `prefix value` only when a value was entered
    ValuedOption,
}

/// A single typed input slot on a command
#[derive(Debug, Clone, Default)]
pub struct Argument {
    /// Placeholder code, unique within the owning command
    pub code: String,
    /// Display label
    pub name: String,
    pub description: String,
    pub kind: ArgKind,
    pub required: bool,
    /// Current default, overwritten by shared-argument propagation
    pub default: String,
    /// Flag on-token or valued-option prefix, depending on `kind`
    pub value: Option<String>,
}

/// Truthiness rule for flag input text
fn truthy(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Argument {
    /// The token a checked flag emits: the argument's own `value` if set,
    /// the literal `"1"` otherwise.
    #[must_use]
    pub fn on_token(&self) -> &str {
        match self.value.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => "1",
        }
    }

    /// Derive the text substituted for this argument's placeholder.
    ///
    /// `input` is the explicit user-supplied value, if any; absent input falls
    /// back to the argument default. Flags treat the effective text as a
    /// truthy switch, valued options emit their declared prefix in front of a
    /// non-empty entry, and everything else passes through verbatim.
    #[must_use]
    pub fn derive_value(&self, input: Option<&str>) -> String {
        let effective = input.unwrap_or(&self.default);
        match self.kind {
            ArgKind::Plain | ArgKind::File | ArgKind::Directory => effective.to_string(),
            ArgKind::Flag => {
                if truthy(effective) {
                    self.on_token().to_string()
                } else {
                    String::new()
                }
            }
            ArgKind::ValuedOption => {
                if effective.is_empty() {
                    String::new()
                } else {
                    match self.value.as_deref() {
                        Some(prefix) if !prefix.is_empty() => format!("{prefix} {effective}"),
                        _ => effective.to_string(),
                    }
                }
            }
        }
    }
}

/// Identifies one command argument a shared task argument writes into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTarget {
    /// Name of the command within the owning task
    pub command: String,
    /// Code of the argument within that command
    pub argument: String,
}

/// A task-level argument whose value is shared across commands
#[derive(Debug, Clone, Default)]
pub struct TaskArgument {
    pub argument: Argument,
    /// Propagation targets, in declaration order
    pub targets: Vec<ArgTarget>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(value: Option<&str>) -> Argument {
        Argument {
            code: "DEBUG".to_string(),
            name: "Debug".to_string(),
            kind: ArgKind::Flag,
            value: value.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_flag_checked_emits_default_token() {
        assert_eq!(flag(None).derive_value(Some("1")), "1");
        assert_eq!(flag(None).derive_value(Some("true")), "1");
    }

    #[test]
    fn test_flag_checked_emits_custom_token() {
        assert_eq!(flag(Some("--verbose")).derive_value(Some("yes")), "--verbose");
    }

    #[test]
    fn test_flag_unchecked_emits_nothing() {
        assert_eq!(flag(None).derive_value(Some("")), "");
        assert_eq!(flag(None).derive_value(Some("0")), "");
        assert_eq!(flag(None).derive_value(None), "");
    }

    #[test]
    fn test_valued_option_with_prefix() {
        let arg = Argument {
            code: "LEVEL".to_string(),
            kind: ArgKind::ValuedOption,
            value: Some("--level".to_string()),
            ..Default::default()
        };
        assert_eq!(arg.derive_value(Some("3")), "--level 3");
        assert_eq!(arg.derive_value(Some("")), "");
    }

    #[test]
    fn test_valued_option_without_prefix() {
        let arg = Argument {
            code: "OUT".to_string(),
            kind: ArgKind::ValuedOption,
            ..Default::default()
        };
        assert_eq!(arg.derive_value(Some("out.txt")), "out.txt");
    }

    #[test]
    fn test_plain_falls_back_to_default() {
        let arg = Argument {
            code: "INPUT".to_string(),
            default: "input.txt".to_string(),
            ..Default::default()
        };
        assert_eq!(arg.derive_value(None), "input.txt");
        assert_eq!(arg.derive_value(Some("other.txt")), "other.txt");
    }
}
