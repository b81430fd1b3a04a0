//! `!include` directive resolution
//!
//! Definition files may reference other files through the `!include
//! <relative-path>` scalar tag. The referenced file is parsed with the same
//! directive support and its value replaces the directive node in place.
//! Paths resolve relative to the directory of the file being parsed, so
//! nested includes stay relative to themselves.
//!
//! The in-progress file set is tracked to fail fast on circular chains
//! instead of recursing until resource exhaustion.

use std::path::{Path, PathBuf};

use log::debug;
use serde_yaml::Value;

use crate::config_file::LoadError;

const INCLUDE_TAG: &str = "!include";

/// Parse a file and resolve every `!include` directive it contains.
///
/// # Errors
///
/// Returns `LoadError` if any file in the include chain is missing or
/// malformed, or if the chain is circular.
pub fn resolve_file(path: &Path) -> Result<Value, LoadError> {
    let mut in_progress = Vec::new();
    load_resolved(path, &mut in_progress)
}

fn load_resolved(path: &Path, in_progress: &mut Vec<PathBuf>) -> Result<Value, LoadError> {
    let canonical = path
        .canonicalize()
        .map_err(|source| LoadError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
    if in_progress.contains(&canonical) {
        let chain = in_progress
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(LoadError::CircularInclude {
            path: path.to_path_buf(),
            chain,
        });
    }

    let contents = std::fs::read_to_string(&canonical).map_err(|source| LoadError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = if path.extension().is_some_and(|ext| ext == "json") {
        // Legacy JSON documents go through the same value model, without
        // include support (JSON has no tags).
        serde_json::from_str(&contents).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yaml::from_str(&contents).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };

    in_progress.push(canonical.clone());
    let dir = canonical
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let resolved = resolve_value(value, &canonical, &dir, in_progress);
    in_progress.pop();
    resolved
}

fn resolve_value(
    value: Value,
    file: &Path,
    dir: &Path,
    in_progress: &mut Vec<PathBuf>,
) -> Result<Value, LoadError> {
    match value {
        Value::Tagged(tagged) if tagged.tag == INCLUDE_TAG => {
            let Some(rel) = tagged.value.as_str() else {
                return Err(LoadError::Validation {
                    path: file.to_path_buf(),
                    message: "!include expects a relative path string".to_string(),
                });
            };
            let target = dir.join(rel);
            debug!("Resolving include {} from {}", rel, file.display());
            load_resolved(&target, in_progress)
        }
        Value::Tagged(tagged) => Err(LoadError::Validation {
            path: file.to_path_buf(),
            message: format!("Unsupported directive '{}'", tagged.tag),
        }),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|v| resolve_value(v, file, dir, in_progress))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Value::Mapping(map) => {
            let mut resolved = serde_yaml::Mapping::new();
            for (key, val) in map {
                resolved.insert(key, resolve_value(val, file, dir, in_progress)?);
            }
            Ok(Value::Mapping(resolved))
        }
        scalar => Ok(scalar),
    }
}

/// Splice entries that are themselves sequences into the surrounding list.
///
/// Used to normalize a task's `commands` and a pipeline's `tasks` after
/// include resolution, where an include pointing at a multi-entry file leaves
/// a nested sequence in list position.
#[must_use]
pub fn flatten_nested(entries: Vec<Value>) -> Vec<Value> {
    let mut flat = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::Sequence(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_include_replaces_directive_with_file_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sibling.yaml", "name: included\nvalue: 42\n");
        let root = write(dir.path(), "root.yaml", "!include sibling.yaml\n");

        let resolved = resolve_file(&root).unwrap();
        assert_eq!(resolved.get("name").and_then(Value::as_str), Some("included"));
        assert_eq!(resolved.get("value").and_then(Value::as_i64), Some(42));
    }

    #[test]
    fn test_nested_include_resolves_relative_to_including_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        write(dir.path(), "root.yaml", "inner: !include sub/mid.yaml\n");
        // leaf.yaml is referenced relative to sub/, not the top-level file
        write(&dir.path().join("sub"), "mid.yaml", "leaf: !include leaf.yaml\n");
        write(&dir.path().join("sub"), "leaf.yaml", "done\n");

        let resolved = resolve_file(&dir.path().join("root.yaml")).unwrap();
        let leaf = resolved.get("inner").and_then(|v| v.get("leaf"));
        assert_eq!(leaf.and_then(Value::as_str), Some("done"));
    }

    #[test]
    fn test_missing_include_fails_with_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "root.yaml", "inner: !include nope.yaml\n");

        let err = resolve_file(&root).unwrap_err();
        match err {
            LoadError::NotFound { path, .. } => {
                assert!(path.ends_with("nope.yaml"), "got: {}", path.display());
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_circular_include_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", "next: !include b.yaml\n");
        write(dir.path(), "b.yaml", "next: !include a.yaml\n");

        let err = resolve_file(&dir.path().join("a.yaml")).unwrap_err();
        match err {
            LoadError::CircularInclude { path, chain } => {
                assert!(path.ends_with("a.yaml"));
                assert!(chain.contains("b.yaml"));
            }
            other => panic!("Expected CircularInclude, got: {other:?}"),
        }
    }

    #[test]
    fn test_self_include_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "self.yaml", "inner: !include self.yaml\n");
        assert!(matches!(
            resolve_file(&root).unwrap_err(),
            LoadError::CircularInclude { .. }
        ));
    }

    #[test]
    fn test_include_in_list_position() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "extra.yaml", "- two\n- three\n");
        let root = write(dir.path(), "root.yaml", "items:\n  - one\n  - !include extra.yaml\n");

        let resolved = resolve_file(&root).unwrap();
        let items = resolved.get("items").and_then(Value::as_sequence).unwrap();
        // The directive node is replaced in place; flattening is a separate
        // normalization step.
        assert_eq!(items.len(), 2);
        let flat = flatten_nested(items.clone());
        let names: Vec<_> = flat.iter().filter_map(Value::as_str).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_flatten_preserves_order() {
        let entries = vec![
            Value::String("a".to_string()),
            Value::Sequence(vec![
                Value::String("b".to_string()),
                Value::String("c".to_string()),
            ]),
            Value::String("d".to_string()),
        ];
        let names: Vec<_> = flatten_nested(entries)
            .into_iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "root.yaml", "value: !secret xyz\n");
        assert!(matches!(
            resolve_file(&root).unwrap_err(),
            LoadError::Validation { .. }
        ));
    }
}
