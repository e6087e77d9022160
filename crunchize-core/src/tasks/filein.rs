//! file-discovery: expands a glob pattern into a sorted file list. Ported
//! from `FileInTask` — pure and side-effect free, so it runs identically
//! under dry-run.

use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::registry::Task;
use crate::sequence;
use crate::tasks::common::{get_bool, require_str};

pub struct FileInTask;

impl Task for FileInTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        require_str(args, "pattern", "filein")?;
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<Value, OperationError> {
        let pattern = args.get("pattern").and_then(Value::as_str).unwrap_or_default();
        let recursive = get_bool(args, "recursive", false);

        tracing::info!(pattern, recursive, "searching for files");

        // `recursive` mirrors Python's `glob.glob(pattern, recursive=...)`: when
        // false, a wildcard segment (including `**`) must not cross a path
        // separator, so `**` behaves like a single non-recursive `*`.
        let options = glob::MatchOptions {
            require_literal_separator: !recursive,
            ..glob::MatchOptions::default()
        };
        let mut matches: Vec<String> = glob::glob_with(pattern, options)
            .map_err(|e| OperationError::Io(format!("invalid glob pattern '{pattern}': {e}")))?
            .filter_map(|entry| entry.ok())
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        matches.sort();

        tracing::info!(count = matches.len(), "found files");

        if dry_run || tracing::enabled!(tracing::Level::DEBUG) {
            log_sequences(&matches);
        }

        Ok(Value::Array(matches.into_iter().map(Value::String).collect()))
    }
}

/// Groups discovered files into shots for an informative one-line-per-shot
/// summary, exactly as the reference implementation's `log_sequences` does.
fn log_sequences(matches: &[String]) {
    let groups = sequence::group_by_shot(matches);
    let mut summaries: Vec<(String, String)> = Vec::new();

    for group in groups {
        let first = &matches[group[0]];
        let basename = std::path::Path::new(first)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| first.clone());

        match sequence::match_frame(&basename) {
            Some(m) => {
                let frames: Vec<i64> = group
                    .iter()
                    .filter_map(|&i| {
                        let bn = std::path::Path::new(&matches[i]).file_name()?.to_string_lossy().into_owned();
                        sequence::match_frame(&bn).map(|fm| fm.frame)
                    })
                    .collect();
                let range = sequence::format_ranges(&frames);
                let stem_path = std::path::Path::new(first)
                    .parent()
                    .map(|p| p.join(&m.stem))
                    .unwrap_or_else(|| std::path::PathBuf::from(&m.stem));
                summaries.push((
                    stem_path.to_string_lossy().into_owned(),
                    format!(
                        "{}{}[{}]{}",
                        stem_path.display(),
                        m.separator,
                        range,
                        m.extension
                    ),
                ));
            }
            None => summaries.push((first.clone(), format!("  - {first}"))),
        }
    }

    summaries.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, line) in summaries {
        tracing::info!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn validate_requires_pattern() {
        let task = FileInTask;
        assert!(task.validate(&Map::new()).is_err());
        let mut args = Map::new();
        args.insert("pattern".into(), json!("/tmp/*.exr"));
        assert!(task.validate(&args).is_ok());
    }

    #[test]
    fn recursive_flag_reaches_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.exr"), b"").unwrap();
        std::fs::write(dir.path().join("sub").join("b.exr"), b"").unwrap();
        let pattern = format!("{}/*", dir.path().to_string_lossy());

        let count_exr = |v: &Value| v.as_array().unwrap().iter().filter(|m| m.as_str().unwrap().ends_with(".exr")).count();

        let mut args = Map::new();
        args.insert("pattern".into(), json!(pattern));
        let non_recursive = FileInTask.run(&args, false).unwrap();
        assert_eq!(count_exr(&non_recursive), 1);

        args.insert("recursive".into(), json!(true));
        let recursive = FileInTask.run(&args, false).unwrap();
        assert_eq!(count_exr(&recursive), 2);
    }

    #[test]
    fn run_sorts_matches() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.exr", "a.exr"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pattern = dir.path().join("*.exr");
        let mut args = Map::new();
        args.insert("pattern".into(), json!(pattern.to_string_lossy()));
        let task = FileInTask;
        let result = task.run(&args, false).unwrap();
        let arr = result.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert!(arr[0].as_str().unwrap() < arr[1].as_str().unwrap());
    }
}
