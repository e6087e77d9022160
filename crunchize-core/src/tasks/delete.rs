//! delete: removes a single resolved path from disk. Ported from
//! `DeleteTask`.

use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::registry::Task;
use crate::tasks::common::get_str;

pub struct DeleteTask;

impl Task for DeleteTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        if args.get("path").is_none() && args.get("item").is_none() {
            return Err(ConfigError::MissingArg {
                task: "delete".to_string(),
                arg: "path".to_string(),
            });
        }
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<Value, OperationError> {
        let path = get_str(args, "path")
            .map(str::to_string)
            .or_else(|| args.get("item").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| OperationError::Io("could not determine path".to_string()))?;

        if dry_run {
            tracing::info!(path, "dry-run: would delete");
            return Ok(Value::String(path));
        }

        if !std::path::Path::new(&path).exists() {
            tracing::warn!(path, "delete: file does not exist, skipping");
            return Ok(Value::String(path));
        }

        std::fs::remove_file(&path)?;
        tracing::info!(path, "deleted");
        Ok(Value::String(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn dry_run_does_not_delete() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.exr");
        std::fs::write(&file, b"x").unwrap();
        let mut args = Map::new();
        args.insert("path".to_string(), json!(file.to_string_lossy()));
        let task = DeleteTask;
        task.run(&args, true).unwrap();
        assert!(file.exists());
    }

    #[test]
    fn removes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.exr");
        std::fs::write(&file, b"x").unwrap();
        let mut args = Map::new();
        args.insert("path".to_string(), json!(file.to_string_lossy()));
        let task = DeleteTask;
        task.run(&args, false).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let mut args = Map::new();
        args.insert("path".to_string(), json!("/nonexistent/does/not/exist.exr"));
        let task = DeleteTask;
        assert!(task.run(&args, false).is_ok());
    }

    #[test]
    fn falls_back_to_item_string() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("b.exr");
        std::fs::write(&file, b"x").unwrap();
        let mut args = Map::new();
        args.insert("item".to_string(), json!(file.to_string_lossy()));
        let task = DeleteTask;
        task.run(&args, false).unwrap();
        assert!(!file.exists());
    }
}
