//! C4: the task contract and the static type-name → implementation table.
//! Unlike the reference implementation's `Box<dyn Action>` deserialization
//! (via `typetag`), a Crunchize task is never deserialized directly from
//! the playbook: its `args` map is re-resolved per item at runtime before
//! `Task::run` ever sees it, so dispatch is a plain string-keyed lookup
//! against a table built once at process start, matching the registry's
//! own "static table" language.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::tasks;

/// A task is a stateless unit: `validate` may reject a resolved args map
/// before any side effect; `run` executes once (for one item, one batch, or
/// a single scalar invocation) and returns its result record.
pub trait Task: Send + Sync {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError>;
    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<Value, OperationError>;
}

#[derive(Debug, Clone)]
pub enum TaskError {
    Config(ConfigError),
    Operation(OperationError),
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::Config(e) => write!(f, "{e}"),
            TaskError::Operation(e) => write!(f, "{e}"),
        }
    }
}

/// Validates then runs a task invocation, collapsing both error kinds into
/// one type the orchestrator can log and convert to a `null` result slot
/// without caring which phase failed.
pub fn invoke(task: &dyn Task, args: &Map<String, Value>, dry_run: bool) -> Result<Value, TaskError> {
    task.validate(args).map_err(TaskError::Config)?;
    task.run(args, dry_run).map_err(TaskError::Operation)
}

type Constructor = fn() -> Box<dyn Task>;

fn table() -> &'static HashMap<&'static str, Constructor> {
    static TABLE: OnceLock<HashMap<&'static str, Constructor>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m: HashMap<&'static str, Constructor> = HashMap::new();
        m.insert("filein", || Box::new(tasks::filein::FileInTask));
        m.insert("pathmap", || Box::new(tasks::pathmap::PathMapTask));
        m.insert("convert", || Box::new(tasks::convert::ConvertTask));
        m.insert("oiio", || Box::new(tasks::oiio::OiioTask));
        m.insert("ffmpeg", || Box::new(tasks::ffmpeg::FfmpegTask));
        m.insert("parsepath", || Box::new(tasks::parsepath::ParsePathTask));
        m.insert("inscribe", || Box::new(tasks::inscribe::InscribeTask));
        m.insert("thumbnail", || Box::new(tasks::thumbnail::ThumbnailTask));
        m.insert("delete", || Box::new(tasks::delete::DeleteTask));
        m
    })
}

/// Resolves a `type` string to a fresh task instance, or `None` for an
/// unregistered type (a config error at the orchestrator's `Resolving`
/// state — the whole task is skipped, not just one item).
pub fn resolve(task_type: &str) -> Option<Box<dyn Task>> {
    table().get(task_type).map(|ctor| ctor())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_resolve() {
        for t in [
            "filein", "pathmap", "convert", "oiio", "ffmpeg", "parsepath", "inscribe",
            "thumbnail", "delete",
        ] {
            assert!(resolve(t).is_some(), "expected {t} to resolve");
        }
    }

    #[test]
    fn unknown_type_is_none() {
        assert!(resolve("does_not_exist").is_none());
    }
}
