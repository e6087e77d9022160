use std::path::PathBuf;

use thiserror::Error;

/// Top-level error taxonomy. Only `Load` and `Config` are ever surfaced as a
/// process exit code; `Template`, `Operation` and `Worker` are always caught
/// and logged by the orchestrator, never propagated out of `Engine::run`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load playbook {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("playbook not found")]
    NotFound,
    #[error("could not read playbook: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed playbook: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A config error skips the offending task (or the whole run, for load-time
/// errors) but never aborts sibling work.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("unknown task type '{0}'")]
    UnknownTaskType(String),
    #[error("task '{task}' is missing required argument '{arg}'")]
    MissingArg { task: String, arg: String },
    #[error("task '{task}' has invalid value for '{arg}': {reason}")]
    InvalidArg {
        task: String,
        arg: String,
        reason: String,
    },
    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
}

/// Raised by a task's `run` when an external tool or filesystem operation
/// fails. Caught per-item by the orchestrator and recorded as a `null`
/// result; never aborts the task's siblings.
#[derive(Error, Debug, Clone)]
pub enum OperationError {
    #[error("{tool} failed with status {status:?}: {stderr}")]
    ToolFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("{tool} command not found")]
    ToolNotFound { tool: String },
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for OperationError {
    fn from(e: std::io::Error) -> Self {
        OperationError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
