//! Shared helpers for the concrete task implementations in C7: argument
//! accessors, the `existing: replace|skip` contract, output-directory
//! creation, and external-tool invocation with the reference
//! implementation's stdout/stderr logging and error-mapping convention.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existing {
    Replace,
    Skip,
}

pub fn existing_mode(args: &Map<String, Value>, task: &str) -> Result<Existing, ConfigError> {
    match args.get("existing").and_then(Value::as_str) {
        None | Some("replace") => Ok(Existing::Replace),
        Some("skip") => Ok(Existing::Skip),
        Some(other) => Err(ConfigError::InvalidArg {
            task: task.to_string(),
            arg: "existing".to_string(),
            reason: format!("must be 'skip' or 'replace', got '{other}'"),
        }),
    }
}

pub fn get_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub fn get_owned_string(args: &Map<String, Value>, key: &str) -> Option<String> {
    get_str(args, key).map(str::to_string)
}

pub fn get_bool(args: &Map<String, Value>, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn get_f64(args: &Map<String, Value>, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

pub fn get_u64(args: &Map<String, Value>, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

pub fn require_str<'a>(args: &'a Map<String, Value>, key: &str, task: &str) -> Result<&'a str, ConfigError> {
    get_str(args, key).ok_or_else(|| ConfigError::MissingArg {
        task: task.to_string(),
        arg: key.to_string(),
    })
}

/// Ensures the parent directory of `path` exists, matching every task's "we
/// ensure our output directory exists before invocation" contract. A no-op
/// under dry-run, where the directory creation is logged but not performed.
pub fn ensure_parent_dir(path: &str, dry_run: bool) -> Result<(), OperationError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tracing::info!(dir = %parent.display(), "creating output directory");
            if !dry_run {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

/// Runs an external tool, logging stdout at debug and stderr/stdout at
/// error on failure, mapping a missing executable and a nonzero exit code
/// to the two `OperationError` shapes every tool-backed task shares.
pub fn run_tool(tool: &str, argv: &[String]) -> Result<Output, OperationError> {
    tracing::info!(cmd = %format!("{tool} {}", argv.join(" ")), "executing");

    let output = Command::new(tool).args(argv).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OperationError::ToolNotFound {
                tool: tool.to_string(),
            }
        } else {
            OperationError::Io(e.to_string())
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::error!(tool, stderr = %stderr, "tool failed");
        if !stdout.is_empty() {
            tracing::error!(tool, stdout = %stdout, "tool stdout");
        }
        return Err(OperationError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.code(),
            stderr,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        tracing::debug!(tool, stdout = %stdout, "tool stdout");
    }
    Ok(output)
}

/// Strips a leading dot from a user-supplied format/container string, e.g.
/// `.jpg` and `jpg` are equivalent.
pub fn strip_leading_dot(s: &str) -> &str {
    s.strip_prefix('.').unwrap_or(s)
}

/// Rewrites `path`'s extension to `format` if it doesn't already match
/// (case-insensitive), as every format-accepting task does.
pub fn with_forced_extension(path: &str, format: &str) -> String {
    let format = strip_leading_dot(format);
    let suffix = format!(".{format}");
    if path.to_lowercase().ends_with(&suffix.to_lowercase()) {
        return path.to_string();
    }
    match path.rfind('.') {
        Some(idx) => format!("{}{}", &path[..idx], suffix),
        None => format!("{path}{suffix}"),
    }
}
