//! thumbnail: picks a single representative frame out of a sequence and
//! shells out to `oiiotool` to resize it. Ported from `ThumbnailTask`.

use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::pathinfer::{resolve_path, Direction};
use crate::registry::Task;
use crate::tasks::common::{ensure_parent_dir, existing_mode, get_f64, get_str, run_tool, with_forced_extension, Existing};

const TOOL: &str = "oiiotool";

pub struct ThumbnailTask;

impl Task for ThumbnailTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        if args.get("output_path").is_none() {
            return Err(ConfigError::MissingArg {
                task: "thumbnail".to_string(),
                arg: "output_path".to_string(),
            });
        }
        if args.get("input_files").is_none() && args.get("item").is_none() {
            return Err(ConfigError::MissingArg {
                task: "thumbnail".to_string(),
                arg: "input_files".to_string(),
            });
        }
        if let Some(frac) = get_f64(args, "sourcelocation") {
            if !(0.0..=1.0).contains(&frac) {
                return Err(ConfigError::InvalidArg {
                    task: "thumbnail".to_string(),
                    arg: "sourcelocation".to_string(),
                    reason: "must be within [0, 1]".to_string(),
                });
            }
        }
        existing_mode(args, "thumbnail")?;
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<Value, OperationError> {
        let input_path = pick_source_frame(args)
            .ok_or_else(|| OperationError::Io("thumbnail: no input frames available".to_string()))?;

        let mut output_path = args["output_path"].as_str().unwrap().to_string();
        if let Some(fmt) = get_str(args, "output_format") {
            output_path = with_forced_extension(&output_path, fmt);
        } else {
            output_path = with_forced_extension(&output_path, "jpg");
        }

        let existing = existing_mode(args, "thumbnail").unwrap_or(Existing::Replace);
        if existing == Existing::Skip && std::path::Path::new(&output_path).exists() {
            tracing::info!(output_path, "skipping thumbnail: output already exists");
            return Ok(Value::String(output_path));
        }

        ensure_parent_dir(&output_path, dry_run)?;

        let size = args.get("size").and_then(Value::as_str).map(str::to_string);
        let argv = build_argv(&input_path, size.as_deref(), &output_path);

        if dry_run {
            tracing::info!(cmd = %argv.join(" "), "dry-run: would execute");
            return Ok(Value::String(output_path));
        }

        run_tool(TOOL, &argv)?;
        Ok(Value::String(output_path))
    }
}

fn pick_source_frame(args: &Map<String, Value>) -> Option<String> {
    let frames: Vec<String> = match args.get("input_files") {
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };

    if frames.is_empty() {
        let item = args.get("item")?;
        return Some(resolve_path(item, Direction::Input)).filter(|s| !s.is_empty());
    }

    let frac = get_f64(args, "sourcelocation").unwrap_or(0.5).clamp(0.0, 1.0);
    let idx = ((frames.len() as f64 * frac) as usize).min(frames.len() - 1);
    frames.get(idx).cloned()
}

fn build_argv(input: &str, size: Option<&str>, output: &str) -> Vec<String> {
    let mut argv = vec![input.to_string()];
    if let Some(size) = size {
        argv.push("--resize".to_string());
        argv.push(size.to_string());
    }
    argv.push("-o".to_string());
    argv.push(output.to_string());
    argv
}
