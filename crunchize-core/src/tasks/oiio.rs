//! image processing: a thin shell over `oiiotool`, falling back to path
//! inference (C2) when `input_path`/`output_path` are omitted. Ported from
//! `OIIOToolTask`.

use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::pathinfer::{resolve_path, Direction};
use crate::registry::Task;
use crate::tasks::common::{ensure_parent_dir, existing_mode, get_str, run_tool, Existing};

const TOOL: &str = "oiiotool";

pub struct OiioTask;

impl Task for OiioTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        if args.get("output_path").is_none() && args.get("item").is_none() {
            return Err(ConfigError::MissingArg {
                task: "oiio".to_string(),
                arg: "output_path".to_string(),
            });
        }
        if args.get("input_path").is_none() && args.get("item").is_none() {
            return Err(ConfigError::MissingArg {
                task: "oiio".to_string(),
                arg: "input_path".to_string(),
            });
        }
        existing_mode(args, "oiio")?;
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<Value, OperationError> {
        let item = args.get("item");
        let input_path = get_str(args, "input_path")
            .map(str::to_string)
            .or_else(|| item.map(|i| resolve_path(i, Direction::Input)))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OperationError::Io("could not determine input_path".to_string()))?;
        let output_path = get_str(args, "output_path")
            .map(str::to_string)
            .or_else(|| item.map(|i| resolve_path(i, Direction::Output)))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OperationError::Io("could not determine output_path".to_string()))?;

        let existing = existing_mode(args, "oiio").unwrap_or(Existing::Replace);
        if existing == Existing::Skip && std::path::Path::new(&output_path).exists() {
            tracing::info!(output_path, "skipping processing: output already exists");
            return Ok(Value::String(output_path));
        }

        ensure_parent_dir(&output_path, dry_run)?;

        let width = args.get("width").and_then(Value::as_u64);
        let height = args.get("height").and_then(Value::as_u64);
        let scale = args.get("scale").map(Scale::from_value);
        let extra_args = extra_args_of(args);

        let argv = build_argv(&input_path, width, height, scale.as_ref(), &extra_args, &output_path);

        if dry_run {
            tracing::info!(cmd = %argv.join(" "), "dry-run: would execute");
            return Ok(Value::String(output_path));
        }

        run_tool(TOOL, &argv)?;
        tracing::info!(output_path, "successfully processed");
        Ok(Value::String(output_path))
    }
}

/// A `scale` argument is either a fraction (rendered as a percent string,
/// e.g. `0.5` -> `"50%"`) or a raw literal passed straight to `--resize`
/// (e.g. `50` -> `"50"`), distinguished the way the original task checks
/// `isinstance(scale, float)` before formatting it.
enum Scale {
    Fraction(f64),
    Literal(String),
}

impl Scale {
    fn from_value(v: &Value) -> Scale {
        if v.is_i64() || v.is_u64() {
            Scale::Literal(v.to_string())
        } else {
            Scale::Fraction(v.as_f64().unwrap_or(1.0))
        }
    }

    fn render(&self) -> String {
        match self {
            Scale::Fraction(f) => format!("{}%", f * 100.0),
            Scale::Literal(s) => s.clone(),
        }
    }
}

fn extra_args_of(args: &Map<String, Value>) -> Vec<String> {
    match args.get("extra_args") {
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn build_argv(
    input: &str,
    width: Option<u64>,
    height: Option<u64>,
    scale: Option<&Scale>,
    extra_args: &[String],
    output: &str,
) -> Vec<String> {
    let mut argv = vec![input.to_string()];

    match (width, height) {
        (Some(w), Some(h)) => {
            argv.push("--fit".to_string());
            argv.push(format!("{w}x{h}"));
            argv.push("--canvas".to_string());
            argv.push(format!("{w}x{h}"));
        }
        (Some(w), None) => {
            argv.push("--resize".to_string());
            argv.push(format!("{w}x0"));
        }
        (None, Some(h)) => {
            argv.push("--resize".to_string());
            argv.push(format!("0x{h}"));
        }
        (None, None) => {}
    }

    if let Some(scale) = scale {
        argv.push("--resize".to_string());
        argv.push(scale.render());
    }

    argv.extend(extra_args.iter().cloned());
    argv.push("-o".to_string());
    argv.push(output.to_string());
    argv
}
