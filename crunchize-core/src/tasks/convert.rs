//! color conversion: a thin shell over `ocioconvert`. Ported from
//! `ConvertTask`.

use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::registry::Task;
use crate::tasks::common::{ensure_parent_dir, existing_mode, require_str, with_forced_extension, Existing};

const TOOL: &str = "ocioconvert";

pub struct ConvertTask;

impl Task for ConvertTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        for key in ["input_path", "output_path", "config_path", "input_space", "output_space"] {
            require_str(args, key, "convert")?;
        }
        existing_mode(args, "convert")?;
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<Value, OperationError> {
        let input_path = args["input_path"].as_str().unwrap().to_string();
        let config_path = args["config_path"].as_str().unwrap().to_string();
        let input_space = args["input_space"].as_str().unwrap().to_string();
        let output_space = args["output_space"].as_str().unwrap().to_string();
        let mut output_path = args["output_path"].as_str().unwrap().to_string();

        if let Some(fmt) = args.get("output_format").and_then(Value::as_str) {
            output_path = with_forced_extension(&output_path, fmt);
        }

        let existing = existing_mode(args, "convert").unwrap_or(Existing::Replace);
        if existing == Existing::Skip && std::path::Path::new(&output_path).exists() {
            tracing::info!(output_path, "skipping convert: output already exists");
            return Ok(Value::String(output_path));
        }

        ensure_parent_dir(&output_path, dry_run)?;

        let argv = build_argv(&config_path, &input_path, &input_space, &output_path, &output_space);

        if dry_run {
            tracing::info!(cmd = %argv.join(" "), "dry-run: would execute");
            return Ok(Value::String(output_path));
        }

        crate::tasks::common::run_tool(TOOL, &argv)?;
        Ok(Value::String(output_path))
    }
}

fn build_argv(config: &str, input: &str, input_space: &str, output: &str, output_space: &str) -> Vec<String> {
    vec![
        "--iconfig".to_string(),
        config.to_string(),
        input.to_string(),
        input_space.to_string(),
        output.to_string(),
        output_space.to_string(),
    ]
}
