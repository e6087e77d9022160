//! parse-path: extracts a named-capture map out of a resolved source string
//! via a compiled regular expression. Ported from `ParsePathTask`.

use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::registry::Task;
use crate::tasks::common::{get_str, require_str};

pub struct ParsePathTask;

impl Task for ParsePathTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        let pattern = require_str(args, "pattern", "parsepath")?;
        Regex::new(pattern).map_err(|e| ConfigError::InvalidArg {
            task: "parsepath".to_string(),
            arg: "pattern".to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, _dry_run: bool) -> Result<Value, OperationError> {
        let pattern = args.get("pattern").and_then(Value::as_str).unwrap_or_default();
        let re = Regex::new(pattern).map_err(|e| OperationError::Io(e.to_string()))?;

        let source = resolve_source(args).unwrap_or_default();

        let mut captures = Map::new();
        match re.captures(&source) {
            Some(caps) => {
                for name in re.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        captures.insert(name.to_string(), Value::String(m.as_str().to_string()));
                    }
                }
            }
            None => {
                tracing::warn!(source, pattern, "parsepath: no match");
            }
        }

        Ok(Value::Object(captures))
    }
}

fn resolve_source(args: &Map<String, Value>) -> Option<String> {
    if let Some(p) = get_str(args, "input_path") {
        return Some(p.to_string());
    }
    match args.get("item") {
        Some(Value::String(s)) => return Some(s.clone()),
        Some(Value::Object(map)) => {
            for key in ["src", "dst", "item", "input_path"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return Some(s.clone());
                }
            }
        }
        _ => {}
    }
    None
}
