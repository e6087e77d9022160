//! path-mapping: rewrites a resolved source path via literal or regex
//! substitution (standard mode), or groups a list of items into per-shot
//! `{files, base_path}` records on their mapped paths (reduce mode). Ported
//! from `PathMappingTask`.

use std::collections::HashMap;

use path_clean::PathClean;
use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::registry::Task;
use crate::sequence;
use crate::tasks::common::{get_bool, get_str, require_str};

pub struct PathMapTask;

impl Task for PathMapTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        require_str(args, "search", "pathmap")?;
        require_str(args, "replace", "pathmap")?;
        if get_bool(args, "regex", false) {
            let search = require_str(args, "search", "pathmap")?;
            Regex::new(search).map_err(|e| ConfigError::InvalidArg {
                task: "pathmap".to_string(),
                arg: "search".to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, _dry_run: bool) -> Result<Value, OperationError> {
        let search = args.get("search").and_then(Value::as_str).unwrap_or_default();
        let replace = args.get("replace").and_then(Value::as_str).unwrap_or_default();
        let regex_mode = get_bool(args, "regex", false);
        let input_key = get_str(args, "input_key");
        let reduce = get_bool(args, "reduce", false);
        let input_path_override = get_str(args, "input_path");

        if reduce {
            if let Some(Value::Array(items)) = args.get("items") {
                return reduce_mode(items, input_path_override, input_key, search, replace, regex_mode);
            }
        }

        let source = resolve_source(args.get("item"), input_path_override, input_key)
            .unwrap_or_default();
        let dst = apply_mapping(&source, search, replace, regex_mode)?;

        let mut record = Map::new();
        record.insert("src".to_string(), Value::String(source));
        record.insert("dst".to_string(), Value::String(dst));
        Ok(Value::Object(record))
    }
}

fn resolve_source(item: Option<&Value>, input_path_override: Option<&str>, input_key: Option<&str>) -> Option<String> {
    if let Some(p) = input_path_override {
        return Some(p.to_string());
    }
    match item? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            if let Some(k) = input_key {
                return match map.get(k) {
                    Some(Value::String(s)) => Some(s.clone()),
                    _ => None,
                };
            }
            for k in ["dst", "src", "item"] {
                if let Some(Value::String(s)) = map.get(k) {
                    return Some(s.clone());
                }
            }
            None
        }
        _ => None,
    }
}

fn apply_mapping(source: &str, search: &str, replace: &str, regex_mode: bool) -> Result<String, OperationError> {
    if regex_mode {
        let re = Regex::new(search).map_err(|e| OperationError::Io(e.to_string()))?;
        let mapped = re.replace_all(source, replace).into_owned();
        return Ok(std::path::Path::new(&mapped).clean().to_string_lossy().into_owned());
    }

    let mut repl = replace.to_string();
    let ends_with_sep = |s: &str| s.ends_with('/') || s.ends_with('\\');
    if ends_with_sep(search) && !ends_with_sep(replace) {
        repl.push(search.chars().last().unwrap());
    }
    let mapped = source.replace(search, &repl);
    Ok(std::path::Path::new(&mapped).clean().to_string_lossy().into_owned())
}

fn reduce_mode(
    items: &[Value],
    input_path_override: Option<&str>,
    input_key: Option<&str>,
    search: &str,
    replace: &str,
    regex_mode: bool,
) -> Result<Value, OperationError> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), Vec<(String, Value)>> = HashMap::new();

    for item in items {
        let source = resolve_source(Some(item), input_path_override, input_key).unwrap_or_default();
        let mapped = apply_mapping(&source, search, replace, regex_mode)?;
        let key = match sequence::match_frame(&mapped) {
            Some(m) => (m.stem, m.extension),
            None => (mapped, String::new()),
        };
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push((source, item.clone()));
    }

    let mut out = Vec::new();
    for key in order {
        let mut entries = groups.remove(&key).unwrap();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let files: Vec<Value> = entries.into_iter().map(|(_, item)| item).collect();

        let mut record = Map::new();
        record.insert("files".to_string(), Value::Array(files));
        record.insert("base_path".to_string(), Value::String(key.0));
        out.push(Value::Object(record));
    }

    Ok(Value::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn args_with_item(item: Value, search: &str, replace: &str) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("item".to_string(), item);
        args.insert("search".to_string(), json!(search));
        args.insert("replace".to_string(), json!(replace));
        args
    }

    #[test]
    fn standard_mode_maps_src_to_dst() {
        let task = PathMapTask;
        let args = args_with_item(json!("/in/shot.1001.exr"), "/in", "/out");
        let result = task.run(&args, false).unwrap();
        assert_eq!(result, json!({"src": "/in/shot.1001.exr", "dst": "/out/shot.1001.exr"}));
    }

    #[test]
    fn trailing_separator_heuristic_appends_missing_slash() {
        let task = PathMapTask;
        let args = args_with_item(json!("/in/shot.1001.exr"), "/in/", "/out");
        let result = task.run(&args, false).unwrap();
        assert_eq!(result["dst"], json!("/out/shot.1001.exr"));
    }

    #[test]
    fn reduce_mode_groups_two_shots() {
        let task = PathMapTask;
        let mut args = Map::new();
        args.insert("search".to_string(), json!("/in"));
        args.insert("replace".to_string(), json!("/out"));
        args.insert("reduce".to_string(), json!(true));
        args.insert(
            "items".to_string(),
            json!([
                "/in/shotA.1001.exr",
                "/in/shotA.1002.exr",
                "/in/shotA.1003.exr",
                "/in/shotB.1001.exr",
                "/in/shotB.1002.exr",
                "/in/shotB.1003.exr",
            ]),
        );
        let result = task.run(&args, false).unwrap();
        let arr = result.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["files"].as_array().unwrap().len(), 3);
        assert_eq!(arr[0]["base_path"], json!("/out/shotA"));
        assert_eq!(arr[1]["base_path"], json!("/out/shotB"));
    }

    #[test]
    fn invalid_regex_rejected_at_validate() {
        let task = PathMapTask;
        let mut args = Map::new();
        args.insert("search".to_string(), json!("(unclosed"));
        args.insert("replace".to_string(), json!("x"));
        args.insert("regex".to_string(), json!(true));
        assert!(task.validate(&args).is_err());
    }
}
