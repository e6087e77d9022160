//! C1: substitutes `{{ expr }}` occurrences in playbook values against a
//! per-task context. Grounded on the reference implementation's recursive
//! `_resolve_variable` (whole-string vs. interpolation split, bounded
//! recursion) and its local layout-engine resolver (path + filter grammar).

mod filters;
pub mod parser;

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use self::parser::{parse_expression, Expression, PathSegment};

const MAX_DEPTH: u32 = 10;

/// Roots that are expected to be absent in many contexts (e.g. a task that
/// never iterates has no `item`); missing lookups here never warn.
const SILENT_ROOTS: &[&str] = &[
    "item",
    "items",
    "task_results",
    "frame",
    "first_frame",
    "last_frame",
    "filename",
    "frame_index",
];

fn whole_expr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{\{(.*)\}\}$").unwrap())
}

fn interp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(.*?)\}\}").unwrap())
}

/// Resolves every `{{ ... }}` occurrence in `value` against `ctx`, recursing
/// into arrays and maps. Never fails: unresolved expressions are left
/// textually intact (interpolation) or become `Value::Null` (whole-string).
pub fn resolve(value: &Value, ctx: &Map<String, Value>) -> Value {
    resolve_depth(value, ctx, 0)
}

fn resolve_depth(value: &Value, ctx: &Map<String, Value>, depth: u32) -> Value {
    match value {
        Value::String(s) => resolve_string(s, ctx, depth),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_depth(v, ctx, depth))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_depth(v, ctx, depth)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(s: &str, ctx: &Map<String, Value>, depth: u32) -> Value {
    if depth > MAX_DEPTH {
        tracing::warn!(value = %s, "max template recursion depth reached");
        return Value::String(s.to_string());
    }

    let trimmed = s.trim();
    if let Some(caps) = whole_expr_re().captures(trimmed) {
        return match eval(caps[1].trim(), ctx) {
            Some(v) => resolve_depth(&v, ctx, depth + 1),
            None => Value::Null,
        };
    }

    let mut changed = false;
    let new_s = interp_re()
        .replace_all(s, |caps: &regex::Captures| {
            match eval(caps[1].trim(), ctx) {
                Some(v) => {
                    changed = true;
                    to_interp_string(&v)
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    if changed && new_s != s {
        resolve_string(&new_s, ctx, depth + 1)
    } else {
        Value::String(new_s)
    }
}

/// Evaluates one expression payload (already stripped of `{{`/`}}`) against
/// `ctx`. Returns `None` when any path segment is missing, emitting a
/// warning unless the unresolved root is in `SILENT_ROOTS`.
fn eval(expr_str: &str, ctx: &Map<String, Value>) -> Option<Value> {
    let expr = parse_expression(expr_str)?;
    let mut cur = match ctx.get(&expr.root) {
        Some(v) => v.clone(),
        None => {
            if !SILENT_ROOTS.contains(&expr.root.as_str()) {
                tracing::warn!(expression = %expr_str, root = %expr.root, "unresolved variable");
            }
            return None;
        }
    };

    for seg in &expr.path {
        cur = descend(&cur, seg)?;
    }

    for f in &expr.filters {
        cur = filters::apply(cur, f);
    }

    Some(cur)
}

fn descend(value: &Value, seg: &PathSegment) -> Option<Value> {
    match seg {
        PathSegment::Attr(name) | PathSegment::Key(name) => {
            value.as_object().and_then(|m| m.get(name)).cloned()
        }
        PathSegment::Index(i) => {
            let arr = value.as_array()?;
            let idx = if *i < 0 {
                arr.len().checked_sub(i.unsigned_abs() as usize)?
            } else {
                *i as usize
            };
            arr.get(idx).cloned()
        }
    }
}

fn to_interp_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn whole_string_preserves_type() {
        let c = ctx(vec![("item", json!({"src": "/a.exr"}))]);
        let v = resolve(&json!("{{ item }}"), &c);
        assert_eq!(v, json!({"src": "/a.exr"}));
    }

    #[test]
    fn interpolation_casts_to_string() {
        let c = ctx(vec![("frame", json!(1001))]);
        let v = resolve(&json!("shot.{{ frame }}.exr"), &c);
        assert_eq!(v, json!("shot.1001.exr"));
    }

    #[test]
    fn unresolved_interpolation_left_intact() {
        let c = ctx(vec![]);
        let v = resolve(&json!("shot.{{ missing }}.exr"), &c);
        assert_eq!(v, json!("shot.{{ missing }}.exr"));
    }

    #[test]
    fn self_referential_vars_resolve() {
        let mut c = ctx(vec![("a", json!("{{b}}")), ("b", json!("x"))]);
        loop {
            let resolved: Map<String, Value> = c
                .iter()
                .map(|(k, v)| (k.clone(), resolve(v, &c)))
                .collect();
            if resolved == c {
                break;
            }
            c = resolved;
        }
        assert_eq!(c.get("a").unwrap(), &json!("x"));
        assert_eq!(c.get("b").unwrap(), &json!("x"));
    }

    #[test]
    fn nested_index_and_filter() {
        let c = ctx(vec![("item", json!({"files": ["/a/b.exr", "/a/c.exr"]}))]);
        let v = resolve(&json!("{{ item.files[0] | basename }}"), &c);
        assert_eq!(v, json!("b.exr"));
    }

    #[test]
    fn bounded_recursion_on_cycle() {
        let c = ctx(vec![("a", json!("{{a}}"))]);
        let v = resolve(&json!("{{a}}"), &c);
        // depth exhausts; last textual form is returned, never panics/hangs.
        assert!(matches!(v, Value::String(_)));
    }
}
