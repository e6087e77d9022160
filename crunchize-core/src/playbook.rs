//! C5: playbook document shape and loading. The document itself is YAML,
//! the same format family the reference implementation's earlier
//! generations used for their own rule documents.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::LoadError;
use crate::template;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybookConfig {
    pub every_nth: Option<usize>,
    pub file_amount: Option<f64>,
    pub log_path: Option<PathBuf>,
    pub wipe_log: Option<bool>,
    pub dump_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDef {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(rename = "loop", default)]
    pub loop_: Option<Value>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub batch: bool,
}

impl TaskDef {
    /// The display/registration name: the declared `name`, or `"Task
    /// <index>"` for an unnamed task definition.
    pub fn effective_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Task {index}"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Playbook {
    #[serde(default)]
    pub vars: Map<String, Value>,
    #[serde(default)]
    pub config: PlaybookConfig,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

impl Playbook {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound);
        }
        let text = std::fs::read_to_string(path)?;
        let mut playbook: Playbook = serde_yaml::from_str(&text)?;
        playbook.vars = resolve_vars_once(&playbook.vars);
        Ok(playbook)
    }
}

/// Resolves `vars` against itself in a single pass, as required by §3: each
/// variable sees the *original* (unresolved) sibling values, so
/// `{a: "{{b}}", b: "x"}` yields `{a: "x", b: "x"}` without iterating to a
/// fixpoint.
fn resolve_vars_once(vars: &Map<String, Value>) -> Map<String, Value> {
    let resolved = template::resolve(&Value::Object(vars.clone()), vars);
    match resolved {
        Value::Object(map) => map,
        _ => vars.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn vars_self_resolve_in_one_pass() {
        let mut vars = Map::new();
        vars.insert("a".to_string(), json!("{{b}}"));
        vars.insert("b".to_string(), json!("x"));
        let resolved = resolve_vars_once(&vars);
        assert_eq!(resolved.get("a").unwrap(), &json!("x"));
        assert_eq!(resolved.get("b").unwrap(), &json!("x"));
    }

    #[test]
    fn unnamed_task_gets_index_name() {
        let task = TaskDef {
            name: None,
            type_: Some("filein".into()),
            args: Map::new(),
            loop_: None,
            input: None,
            batch: false,
        };
        assert_eq!(task.effective_name(2), "Task 2");
    }

    #[test]
    fn load_missing_playbook_is_not_found() {
        let err = Playbook::load(Path::new("/nonexistent/playbook.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound));
    }
}
