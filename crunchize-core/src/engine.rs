//! C6: walks a playbook's task list, resolving each task's input set,
//! filtering it, fanning out over it, and registering the result. Ported
//! from the reference implementation's `Engine.run`.

use std::panic::AssertUnwindSafe;

use rayon::prelude::*;
use serde_json::{Map, Value};

use crate::config::ResolvedConfig;
use crate::playbook::{Playbook, TaskDef};
use crate::registry::{self, Task};
use crate::sequence;
use crate::template;

#[derive(Debug, Clone, Default)]
pub struct EngineReport {
    pub task_results: Map<String, Value>,
    pub variables: Map<String, Value>,
    pub failed_tasks: Vec<String>,
}

pub struct Engine<'a> {
    config: &'a ResolvedConfig,
    dry_run: bool,
}

struct Dispatch {
    result: Value,
    was_fanout: bool,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a ResolvedConfig, dry_run: bool) -> Self {
        Engine { config, dry_run }
    }

    pub fn run(&self, playbook: &Playbook) -> EngineReport {
        let mut variables = playbook.vars.clone();
        let mut task_results: Map<String, Value> = Map::new();
        let mut task_was_loop: std::collections::HashMap<String, bool> = std::collections::HashMap::new();
        let mut previous_task_name: Option<String> = None;
        let mut failed_tasks = Vec::new();

        let total = playbook.tasks.len();
        for (index, task_def) in playbook.tasks.iter().enumerate() {
            let name = task_def.effective_name(index);
            let label = format!("[{}/{total} {name}]", index + 1);
            let span = tracing::info_span!("task", label = %label);
            let _guard = span.enter();

            let Some(type_) = task_def.type_.as_deref() else {
                tracing::warn!(task = %name, "task definition missing 'type', skipping");
                task_results.insert(name.clone(), Value::Null);
                failed_tasks.push(name.clone());
                previous_task_name = Some(name);
                continue;
            };

            let Some(task) = registry::resolve(type_) else {
                tracing::warn!(task = %name, type_, "unknown task type, skipping");
                task_results.insert(name.clone(), Value::Null);
                failed_tasks.push(name.clone());
                previous_task_name = Some(name);
                continue;
            };

            let (input, source_is_fanout) =
                self.select_input(task_def, &variables, &task_results, &task_was_loop, &previous_task_name);

            let dispatch = self.dispatch(task.as_ref(), task_def, input, source_is_fanout, &variables, &task_results);

            if dispatch.result.is_null() {
                failed_tasks.push(name.clone());
            }

            task_results.insert(name.clone(), dispatch.result.clone());
            variables.insert(name.clone(), dispatch.result);
            task_was_loop.insert(name.clone(), dispatch.was_fanout);
            previous_task_name = Some(name);
        }

        if let Some(dump_path) = &self.config.dump_path {
            self.dump_state(dump_path, &task_results, &variables);
        }

        EngineReport {
            task_results,
            variables,
            failed_tasks,
        }
    }

    /// Resolves the input set per §4.5 rule 1: `input` name (checked in
    /// `task_results` then `variables`), else `loop`, else the previous
    /// task's result, else none. Returns whether the chosen input, if an
    /// array, was itself produced by a fan-out task (and so is exempt from
    /// `file_amount`/`every_nth` filtering per rule 2).
    fn select_input(
        &self,
        task_def: &TaskDef,
        variables: &Map<String, Value>,
        task_results: &Map<String, Value>,
        task_was_loop: &std::collections::HashMap<String, bool>,
        previous_task_name: &Option<String>,
    ) -> (Option<Value>, bool) {
        if let Some(input_name) = &task_def.input {
            if let Some(v) = task_results.get(input_name) {
                let fanout = task_was_loop.get(input_name).copied().unwrap_or(false);
                return (Some(v.clone()), fanout);
            }
            if let Some(v) = variables.get(input_name) {
                return (Some(v.clone()), false);
            }
            tracing::warn!(input = %input_name, "referenced input not found");
            return (None, false);
        }

        if let Some(loop_expr) = &task_def.loop_ {
            let ctx = self.base_context(variables, task_results);
            let resolved = template::resolve(loop_expr, &ctx);
            return (Some(resolved), false);
        }

        if let Some(prev) = previous_task_name {
            if let Some(v) = task_results.get(prev) {
                let fanout = task_was_loop.get(prev).copied().unwrap_or(false);
                return (Some(v.clone()), fanout);
            }
        }

        (None, false)
    }

    /// Builds the context visible to template resolution outside of
    /// per-item iteration: `vars`, every prior task result flattened by
    /// name, and the `task_results` escape hatch, per §3.
    fn base_context(&self, variables: &Map<String, Value>, task_results: &Map<String, Value>) -> Map<String, Value> {
        let mut ctx = variables.clone();
        for (k, v) in task_results {
            ctx.insert(k.clone(), v.clone());
        }
        ctx.insert("task_results".to_string(), Value::Object(task_results.clone()));
        ctx
    }

    fn dispatch(
        &self,
        task: &dyn Task,
        task_def: &TaskDef,
        input: Option<Value>,
        source_is_fanout: bool,
        variables: &Map<String, Value>,
        task_results: &Map<String, Value>,
    ) -> Dispatch {
        let base_ctx = self.base_context(variables, task_results);

        match input {
            Some(Value::Array(items)) => {
                let items = self.apply_filters(items, source_is_fanout);

                if task_def.batch {
                    let mut ctx = base_ctx;
                    ctx.insert("items".to_string(), Value::Array(items.clone()));
                    let mut args = task_def.args.clone();
                    args.insert("items".to_string(), Value::Array(items));
                    let resolved_args = resolve_args(&args, &ctx);
                    let result = self.invoke_one(task, &resolved_args);
                    Dispatch { result, was_fanout: false }
                } else {
                    let total = items.len();
                    let first_item = items.first().cloned().unwrap_or(Value::Null);
                    let last_item = items.last().cloned().unwrap_or(Value::Null);
                    let task_span = tracing::Span::current();
                    let results: Vec<Value> = items
                        .par_iter()
                        .enumerate()
                        .map(|(index, item)| {
                            let _enter = task_span.enter();
                            let mut ctx = base_ctx.clone();
                            ctx.insert("item".to_string(), item.clone());
                            ctx.insert("index".to_string(), Value::from(index));
                            ctx.insert("total".to_string(), Value::from(total));
                            ctx.insert("first_item".to_string(), first_item.clone());
                            ctx.insert("last_item".to_string(), last_item.clone());
                            if let Value::Object(item_map) = item {
                                for (k, v) in item_map {
                                    ctx.entry(k.clone()).or_insert_with(|| v.clone());
                                }
                            }

                            let mut args = task_def.args.clone();
                            args.insert("item".to_string(), item.clone());
                            args.insert("index".to_string(), Value::from(index));
                            args.insert("total".to_string(), Value::from(total));
                            args.insert("first_item".to_string(), first_item.clone());
                            args.insert("last_item".to_string(), last_item.clone());
                            let resolved_args = resolve_args(&args, &ctx);
                            self.invoke_one(task, &resolved_args)
                        })
                        .collect();
                    Dispatch {
                        result: Value::Array(results),
                        was_fanout: true,
                    }
                }
            }
            Some(scalar) => {
                let mut ctx = base_ctx;
                let mut args = task_def.args.clone();
                if !scalar.is_null() {
                    if let Value::Object(map) = &scalar {
                        for (k, v) in map {
                            ctx.entry(k.clone()).or_insert_with(|| v.clone());
                        }
                    }
                    ctx.insert("item".to_string(), scalar.clone());
                    args.insert("item".to_string(), scalar);
                }
                let resolved_args = resolve_args(&args, &ctx);
                Dispatch {
                    result: self.invoke_one(task, &resolved_args),
                    was_fanout: false,
                }
            }
            None => {
                let resolved_args = resolve_args(&task_def.args, &base_ctx);
                Dispatch {
                    result: self.invoke_one(task, &resolved_args),
                    was_fanout: false,
                }
            }
        }
    }

    /// Applies `file_amount` stride sampling then `every_nth` thinning, in
    /// that order, matching scenario 3's "every_nth after sampling" bound.
    fn apply_filters(&self, items: Vec<Value>, source_is_fanout: bool) -> Vec<Value> {
        if source_is_fanout {
            return items;
        }

        let mut items = items;
        if let Some(file_amount) = self.config.file_amount {
            let indices = sequence::stride_indices(items.len(), file_amount);
            items = indices.into_iter().map(|i| items[i].clone()).collect();
        }
        if let Some(every_nth) = self.config.every_nth {
            let indices = sequence::every_nth_indices(items.len(), every_nth);
            items = indices.into_iter().map(|i| items[i].clone()).collect();
        }
        items
    }

    /// Runs one task invocation, converting a config/operation error or a
    /// worker panic into a logged `null`, never aborting the run.
    fn invoke_one(&self, task: &dyn Task, args: &Map<String, Value>) -> Value {
        let dry_run = self.dry_run;
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| registry::invoke(task, args, dry_run)));

        match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "task invocation failed");
                Value::Null
            }
            Err(_) => {
                tracing::error!("task invocation panicked");
                Value::Null
            }
        }
    }

    fn dump_state(&self, dump_path: &std::path::Path, task_results: &Map<String, Value>, variables: &Map<String, Value>) {
        let mut state = Map::new();
        state.insert("task_results".to_string(), Value::Object(task_results.clone()));
        state.insert("variables".to_string(), Value::Object(variables.clone()));

        match serde_yaml::to_string(&Value::Object(state)) {
            Ok(text) => {
                if let Err(e) = std::fs::write(dump_path, text) {
                    tracing::warn!(path = %dump_path.display(), error = %e, "failed to write state dump");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize state dump"),
        }
    }
}

fn resolve_args(args: &Map<String, Value>, ctx: &Map<String, Value>) -> Map<String, Value> {
    match template::resolve(&Value::Object(args.clone()), ctx) {
        Value::Object(map) => map,
        _ => args.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolved_config() -> ResolvedConfig {
        ResolvedConfig::default()
    }

    #[test]
    fn fan_out_over_glob_result_then_registers_results() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.exr", "b.exr"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pattern = dir.path().join("*.exr");

        let yaml = format!(
            "tasks:\n  - name: find\n    type: filein\n    args:\n      pattern: \"{}\"\n  - name: map\n    type: pathmap\n    args:\n      search: \"{}\"\n      replace: \"/out\"\n",
            pattern.to_string_lossy().replace('\\', "\\\\"),
            dir.path().to_string_lossy().replace('\\', "\\\\"),
        );
        let playbook: Playbook = serde_yaml::from_str(&yaml).unwrap();

        let config = resolved_config();
        let engine = Engine::new(&config, false);
        let report = engine.run(&playbook);

        let find_result = report.task_results.get("find").unwrap().as_array().unwrap();
        assert_eq!(find_result.len(), 2);

        let map_result = report.task_results.get("map").unwrap().as_array().unwrap();
        assert_eq!(map_result.len(), 2);
        for entry in map_result {
            assert!(entry["dst"].as_str().unwrap().starts_with("/out"));
        }
    }

    #[test]
    fn unknown_task_type_is_skipped_not_fatal() {
        let yaml = "tasks:\n  - name: bogus\n    type: does_not_exist\n";
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        let config = resolved_config();
        let engine = Engine::new(&config, false);
        let report = engine.run(&playbook);
        assert_eq!(report.task_results.get("bogus"), Some(&Value::Null));
        assert_eq!(report.failed_tasks, vec!["bogus".to_string()]);
    }

    #[test]
    fn explicit_loop_resolves_against_vars() {
        let yaml = "vars:\n  shots: [a, b, c]\ntasks:\n  - name: echoed\n    type: delete\n    loop: \"{{ shots }}\"\n    args:\n      path: \"{{ item }}\"\n";
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        let config = resolved_config();
        let engine = Engine::new(&config, true);
        let report = engine.run(&playbook);
        let results = report.task_results.get("echoed").unwrap().as_array().unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn first_item_and_last_item_resolve_to_real_values() {
        let yaml = "vars:\n  shots: [a, b, c]\ntasks:\n  - name: echoed\n    type: delete\n    loop: \"{{ shots }}\"\n    args:\n      path: \"{{ first_item }}-{{ last_item }}-{{ item }}\"\n";
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        let config = resolved_config();
        let engine = Engine::new(&config, true);
        let report = engine.run(&playbook);
        let results = report.task_results.get("echoed").unwrap().as_array().unwrap();
        let rendered: Vec<&str> = results.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(rendered, vec!["a-c-a", "a-c-b", "a-c-c"]);
    }

    #[test]
    fn scalar_map_input_merges_keys_into_resolution_context() {
        let yaml = "vars:\n  mapped:\n    dst: /out/shot.exr\ntasks:\n  - name: cleanup\n    type: delete\n    input: mapped\n    args:\n      path: \"{{ dst }}\"\n";
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        let config = resolved_config();
        let engine = Engine::new(&config, true);
        let report = engine.run(&playbook);
        assert_eq!(report.task_results.get("cleanup"), Some(&Value::String("/out/shot.exr".to_string())));
    }

    #[test]
    fn batch_dispatch_is_a_single_invocation() {
        let yaml = "vars:\n  shots: [a, b]\ntasks:\n  - name: grouped\n    type: delete\n    loop: \"{{ shots }}\"\n    batch: true\n    args:\n      path: \"x\"\n";
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        let config = resolved_config();
        let engine = Engine::new(&config, true);
        let report = engine.run(&playbook);
        // batch dispatch returns whatever the single task invocation
        // returned (a delete task's resolved path), not an array of results.
        assert!(report.task_results.get("grouped").unwrap().is_string());
    }
}
