//! C5 (config half): the global defaults file and its three-tier merge with
//! playbook `config` and CLI flags. The discovery-order fallback chain and
//! the `.or()`-chained precedence merge mirror the reference
//! implementation's `Config::resolve_path` and `Options::compile`.

use std::path::PathBuf;

use serde::Deserialize;

use crate::playbook::PlaybookConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    pub every_nth: Option<usize>,
    pub file_amount: Option<f64>,
    pub log_path: Option<PathBuf>,
    pub wipe_log: Option<bool>,
    pub dump_path: Option<PathBuf>,
}

/// Overrides supplied on the command line; only `file_amount` has a
/// configuration counterpart per §6.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub file_amount: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub every_nth: Option<usize>,
    pub file_amount: Option<f64>,
    pub log_path: Option<PathBuf>,
    pub wipe_log: bool,
    pub dump_path: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Merges, lowest to highest precedence: global defaults file <
    /// playbook `config` < CLI flags. Each tier only overrides fields it
    /// actually set.
    pub fn merge(global: Option<&GlobalConfig>, playbook: &PlaybookConfig, cli: &CliOverrides) -> Self {
        Self {
            every_nth: playbook.every_nth.or_else(|| global.and_then(|g| g.every_nth)),
            file_amount: cli
                .file_amount
                .or(playbook.file_amount)
                .or_else(|| global.and_then(|g| g.file_amount)),
            log_path: playbook
                .log_path
                .clone()
                .or_else(|| global.and_then(|g| g.log_path.clone())),
            wipe_log: playbook
                .wipe_log
                .or_else(|| global.and_then(|g| g.wipe_log))
                .unwrap_or(false),
            dump_path: playbook
                .dump_path
                .clone()
                .or_else(|| global.and_then(|g| g.dump_path.clone())),
        }
    }
}

const EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Search order: alongside the running binary, its `crunchize/` subdir, the
/// current working directory, its `crunchize/` subdir, then
/// `~/.crunchize/config`. First structured `config.<ext>` file found wins;
/// absence anywhere is not an error.
fn candidate_bases() -> Vec<PathBuf> {
    let mut bases = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            bases.push(dir.join("config"));
            bases.push(dir.join("crunchize").join("config"));
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        bases.push(cwd.join("config"));
        bases.push(cwd.join("crunchize").join("config"));
    }
    if let Some(home) = dirs::home_dir() {
        bases.push(home.join(".crunchize").join("config"));
    }
    bases
}

/// Discovers and parses the global defaults file, if any.
pub fn discover_global_config() -> Option<GlobalConfig> {
    for base in candidate_bases() {
        for ext in EXTENSIONS {
            let candidate = base.with_extension(ext);
            if !candidate.is_file() {
                continue;
            }
            let builder = config::Config::builder()
                .add_source(config::File::from(candidate.clone()))
                .build();
            match builder.and_then(|c| c.try_deserialize::<GlobalConfig>()) {
                Ok(parsed) => return Some(parsed),
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "failed to parse global config");
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_overrides_playbook_overrides_global() {
        let global = GlobalConfig {
            file_amount: Some(0.1),
            every_nth: Some(2),
            ..Default::default()
        };
        let playbook = PlaybookConfig {
            file_amount: Some(0.5),
            every_nth: None,
            ..Default::default()
        };
        let cli = CliOverrides {
            file_amount: Some(0.9),
        };
        let resolved = ResolvedConfig::merge(Some(&global), &playbook, &cli);
        assert_eq!(resolved.file_amount, Some(0.9));
        assert_eq!(resolved.every_nth, Some(2));
    }

    #[test]
    fn missing_tiers_fall_through() {
        let playbook = PlaybookConfig::default();
        let resolved = ResolvedConfig::merge(None, &playbook, &CliOverrides::default());
        assert_eq!(resolved.file_amount, None);
        assert!(!resolved.wipe_log);
    }
}
