use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueHint};
use crunchize_core::config::{discover_global_config, CliOverrides};
use crunchize_core::{Engine, Error, Playbook, ResolvedConfig};

use crate::cmd::Cmd;
use crate::logging;

#[derive(Parser, Debug)]
pub struct Run {
    #[arg(value_hint = ValueHint::FilePath)]
    playbook: PathBuf,

    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[arg(long)]
    file_amount: Option<f64>,

    /// Repeatable: -v for debug, -vv for trace.
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,
}

impl Cmd for Run {
    fn run(self) -> Result<()> {
        let playbook = Playbook::load(&self.playbook).map_err(|source| Error::Load {
            path: self.playbook.clone(),
            source,
        })?;

        let global = discover_global_config();
        let cli = CliOverrides {
            file_amount: self.file_amount,
        };
        let resolved = ResolvedConfig::merge(global.as_ref(), &playbook.config, &cli);

        let _guard = logging::init(&resolved, self.verbose);
        tracing::info!(playbook = %self.playbook.display(), dry_run = self.dry_run, "starting run");

        let engine = Engine::new(&resolved, self.dry_run);
        let report = engine.run(&playbook);

        if !report.failed_tasks.is_empty() {
            tracing::warn!(failed = ?report.failed_tasks, "one or more tasks failed");
        }

        tracing::info!("run completed");
        Ok(())
    }
}
