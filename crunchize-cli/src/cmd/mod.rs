use clap::{Parser, Subcommand};

use crate::cmd::run::Run;

mod run;

#[derive(Subcommand)]
enum Command {
    Run(Run),
}

#[derive(Parser)]
#[command(name = "crunchize", about, author, version)]
pub struct App {
    #[command(subcommand)]
    command: Command,
}

pub trait Cmd {
    fn run(self) -> anyhow::Result<()>;
}

impl Cmd for App {
    fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run(cmd) => cmd.run(),
        }
    }
}
