use anyhow::Result;
use clap::Parser;

use crate::cmd::{App, Cmd};

mod cmd;
mod logging;

fn main() -> Result<()> {
    let app = App::parse();
    app.run()
}
