//! fsautoproc CLI entry point.

use anyhow::Result;
use clap::Parser;
use fsautoproc::engine::{Cli, RunOptions, run};

fn main() -> Result<()> {
    let cli = Cli::parse();
    fsautoproc::utils::setup_logging(cli.verbose);
    let opts = RunOptions::from(&cli);
    run(&opts)
}
