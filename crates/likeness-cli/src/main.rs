//! `likeness` command-line tool

use clap::Parser;
use likeness_cli::{print_report, run, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let report = run(&cli)?;
    print_report(&report);
    Ok(())
}
