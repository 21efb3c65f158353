// SPDX-License-Identifier: MIT

mod cat;
mod cli;
mod utils;

use clap::Parser;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::init_logger(utils::LogLevel::from_flags(cli.quiet, cli.verbose));

    let summary = cat::run(&cli)?;
    cat::print_summary(&cli, &summary);
    Ok(())
}
