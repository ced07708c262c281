use std::process::exit;

mod args;
mod subcommand;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

use crate::args::{Args, SkuaCommand};

fn main() {
    let code = match try_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            e.chain()
                .skip(1)
                .for_each(|cause| eprintln!("  caused by: {cause}"));
            1
        }
    };

    exit(code);
}

fn try_main() -> Result<i32> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false)
                .with_filter(if args.debug {
                    LevelFilter::DEBUG
                } else {
                    LevelFilter::INFO
                }),
        )
        .try_init()?;

    debug!("skua version: {}", env!("CARGO_PKG_VERSION"));

    match args.subcommand {
        SkuaCommand::Provides(args) => subcommand::provides(args),
        SkuaCommand::ShowVersions(args) => subcommand::show_versions(args),
        SkuaCommand::ParseChangelog(args) => subcommand::parse_changelog(args),
    }
}
