use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(about, version, author)]
pub struct Args {
    #[clap(subcommand)]
    pub subcommand: SkuaCommand,
    /// Print debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum SkuaCommand {
    /// Search Contents indexes for files matching the given patterns
    #[clap(alias = "search")]
    Provides(Provides),
    /// Show available and installed versions of packages
    #[clap(alias = "versions")]
    ShowVersions(ShowVersions),
    /// Parse a Debian changelog and print its newest entry
    ParseChangelog(ParseChangelog),
}

#[derive(Parser, Debug)]
pub struct Provides {
    /// Pattern(s) to look for in file paths
    #[arg(required = true)]
    pub patterns: Vec<String>,
    /// Contents index directory
    #[arg(long, short = 'c')]
    pub cache: Option<PathBuf>,
    /// Case-insensitive matching
    #[arg(long, short = 'i')]
    pub ignore_case: bool,
}

#[derive(Parser, Debug)]
pub struct ShowVersions {
    /// Package(s) to report; every installed package when empty
    pub packages: Vec<String>,
    /// Package lists directory
    #[arg(long)]
    pub lists: Option<PathBuf>,
    /// dpkg status file
    #[arg(long)]
    pub status: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ParseChangelog {
    /// Changelog file
    pub file: PathBuf,
}
