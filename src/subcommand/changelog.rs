use std::fs;

use anyhow::{bail, Context, Result};
use skua_lists::changelog::parse_changelog as parse;
use tracing::warn;

use crate::args::ParseChangelog;

pub fn parse_changelog(args: ParseChangelog) -> Result<i32> {
    let input = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let log = parse(&input);
    if let Some(reason) = &log.truncated {
        warn!("changelog only partially parsed: {reason}");
    }
    let Some(newest) = log.entries.first() else {
        bail!("No parseable changelog entries in {}", args.file.display());
    };

    println!("Source: {}", newest.source);
    println!("Version: {}", newest.version);
    println!("Distribution: {}", newest.distributions.join(" "));
    if let Some(urgency) = &newest.urgency {
        println!("Urgency: {urgency}");
    }
    if let Some(maintainer) = &newest.maintainer {
        println!("Maintainer: {maintainer}");
    }
    if let Some(date) = &newest.date {
        println!("Date: {}", date.to_rfc2822());
    }
    Ok(0)
}
