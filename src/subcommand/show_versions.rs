use std::cmp::Ordering;

use anyhow::{bail, Context, Result};
use skua_lists::{parse, parse_dir, AutomatonRole, MatchSlot, ParseMode, DEFAULT_CHUNK_SIZE};
use skua_matcher::Automaton;
use skua_utils::{
    mmap::map_path,
    paths::{default_lists_dir, default_status_file},
    version,
};

use crate::args::ShowVersions;

pub fn show_versions(args: ShowVersions) -> Result<i32> {
    let status_path = args
        .status
        .unwrap_or_else(|| default_status_file().to_path_buf());
    let lists_dir = args
        .lists
        .unwrap_or_else(|| default_lists_dir().to_path_buf());

    // Every installed package becomes a terminal seeded with its status
    // record; the lists are then filtered through the automaton, chaining
    // each available version under its name.
    let mut automaton = Automaton::new();
    let map = map_path(&status_path)
        .with_context(|| format!("Failed to read {}", status_path.display()))?;
    parse(
        &map,
        DEFAULT_CHUNK_SIZE,
        ParseMode::StatusFile,
        AutomatonRole::Building(&mut automaton),
    )
    .with_context(|| format!("Failed to parse {}", status_path.display()))?;

    parse_dir(&lists_dir, Some(&automaton))
        .with_context(|| format!("Failed to parse lists under {}", lists_dir.display()))?;

    let mut shown = 0usize;
    automaton.enumerate(|name, slot| {
        let name = String::from_utf8_lossy(name);
        if !args.packages.is_empty() && !args.packages.iter().any(|p| p.as_str() == &*name) {
            return;
        }
        shown += 1;
        print_slot(&name, slot);
    });

    if shown == 0 && !args.packages.is_empty() {
        bail!("None of the given packages are in the status database");
    }
    Ok(0)
}

fn print_slot(name: &str, slot: &MatchSlot) {
    let installed = slot.seed().and_then(|s| s.version().map(str::to_string));
    let newest = slot.newest_by(version::compare);

    match (installed, newest) {
        (Some(installed), Some(newest)) => {
            let dist = newest.distribution().unwrap_or("unknown");
            let available = newest.version().unwrap_or("");
            if version::compare(available, &installed) == Ordering::Greater {
                println!("{name}/{dist} upgradeable from {installed} to {available}");
            } else {
                println!("{name}/{dist} uptodate {installed}");
            }
        }
        (Some(installed), None) => {
            println!("{name} {installed} installed: no available version");
        }
        (None, Some(newest)) => {
            println!(
                "{name} not installed; newest available {}",
                newest.version().unwrap_or("")
            );
        }
        (None, None) => println!("{name} not installed"),
    }
}
