use anyhow::{bail, Context, Result};
use skua_contents::scan;
use skua_matcher::Automaton;
use skua_utils::paths::default_contents_dir;

use crate::args::Provides;

pub fn provides(args: Provides) -> Result<i32> {
    let mut automaton = Automaton::new();
    for pattern in &args.patterns {
        let pattern = if args.ignore_case {
            pattern.to_ascii_lowercase()
        } else {
            pattern.clone()
        };
        automaton.augment(pattern.as_bytes(), ())?;
    }

    let dir = args
        .cache
        .unwrap_or_else(|| default_contents_dir().to_path_buf());

    let mut hits = 0usize;
    scan(&dir, &automaton, args.ignore_case, |package, path| {
        if path.starts_with('/') {
            println!("{package}: {path}");
        } else {
            println!("{package}: /{path}");
        }
        hits += 1;
    })
    .with_context(|| format!("Failed to scan {}", dir.display()))?;

    if hits == 0 {
        bail!("No files found for the given pattern(s)");
    }
    Ok(0)
}
