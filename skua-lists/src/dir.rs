//! Lexing a whole lists directory. Workers pull entries off a shared
//! directory cursor; each worker lexes its file's chunks on its own thread,
//! so the parallelism here is at file level. Building an automaton is not
//! supported from a directory scan, only filtering through one.

use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

use skua_matcher::Automaton;
use skua_utils::{mmap::map_path, pool};
use tracing::debug;

use crate::{
    stanza::{parse_inner, DEFAULT_CHUNK_SIZE},
    AutomatonRole, ListsError, MatchSlot, Origin, ParseMode, RecordList, RecordStore,
};

const LIST_SUFFIXES: [&str; 2] = ["Packages", "Sources"];

struct DirShared<'a> {
    entries: Mutex<fs::ReadDir>,
    lists: Mutex<Vec<RecordList>>,
    filter: Option<&'a Automaton<MatchSlot>>,
}

/// Parse every Packages/Sources file in `dir`, in parallel, optionally
/// filtered through an automaton.
pub fn parse_dir(
    dir: impl AsRef<Path>,
    filter: Option<&Automaton<MatchSlot>>,
) -> Result<RecordStore, ListsError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .map_err(|e| ListsError::FailedToOperateDirOrFile(dir.display().to_string(), e))?;

    let shared = DirShared {
        entries: Mutex::new(entries),
        lists: Mutex::new(Vec::new()),
        filter,
    };

    pool::run_workers(pool::default_workers(), |_| lex_dir(dir, &shared))?;

    Ok(RecordStore::new(shared.lists.into_inner().unwrap()))
}

fn lex_dir(dir: &Path, shared: &DirShared) -> Result<(), ListsError> {
    loop {
        let entry = { shared.entries.lock().unwrap().next() };
        let Some(entry) = entry else {
            return Ok(());
        };
        let entry = entry
            .map_err(|e| ListsError::FailedToOperateDirOrFile(dir.display().to_string(), e))?;

        let file_type = entry.file_type().map_err(|e| {
            ListsError::FailedToOperateDirOrFile(entry.path().display().to_string(), e)
        })?;
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !LIST_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        let Some(origin) = origin_from_name(name) else {
            debug!("skipping {name}: not a repository list name");
            continue;
        };

        let map = map_path(entry.path())?;
        let role = match shared.filter {
            Some(automaton) => AutomatonRole::Filtering(automaton),
            None => AutomatonRole::None,
        };
        let list = parse_inner(
            &map,
            DEFAULT_CHUNK_SIZE,
            ParseMode::PackageList,
            role,
            Some(Arc::new(origin)),
            false,
        )?;

        shared.lists.lock().unwrap().push(list);
    }
}

// Lists are named like
// `archive.ubuntu.com_ubuntu_dists_focal_main_binary-amd64_Packages`: the
// URI prefix runs to the first `_`, the distribution sits between the
// literal `_dists_` and the next `_`.
fn origin_from_name(name: &str) -> Option<Origin> {
    let (uri, _) = name.split_once('_')?;
    let at = name.find("_dists_")?;
    let rest = &name[at + "_dists_".len()..];
    let (distribution, _) = rest.split_once('_')?;

    Some(Origin {
        uri: uri.to_string(),
        distribution: distribution.to_string(),
    })
}

#[cfg(test)]
mod test {
    use std::{fs, io::Write};

    use skua_matcher::Automaton;

    use super::{origin_from_name, parse_dir};
    use crate::MatchSlot;

    #[test]
    fn test_origin_from_name() {
        let origin = origin_from_name(
            "archive.ubuntu.com_ubuntu_dists_focal_main_binary-amd64_Packages",
        )
        .unwrap();
        assert_eq!(origin.uri, "archive.ubuntu.com");
        assert_eq!(origin.distribution, "focal");

        assert!(origin_from_name("Packages").is_none());
        assert!(origin_from_name("repo.example.org_plain_Packages").is_none());
    }

    #[test]
    fn test_parse_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(
            dir.path()
                .join("archive.ubuntu.com_ubuntu_dists_focal_main_binary-amd64_Packages"),
        )
        .unwrap();
        f.write_all(b"Package: foo\nVersion: 1.0\n\nPackage: bar\nVersion: 2.0\n\n")
            .unwrap();

        let mut f = fs::File::create(
            dir.path()
                .join("deb.debian.org_debian_dists_trixie_main_source_Sources"),
        )
        .unwrap();
        f.write_all(b"Package: baz\nVersion: 3.0\n\n").unwrap();

        // Files without a list suffix are skipped.
        fs::File::create(dir.path().join("lock")).unwrap();

        let store = parse_dir(dir.path(), None).unwrap();
        assert_eq!(store.lists().len(), 2);
        assert_eq!(store.count(), 3);

        let focal = store
            .lists()
            .iter()
            .find(|l| l.origin().is_some_and(|o| o.distribution == "focal"))
            .unwrap();
        assert_eq!(focal.len(), 2);
        assert_eq!(focal.origin().unwrap().uri, "archive.ubuntu.com");
        assert!(focal.find("foo").is_some());
    }

    #[test]
    fn test_parse_dir_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(
            dir.path()
                .join("archive.ubuntu.com_ubuntu_dists_focal_main_binary-amd64_Packages"),
        )
        .unwrap();
        f.write_all(b"Package: foo\nVersion: 1.0\n\nPackage: bar\nVersion: 2.0\n\n")
            .unwrap();

        let mut automaton = Automaton::new();
        automaton.augment(b"foo", MatchSlot::stub()).unwrap();

        let store = parse_dir(dir.path(), Some(&automaton)).unwrap();
        assert_eq!(store.count(), 1);

        let matches = automaton.match_exact(b"foo").unwrap().matches();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].distribution(), Some("focal"));
    }
}
