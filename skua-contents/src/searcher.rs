use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Condvar, Mutex,
    },
};

use flate2::{Decompress, FlushDecompress, Status};
use memmap2::Mmap;
use skua_matcher::Automaton;
use skua_utils::{mmap::map_path, pool};
use tracing::debug;

use crate::{parser::ScanState, ContentsError};

const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const CONTENTS_SUFFIX: &str = ".gz";
const SCRATCH_SIZE: usize = 4 * 1024 * 1024;

/// A suspended decompression job: everything needed to resume one file's
/// inflate on any worker.
struct WorkItem {
    path: PathBuf,
    map: Mmap,
    consumed: usize,
    decompress: Decompress,
    scan: ScanState,
}

struct QueueInner {
    items: VecDeque<WorkItem>,
    // In-flight unit count. A unit is a directory entry or a dequeued item,
    // counted from the moment it is taken until it is either finished or
    // handed back to the queue.
    holdup: usize,
}

struct WorkQueue {
    inner: Mutex<QueueInner>,
    cond: Condvar,
}

impl WorkQueue {
    fn new() -> Self {
        WorkQueue {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                holdup: 0,
            }),
            cond: Condvar::new(),
        }
    }

    fn take_unit(&self) {
        self.inner.lock().unwrap().holdup += 1;
    }

    fn resolve_unit(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.holdup -= 1;
        drop(inner);
        self.cond.notify_all();
    }

    fn hand_back(&self, item: WorkItem) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.push_back(item);
        inner.holdup -= 1;
        drop(inner);
        self.cond.notify_all();
    }

    /// Pop a suspended job, waiting while other workers still hold units
    /// that could produce one. Returns None only once the queue is empty
    /// and nothing is in flight.
    fn next_item(&self) -> Option<WorkItem> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(item) = inner.items.pop_front() {
                inner.holdup += 1;
                return Some(item);
            }
            if inner.holdup == 0 {
                return None;
            }
            inner = self.cond.wait(inner).unwrap();
        }
    }
}

struct ScanShared<'a, V, F> {
    dir: &'a Path,
    automaton: &'a Automaton<V>,
    case_fold: bool,
    scratch_size: usize,
    entries: Mutex<fs::ReadDir>,
    queue: WorkQueue,
    sink: Mutex<F>,
    seen: AtomicUsize,
}

/// Scan every `.gz` Contents index under `dir` against the automaton,
/// calling `sink(package, path)` for each matching data line. One corrupt
/// stream fails the whole scan.
pub fn scan<V, F>(
    dir: impl AsRef<Path>,
    automaton: &Automaton<V>,
    case_fold: bool,
    sink: F,
) -> Result<(), ContentsError>
where
    V: Sync,
    F: FnMut(&str, &str) + Send,
{
    scan_with(
        dir.as_ref(),
        automaton,
        case_fold,
        SCRATCH_SIZE,
        pool::default_workers(),
        sink,
    )
}

fn scan_with<V, F>(
    dir: &Path,
    automaton: &Automaton<V>,
    case_fold: bool,
    scratch_size: usize,
    workers: usize,
    sink: F,
) -> Result<(), ContentsError>
where
    V: Sync,
    F: FnMut(&str, &str) + Send,
{
    let entries = fs::read_dir(dir)
        .map_err(|e| ContentsError::FailedToOperateDirOrFile(dir.display().to_string(), e))?;

    let shared = ScanShared {
        dir,
        automaton,
        case_fold,
        scratch_size,
        entries: Mutex::new(entries),
        queue: WorkQueue::new(),
        sink: Mutex::new(sink),
        seen: AtomicUsize::new(0),
    };

    pool::run_workers(workers, |_| scan_worker(&shared))?;

    if shared.seen.load(Ordering::Acquire) == 0 {
        return Err(ContentsError::NoIndices(dir.display().to_string()));
    }
    Ok(())
}

enum Burst {
    Finished,
    Suspended,
}

fn scan_worker<V, F>(shared: &ScanShared<V, F>) -> Result<(), ContentsError>
where
    V: Sync,
    F: FnMut(&str, &str) + Send,
{
    let mut scratch = vec![0u8; shared.scratch_size];

    loop {
        // Count the unit before taking it, so another worker's termination
        // check never misses work this one is about to enqueue.
        shared.queue.take_unit();
        let entry = { shared.entries.lock().unwrap().next() };
        let Some(entry) = entry else {
            shared.queue.resolve_unit();
            break;
        };
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                shared.queue.resolve_unit();
                return Err(ContentsError::FailedToOperateDirOrFile(
                    shared.dir.display().to_string(),
                    e,
                ));
            }
        };

        let wanted = match entry.file_type() {
            Ok(ft) => {
                (ft.is_file() || ft.is_symlink())
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.ends_with(CONTENTS_SUFFIX))
            }
            Err(e) => {
                shared.queue.resolve_unit();
                return Err(ContentsError::FailedToOperateDirOrFile(
                    entry.path().display().to_string(),
                    e,
                ));
            }
        };
        if !wanted {
            shared.queue.resolve_unit();
            continue;
        }

        shared.seen.fetch_add(1, Ordering::AcqRel);
        match start_file(shared, &mut scratch, entry.path()) {
            Ok(Some(item)) => shared.queue.hand_back(item),
            Ok(None) => shared.queue.resolve_unit(),
            Err(e) => {
                shared.queue.resolve_unit();
                return Err(e);
            }
        }
    }

    // Directory exhausted: drain suspended jobs until the queue is empty
    // and no other worker holds a unit that could refill it.
    while let Some(mut item) = shared.queue.next_item() {
        match inflate_burst(shared, &mut scratch, &mut item) {
            Ok(Burst::Finished) => shared.queue.resolve_unit(),
            Ok(Burst::Suspended) => shared.queue.hand_back(item),
            Err(e) => {
                shared.queue.resolve_unit();
                return Err(e);
            }
        }
    }

    Ok(())
}

fn start_file<V, F>(
    shared: &ScanShared<V, F>,
    scratch: &mut [u8],
    path: PathBuf,
) -> Result<Option<WorkItem>, ContentsError>
where
    V: Sync,
    F: FnMut(&str, &str) + Send,
{
    debug!("scanning {}", path.display());

    let map = map_path(&path)?;
    if map.len() < GZIP_MAGIC.len() || &map[..GZIP_MAGIC.len()] != GZIP_MAGIC {
        return Err(ContentsError::IllegalFile(path.display().to_string()));
    }

    let mut item = WorkItem {
        path,
        map,
        consumed: 0,
        decompress: Decompress::new_gzip(15),
        scan: ScanState::new(shared.case_fold),
    };

    match inflate_burst(shared, scratch, &mut item)? {
        Burst::Finished => Ok(None),
        Burst::Suspended => Ok(Some(item)),
    }
}

/// Inflate until the scratch buffer is full or the stream ends, then scan
/// what was produced. A full buffer with input remaining suspends the job
/// instead of looping, so the rest of the file can migrate to idle workers.
fn inflate_burst<V, F>(
    shared: &ScanShared<V, F>,
    scratch: &mut [u8],
    item: &mut WorkItem,
) -> Result<Burst, ContentsError>
where
    V: Sync,
    F: FnMut(&str, &str) + Send,
{
    let mut filled = 0;

    let outcome = loop {
        let before_in = item.decompress.total_in();
        let before_out = item.decompress.total_out();
        let status = item
            .decompress
            .decompress(
                &item.map[item.consumed..],
                &mut scratch[filled..],
                FlushDecompress::None,
            )
            .map_err(|e| ContentsError::Decompress(item.path.display().to_string(), e))?;
        let eaten = (item.decompress.total_in() - before_in) as usize;
        let produced = (item.decompress.total_out() - before_out) as usize;
        item.consumed += eaten;
        filled += produced;

        match status {
            Status::StreamEnd => break Burst::Finished,
            Status::Ok | Status::BufError => {
                if filled == scratch.len() {
                    break Burst::Suspended;
                }
                // Output space remains, so more input was needed; a stream
                // that cannot progress never completed.
                if eaten == 0 && produced == 0 {
                    return Err(ContentsError::Truncated(item.path.display().to_string()));
                }
            }
        }
    };

    let mut sink = shared.sink.lock().unwrap();
    item.scan
        .feed(&scratch[..filled], shared.automaton, &mut *sink);

    Ok(outcome)
}

#[cfg(test)]
mod test {
    use std::{fs, io::Write, path::Path, sync::Mutex};

    use flate2::{write::GzEncoder, Compression};
    use skua_matcher::Automaton;

    use super::scan_with;
    use crate::ContentsError;

    fn write_gz(path: &Path, content: &[u8]) {
        let f = fs::File::create(path).unwrap();
        let mut enc = GzEncoder::new(f, Compression::default());
        enc.write_all(content).unwrap();
        enc.finish().unwrap();
    }

    fn automaton(patterns: &[&str]) -> Automaton<()> {
        let mut a = Automaton::new();
        for p in patterns {
            a.augment(p.as_bytes(), ()).unwrap();
        }
        a
    }

    fn collect(
        dir: &Path,
        a: &Automaton<()>,
        scratch_size: usize,
        workers: usize,
    ) -> Result<Vec<(String, String)>, ContentsError> {
        let hits = Mutex::new(Vec::new());
        scan_with(dir, a, false, scratch_size, workers, |pkg: &str, path: &str| {
            hits.lock().unwrap().push((pkg.to_string(), path.to_string()))
        })?;
        let mut hits = hits.into_inner().unwrap();
        hits.sort();
        Ok(hits)
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(
            &dir.path().join("repo_dists_stable_Contents-amd64.gz"),
            b"FILE LOCATION\nusr/bin/fish shells/fish\netc/zsh/zshrc shells/zsh\n",
        );
        write_gz(
            &dir.path().join("repo_dists_unstable_Contents-amd64.gz"),
            b"preamble text\nFILE LOCATION\nusr/share/doc/fish/README universe/shells/fish\n",
        );
        // Not an index; must be skipped.
        fs::write(dir.path().join("README"), b"not a contents file").unwrap();

        let a = automaton(&["fish"]);
        let hits = collect(dir.path(), &a, 1 << 20, 4).unwrap();
        assert_eq!(
            hits,
            [
                ("fish".to_string(), "usr/bin/fish".to_string()),
                ("fish".to_string(), "usr/share/doc/fish/README".to_string()),
            ]
        );
    }

    #[test]
    fn test_tiny_scratch_forces_requeue() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = Vec::from(&b"FILE LOCATION\n"[..]);
        for i in 0..500 {
            content.extend_from_slice(format!("usr/lib/libfoo{i}.so libs/foo{i}\n").as_bytes());
        }
        content.extend_from_slice(b"usr/bin/fish shells/fish\n");
        write_gz(&dir.path().join("repo_Contents-amd64.gz"), &content);

        // A 64-byte scratch buffer cannot hold the output of one burst, so
        // the file is suspended and resumed many times.
        let a = automaton(&["fish"]);
        let hits = collect(dir.path(), &a, 64, 3).unwrap();
        assert_eq!(hits, [("fish".to_string(), "usr/bin/fish".to_string())]);
    }

    #[test]
    fn test_corrupt_stream_aborts_scan() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(
            &dir.path().join("good_Contents-amd64.gz"),
            b"FILE LOCATION\nusr/bin/fish shells/fish\n",
        );
        // Valid magic, garbage body.
        fs::write(
            dir.path().join("bad_Contents-amd64.gz"),
            [0x1F, 0x8B, 0xFF, 0x00, 0x12, 0x34, 0x56, 0x78],
        )
        .unwrap();

        let a = automaton(&["fish"]);
        let res = collect(dir.path(), &a, 1 << 20, 2);
        assert!(matches!(
            res,
            Err(ContentsError::Decompress(_, _) | ContentsError::Truncated(_))
        ));
    }

    #[test]
    fn test_not_gzip_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fake_Contents-amd64.gz"), b"plain text").unwrap();

        let a = automaton(&["fish"]);
        let res = collect(dir.path(), &a, 1 << 20, 2);
        assert!(matches!(res, Err(ContentsError::IllegalFile(_))));
    }

    #[test]
    fn test_empty_dir_reports_no_indices() {
        let dir = tempfile::tempdir().unwrap();
        let a = automaton(&["fish"]);
        let res = collect(dir.path(), &a, 1 << 20, 2);
        assert!(matches!(res, Err(ContentsError::NoIndices(_))));
    }

    #[test]
    fn test_case_folded_scan() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(
            &dir.path().join("repo_Contents-amd64.gz"),
            b"FILE LOCATION\nOPT/Fish/Fish shells/fish\n",
        );

        let a = automaton(&["fish"]);
        let hits = Mutex::new(Vec::new());
        scan_with(dir.path(), &a, true, 1 << 20, 2, |pkg: &str, path: &str| {
            hits.lock().unwrap().push((pkg.to_string(), path.to_string()))
        })
        .unwrap();
        assert_eq!(
            hits.into_inner().unwrap(),
            [("fish".to_string(), "opt/fish/fish".to_string())]
        );
    }
}
