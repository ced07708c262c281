//! Chunk-parallel lexing of control-format stanzas. Workers claim
//! fixed-size byte ranges off a shared cursor; because stanza boundaries are
//! unknown up front, every chunk locally re-discovers its true start (the
//! first double newline at or after two bytes before the nominal start) and
//! may run past its nominal end, up to the buffer's true end, to finish a
//! stanza already in progress. The overlapping bytes are lexed twice rather
//! than synchronized; each stanza is emitted by exactly one chunk.

use std::{
    ops::Range,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use skua_matcher::{Automaton, MatcherError};
use skua_utils::{mmap::map_path, pool};
use tracing::debug;

use crate::{ListsError, MatchSlot, Origin, Record, RecordList};

/// Chunk size used by the file- and directory-level entry points.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// A Packages/Sources index: every stanza must carry a version.
    PackageList,
    /// A dpkg status database: every stanza must carry an install status.
    StatusFile,
}

/// How an automaton participates in a parse.
pub enum AutomatonRole<'a> {
    None,
    /// Collect every stanza, then register each name single-threaded once
    /// the workers have joined.
    Building(&'a mut Automaton<MatchSlot>),
    /// Keep only stanzas whose name the automaton matches exactly, chaining
    /// each under its terminal.
    Filtering(&'a Automaton<MatchSlot>),
}

struct ParseShared<'a> {
    buf: &'a [u8],
    chunk: usize,
    mode: ParseMode,
    filter: Option<&'a Automaton<MatchSlot>>,
    origin: Option<Arc<Origin>>,
    offset: AtomicUsize,
    segments: Mutex<Vec<Vec<Arc<Record>>>>,
    count: AtomicUsize,
}

/// Parse a control-format buffer. Any malformed stanza fails the whole
/// parse: workers already in flight run to completion and their results are
/// discarded.
pub fn parse(
    buf: &[u8],
    chunk_size: usize,
    mode: ParseMode,
    role: AutomatonRole,
) -> Result<RecordList, ListsError> {
    parse_inner(buf, chunk_size, mode, role, None, true)
}

/// Map `path` and parse it.
pub fn parse_file(
    path: impl AsRef<Path>,
    mode: ParseMode,
    role: AutomatonRole,
) -> Result<RecordList, ListsError> {
    let map = map_path(path)?;
    parse(&map, DEFAULT_CHUNK_SIZE, mode, role)
}

pub(crate) fn parse_inner(
    buf: &[u8],
    chunk_size: usize,
    mode: ParseMode,
    role: AutomatonRole,
    origin: Option<Arc<Origin>>,
    parallel: bool,
) -> Result<RecordList, ListsError> {
    let (filter, building) = match role {
        AutomatonRole::None => (None, None),
        AutomatonRole::Filtering(a) => (Some(&*a), None),
        AutomatonRole::Building(a) => (None, Some(a)),
    };

    let shared = ParseShared {
        buf,
        // The boundary scan reaches back two bytes, so a chunk is never
        // smaller than that.
        chunk: chunk_size.max(2),
        mode,
        filter,
        origin,
        offset: AtomicUsize::new(0),
        segments: Mutex::new(Vec::new()),
        count: AtomicUsize::new(0),
    };

    if parallel {
        let workers = pool::default_workers().min(buf.len() / shared.chunk + 1);
        pool::run_workers(workers, |_| lex_buffer(&shared))?;
    } else {
        // Directory workers lex their file's chunks on their own thread;
        // the parallelism is already at file level.
        lex_buffer(&shared)?;
    }

    let segments = shared.segments.into_inner().unwrap();
    let count = shared.count.into_inner();
    let mut records = Vec::with_capacity(count);
    for seg in segments {
        records.extend(seg);
    }
    debug_assert_eq!(records.len(), count);

    if let Some(automaton) = building {
        for rec in &records {
            match automaton.augment(rec.name().as_bytes(), MatchSlot::seeded(rec.clone())) {
                Ok(()) => {}
                Err(MatcherError::DuplicatePattern(name)) => {
                    // Several versions of one package; the first terminal
                    // value stands.
                    debug!("{name} already registered");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(RecordList::new(shared.origin, records))
}

/// Worker body: claim chunks until the cursor passes the end of the buffer,
/// then splice the locally accumulated records into the shared list.
fn lex_buffer(shared: &ParseShared) -> Result<(), ListsError> {
    let mut local = Vec::new();
    loop {
        let offset = shared.offset.fetch_add(shared.chunk, Ordering::AcqRel);
        if offset >= shared.buf.len() {
            break;
        }
        lex_chunk(shared, offset, &mut local)?;
    }
    shared.count.fetch_add(local.len(), Ordering::AcqRel);
    shared.segments.lock().unwrap().push(local);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    /// Mid-line, nothing to capture.
    Pdata,
    /// One newline seen.
    Nline,
    /// Between stanzas.
    Reset,
    /// Matching a field literal.
    Expect,
    /// Chewing whitespace between the field literal and its value.
    Delim,
    /// Accumulating a value until end of line.
    Name,
    Version,
    Status,
}

fn lex_chunk(
    shared: &ParseShared,
    offset: usize,
    local: &mut Vec<Arc<Record>>,
) -> Result<(), ListsError> {
    use LexState::*;

    let buf = shared.buf;
    let very_end = buf.len();
    let end = offset.saturating_add(shared.chunk).min(very_end);

    // Offset 0 starts a stanza by definition. Any other chunk begins at the
    // first double newline found from two bytes before its nominal start;
    // a leading partial stanza belongs to the previous chunk.
    let mut c = if offset == 0 {
        0
    } else {
        let mut found = end;
        let mut nline = false;
        let mut p = offset - 2;
        while p < end {
            if buf[p] == b'\n' {
                if nline {
                    found = p + 1;
                    break;
                }
                nline = true;
            } else {
                nline = false;
            }
            p += 1;
        }
        found
    };

    let mut state = Reset;
    let mut expect: &[u8] = b"";
    let mut expect_at = 0usize;
    let mut reward = Pdata;
    let mut delim = 0usize;

    let mut name: Option<Range<usize>> = None;
    let mut version: Option<Range<usize>> = None;
    let mut status: Option<Range<usize>> = None;

    // A double newline, not the nominal end, terminates this chunk's work.
    while c < end || (state != Reset && c < very_end) {
        let b = buf[c];
        if b == b'\n' {
            match state {
                Nline => {
                    emit_stanza(
                        shared,
                        c,
                        name.take(),
                        version.take(),
                        status.take(),
                        local,
                    )?;
                    state = Reset;
                }
                Name => {
                    if name.is_some() {
                        return Err(ListsError::Format(c, "repeated Package field".into()));
                    }
                    name = Some(delim..c);
                }
                Version => {
                    if version.is_some() {
                        return Err(ListsError::Format(c, "repeated Version field".into()));
                    }
                    version = Some(delim..c);
                }
                Status => {
                    if status.is_some() {
                        return Err(ListsError::Format(c, "repeated Status field".into()));
                    }
                    status = Some(delim..c);
                }
                _ => {}
            }
            if state != Reset {
                state = Nline;
            }
        } else {
            match state {
                Nline | Reset => {
                    state = Expect;
                    expect_at = 0;
                    match b {
                        b'P' => {
                            expect = b"ackage:";
                            reward = Name;
                        }
                        b'V' => {
                            expect = b"ersion:";
                            reward = Version;
                        }
                        b'S' if shared.mode == ParseMode::StatusFile => {
                            expect = b"tatus: install ";
                            reward = Status;
                        }
                        _ => state = Pdata,
                    }
                }
                Expect => {
                    if b == expect[expect_at] {
                        expect_at += 1;
                        if expect_at == expect.len() {
                            state = Delim;
                            delim = c + 1;
                        }
                    } else {
                        state = Pdata;
                    }
                }
                Delim => {
                    if b.is_ascii_whitespace() {
                        delim += 1;
                    } else {
                        state = reward;
                    }
                }
                _ => {}
            }
        }
        c += 1;
    }

    if state != Reset {
        return Err(ListsError::Format(
            c,
            "unterminated stanza at end of input".into(),
        ));
    }
    Ok(())
}

fn emit_stanza(
    shared: &ParseShared,
    at: usize,
    name: Option<Range<usize>>,
    version: Option<Range<usize>>,
    status: Option<Range<usize>>,
    local: &mut Vec<Arc<Record>>,
) -> Result<(), ListsError> {
    let buf = shared.buf;

    let name = match name {
        Some(r) if !r.is_empty() => r,
        _ => {
            return Err(ListsError::Format(
                at,
                "stanza without a Package name".into(),
            ))
        }
    };
    match shared.mode {
        ParseMode::PackageList => {
            if version.is_none() {
                return Err(ListsError::Format(at, "stanza without a Version".into()));
            }
        }
        ParseMode::StatusFile => {
            if status.is_none() {
                return Err(ListsError::Format(
                    at,
                    "stanza without an install Status".into(),
                ));
            }
        }
    }

    let text = |r: Range<usize>| String::from_utf8_lossy(&buf[r]).into_owned();

    if let Some(automaton) = shared.filter {
        // Unmatched stanzas are dropped without allocating a record.
        let Some(slot) = automaton.match_exact(&buf[name.clone()]) else {
            return Ok(());
        };
        let rec = Arc::new(Record::new(
            text(name),
            version.map(text),
            status.map(text),
            shared.origin.clone(),
        ));
        slot.push(rec.clone());
        local.push(rec);
    } else {
        local.push(Arc::new(Record::new(
            text(name),
            version.map(text),
            status.map(text),
            shared.origin.clone(),
        )));
    }
    Ok(())
}
