//! # skua-lists
//!
//! The `skua-lists` crate parses APT package lists, Sources indexes and the
//! dpkg status database into record stores, splitting large buffers into
//! chunks that are lexed in parallel.
//!
//! ## Modules
//!
//! - `stanza`: the chunk-parallel stanza lexer, with optional automaton
//!   building or filtering.
//! - `dir`: lexing every Packages/Sources file found in a lists directory.
//! - `changelog`: a recovering single-pass parser for Debian changelogs.

pub mod changelog;
mod dir;
mod record;
mod stanza;

pub use dir::parse_dir;
pub use record::{MatchSlot, Origin, Record, RecordList, RecordStore};
pub use stanza::{parse, parse_file, AutomatonRole, ParseMode, DEFAULT_CHUNK_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum ListsError {
    #[error("Failed to read dir or file: {0}, kind: {1}")]
    FailedToOperateDirOrFile(String, std::io::Error),
    #[error("Malformed stanza near byte {0}: {1}")]
    Format(usize, String),
    #[error(transparent)]
    Map(#[from] skua_utils::mmap::MapError),
    #[error(transparent)]
    Threading(#[from] skua_utils::pool::PoolError),
    #[error(transparent)]
    Matcher(#[from] skua_matcher::MatcherError),
}
