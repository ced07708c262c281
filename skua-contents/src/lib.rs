//! # skua-contents
//!
//! The `skua-contents` crate scans gzip-compressed Contents indexes from
//! Debian repositories against a pattern automaton, emitting a
//! `(package, path)` pair for every data line whose path matches.
//!
//! Files are inflated incrementally into a fixed scratch buffer. A file too
//! large to finish in one burst is suspended into a work item and pushed to
//! a shared queue, so oversized indexes are rebalanced across the whole
//! worker pool instead of pinning one thread.

mod parser;
mod searcher;

pub use searcher::scan;

#[derive(Debug, thiserror::Error)]
pub enum ContentsError {
    #[error("Failed to read dir or file: {0}, kind: {1}")]
    FailedToOperateDirOrFile(String, std::io::Error),
    #[error("Illegal file: {0}")]
    IllegalFile(String),
    #[error("Corrupt contents index {0}: {1}")]
    Decompress(String, flate2::DecompressError),
    #[error("Truncated gzip stream: {0}")]
    Truncated(String),
    #[error("No contents indexes under {0}")]
    NoIndices(String),
    #[error(transparent)]
    Map(#[from] skua_utils::mmap::MapError),
    #[error(transparent)]
    Threading(#[from] skua_utils::pool::PoolError),
}
