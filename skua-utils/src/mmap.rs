use std::{fs::File, path::Path};

use memmap2::{Mmap, MmapOptions};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Failed to open {0}: {1}")]
    Open(String, std::io::Error),
    #[error("Failed to map {0}: {1}")]
    Map(String, std::io::Error),
}

/// Map a file read-only, trying a huge-page mapping first and falling back
/// to a normal one. Huge pages are frequently unavailable for regular files,
/// so the fallback is the common path.
pub fn map_path(path: impl AsRef<Path>) -> Result<Mmap, MapError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| MapError::Open(path.display().to_string(), e))?;

    match unsafe { MmapOptions::new().huge(None).populate().map(&f) } {
        Ok(map) => Ok(map),
        Err(e) => {
            debug!("huge-page map of {} failed: {e}", path.display());
            unsafe { MmapOptions::new().populate().map(&f) }
                .map_err(|e| MapError::Map(path.display().to_string(), e))
        }
    }
}
