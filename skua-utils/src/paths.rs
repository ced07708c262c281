//! Default locations of Debian-style metadata on a local system. These are
//! plain values; callers pass the paths they actually want down explicitly.

use std::path::Path;

/// apt's downloaded package list directory.
pub fn default_lists_dir() -> &'static Path {
    Path::new("/var/lib/apt/lists")
}

/// The dpkg status database.
pub fn default_status_file() -> &'static Path {
    Path::new("/var/lib/dpkg/status")
}

/// apt-file style cache of Contents indexes.
pub fn default_contents_dir() -> &'static Path {
    Path::new("/var/cache/apt/apt-file")
}
