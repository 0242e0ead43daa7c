//! Filesystem predicates shared by configuration loading and credentials.

use std::fs::File;
use std::path::Path;

/// Check that `path` is usable as an input file.
///
/// The path must exist, be a regular file (symlinks are followed), be
/// openable for reading and have a non-zero size.
pub fn is_file_readable(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return false;
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => File::open(path).is_ok(),
        _ => false,
    }
}
