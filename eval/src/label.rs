//! Ground-truth identity of a cloud, read from its file name.

use std::path::Path;

pub const DEFAULT_DELIMITER: char = '-';

/// The part of the file name before the first `delimiter`, e.g. `box` for
/// `box-07.pcd`. A name without the delimiter falls back to the file stem.
pub fn identity_label(path: &Path, delimiter: char) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    match name.find(delimiter) {
        Some(idx) => name[..idx].to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
