//! Name-based file classification and payload filtering
//!
//! Classification never touches file content. Anything that survives the
//! exclusion rules and is not an archive or a vendor protocol export is
//! treated as imaging payload; whether it is actually valid is left to the
//! analysis collaborator.

use tracing::debug;

use super::models::{FileKind, FileReference};
use crate::constants::classify::{
    EXCLUDED_EXTENSIONS, PROTOCOL_EXTENSIONS, PROTOCOL_FILE_NAMES, ZIP_EXTENSION,
};

/// Lower-cased extension of a file name, if any
fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether a name should never be ingested
///
/// Hidden files (leading `.`) and text/markup/log exports are excluded.
pub fn should_exclude(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') {
        return true;
    }

    match extension(name) {
        Some(ext) => EXCLUDED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Classify a file by name
///
/// Excluded names classify as [`FileKind::Unknown`].
pub fn classify(name: &str) -> FileKind {
    if should_exclude(name) {
        return FileKind::Unknown;
    }

    if PROTOCOL_FILE_NAMES.contains(&name) {
        return FileKind::Protocol;
    }

    match extension(name).as_deref() {
        Some(ZIP_EXTENSION) => FileKind::Zip,
        Some(ext) if PROTOCOL_EXTENSIONS.contains(&ext) => FileKind::Protocol,
        _ => FileKind::Dicom,
    }
}

/// Drop references whose names are excluded, preserving order
///
/// Returns the surviving references and the number removed.
pub fn retain_payload(references: Vec<FileReference>) -> (Vec<FileReference>, usize) {
    let before = references.len();
    let kept: Vec<FileReference> = references
        .into_iter()
        .filter(|file| {
            let excluded = should_exclude(file.name());
            if excluded {
                debug!("Excluding non-payload file: {}", file.path());
            }
            !excluded
        })
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}
