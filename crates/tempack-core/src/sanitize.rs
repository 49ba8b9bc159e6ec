//! Archive entry path resolution
//!
//! Every entry name is resolved against the destination root before anything
//! is written. Names are treated as archive paths, not host paths:
//!
//! - `\` is accepted as a separator alongside `/`
//! - `.` segments are dropped
//! - `..` segments are resolved as long as they stay inside the root
//! - absolute names, drive prefixes and names climbing above the root are rejected

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TemplateError};

/// An entry name resolved against a destination root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    /// Normalized path relative to the root; empty when the entry names the root itself
    pub relative: PathBuf,
    /// `relative` joined onto the root
    pub resolved: PathBuf,
}

impl SanitizedPath {
    /// Whether the entry resolved to the destination root itself
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }
}

/// Resolve an archive entry name under `dest`, rejecting anything that escapes it
pub fn sanitize_entry_path(entry: &str, dest: &Path) -> Result<SanitizedPath> {
    if entry.is_empty() || entry.contains('\0') {
        return Err(TemplateError::InvalidEntryName {
            entry: entry.to_string(),
        });
    }

    let traversal = || TemplateError::PathTraversal {
        entry: entry.to_string(),
        dest: dest.to_path_buf(),
    };

    let normalized = entry.replace('\\', "/");
    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(traversal());
    }

    let mut relative = PathBuf::new();
    let mut depth = 0usize;
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                relative.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(traversal());
                }
                relative.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    let resolved = dest.join(&relative);
    Ok(SanitizedPath { relative, resolved })
}

/// `C:` style prefixes are absolute on Windows even when written with `/`
fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
