//! Tempack Core - template archive extraction and manifest loading
//!
//! This crate provides the pieces needed to install a packaged template:
//! - `Template`: the installable unit (name, version)
//! - `archive`: safe extraction of `.zip` template archives
//! - `ManifestData`: the `.tm` manifest shipped inside each archive
//! - `UnpackOptions`: permissions, manifest suffix and multi-manifest policy

pub mod archive;
pub mod error;
pub mod manifest;
pub mod options;
pub mod sanitize;
pub mod template;

pub use archive::{
    ArchiveEntry, EntryKind, ExtractedEntry, UnpackReport, extract_archive, list_archive,
    read_manifest_from_archive,
};
pub use error::{ManifestError, Result, TemplateError};
pub use manifest::{ManifestData, ManifestValue};
pub use options::{ManifestPolicy, UnpackOptions};
pub use sanitize::{SanitizedPath, sanitize_entry_path};
pub use template::Template;
