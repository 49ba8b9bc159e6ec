//! Core error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to open archive {}: {source}", .path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Archive entry '{entry}' resolves outside of {}", .dest.display())]
    PathTraversal { entry: String, dest: PathBuf },

    #[error("Invalid archive entry name: {entry:?}")]
    InvalidEntryName { entry: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load manifest {}: {source}", .path.display())]
    ManifestLoad {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("Multiple manifests in archive: '{first}' and '{second}'")]
    MultipleManifests { first: String, second: String },

    #[error("Invalid unpack configuration: {message}")]
    Config { message: String },
}

impl TemplateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The manifest error behind a `ManifestLoad` failure, if any
    pub fn manifest_error(&self) -> Option<&ManifestError> {
        match self {
            Self::ManifestLoad { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised while reading a template manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Manifest must be a key/value mapping, found {found}")]
    NotAMapping { found: &'static str },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Field '{field}' must be a string or number, found {found}")]
    InvalidField { field: String, found: &'static str },
}

pub type Result<T> = std::result::Result<T, TemplateError>;
