//! Template definition and unpacking

use std::fmt;
use std::path::Path;

use crate::archive::{UnpackReport, extract_archive, set_mode};
use crate::error::{ManifestError, Result, TemplateError};
use crate::manifest::ManifestData;
use crate::options::UnpackOptions;

/// An installable template
///
/// The name is fixed at construction. The version stays empty until a
/// manifest has been loaded, either while unpacking or through
/// [`Template::load_manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    version: String,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version declared by the last loaded manifest; empty if none was loaded
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Unpack a template archive into `dest` with default options
    pub fn unpack(&mut self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<UnpackReport> {
        self.unpack_with(src, dest, &UnpackOptions::default())
    }

    /// Unpack a template archive into `dest`
    ///
    /// Entries are written in archive order. When the manifest entry is
    /// reached it is loaded into this template before extraction continues.
    /// On error, whatever was written before the failing entry stays in
    /// `dest`; use [`Template::unpack_staged`] when that is not acceptable.
    pub fn unpack_with(
        &mut self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        options: &UnpackOptions,
    ) -> Result<UnpackReport> {
        let (src, dest) = (src.as_ref(), dest.as_ref());
        options.validate()?;

        tracing::info!(
            template = %self.name,
            archive = %src.display(),
            dest = %dest.display(),
            "Unpacking template"
        );
        extract_archive(src, dest, options, |path| self.load_manifest(path))
    }

    /// Unpack into a temporary sibling of `dest` and move it into place on success
    ///
    /// `dest` must not exist yet. If extraction fails the staging directory
    /// is removed, nothing is created at `dest` and the template is unchanged.
    pub fn unpack_staged(
        &mut self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        options: &UnpackOptions,
    ) -> Result<UnpackReport> {
        let (src, dest) = (src.as_ref(), dest.as_ref());
        options.validate()?;

        if dest.exists() {
            return Err(TemplateError::io(
                dest,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "destination already exists",
                ),
            ));
        }

        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| TemplateError::io(parent, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".tempack-staging-")
            .tempdir_in(parent)
            .map_err(|e| TemplateError::io(parent, e))?;

        tracing::info!(
            template = %self.name,
            archive = %src.display(),
            staging = %staging.path().display(),
            "Unpacking template into staging directory"
        );

        let mut version = None;
        let report = extract_archive(src, staging.path(), options, |path| {
            version = Some(read_version(path)?);
            Ok(())
        })?;

        std::fs::rename(staging.path(), dest).map_err(|e| TemplateError::io(dest, e))?;

        // The staging directory was created private; give the root the mode
        // extraction gives every directory it creates
        set_mode(dest, options.dir_mode)?;

        if let Some(version) = version {
            self.version = version;
        }
        tracing::debug!(template = %self.name, dest = %dest.display(), "Staged unpack committed");

        Ok(report)
    }

    /// Read a manifest file and copy its recognized fields into this template
    ///
    /// On error the template keeps its previous values.
    pub fn load_manifest(&mut self, path: impl AsRef<Path>) -> std::result::Result<(), ManifestError> {
        let path = path.as_ref();
        self.version = read_version(path)?;
        tracing::info!(
            template = %self.name,
            version = %self.version,
            manifest = %path.display(),
            "Loaded template manifest"
        );
        Ok(())
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn read_version(path: &Path) -> std::result::Result<String, ManifestError> {
    ManifestData::load(path)?.version()
}
