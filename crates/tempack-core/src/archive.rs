//! Template archive extraction and inspection
//!
//! Templates ship as `.zip` archives holding a directory tree and one
//! manifest entry (a file whose base name ends in the manifest suffix).
//! Entries are materialized in the order the archive stores them; every
//! entry name is checked against the destination root before it is written.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{ManifestError, Result, TemplateError};
use crate::manifest::ManifestData;
use crate::options::{ManifestPolicy, UnpackOptions};
use crate::sanitize::{SanitizedPath, sanitize_entry_path};

/// File type bits of a unix mode
const S_IFMT: u32 = 0o170000;
/// File type bits of a symbolic link
const S_IFLNK: u32 = 0o120000;

/// Information about an entry stored in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name as stored in the archive
    pub path: String,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Unix permission bits, when the archive records them
    pub mode: Option<u32>,
}

/// Kind of an extracted entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// An entry written to the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// Normalized path relative to the destination root
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Bytes written (zero for directories)
    pub size: u64,
    /// Permission bits on disk after extraction; for directories that already
    /// existed this is their existing mode (the requested mode off unix)
    pub mode: u32,
}

/// Outcome of a successful extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackReport {
    /// Entries in archive order
    pub entries: Vec<ExtractedEntry>,
    /// Relative path of the manifest that was loaded, if the archive had one
    pub manifest: Option<PathBuf>,
}

impl UnpackReport {
    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::File)
            .count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Extract `src` into `dest`, handing each manifest file to `on_manifest`
///
/// `dest` is created when missing; existing files are only touched when an
/// entry of the same name overwrites them. `on_manifest` receives the path of
/// the manifest just written; its error aborts extraction. Nothing is rolled
/// back on failure: entries written before the failing one stay on disk.
pub fn extract_archive<F>(
    src: &Path,
    dest: &Path,
    options: &UnpackOptions,
    mut on_manifest: F,
) -> Result<UnpackReport>
where
    F: FnMut(&Path) -> std::result::Result<(), ManifestError>,
{
    let mut archive = open_archive(src)?;

    create_dir_all(dest, options.dir_mode)?;

    let mut report = UnpackReport::default();
    let mut manifest_entry: Option<String> = None;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| entry_error(src, e))?;
        let name = entry.name().to_string();
        let target = sanitize_entry_path(&name, dest)?;

        if entry.is_dir() {
            if !target.is_root() {
                create_dir_all(&target.resolved, options.dir_mode)?;
            }
            let mode = current_mode(&target.resolved, options.dir_mode)?;
            tracing::trace!(entry = %name, mode = format_args!("{:o}", mode), "Directory ready");
            report.entries.push(ExtractedEntry {
                path: target.relative,
                kind: EntryKind::Directory,
                size: 0,
                mode,
            });
            continue;
        }

        if target.is_root() {
            return Err(TemplateError::InvalidEntryName { entry: name });
        }

        let is_manifest = is_manifest_path(&target, options);

        if is_manifest {
            if let Some(first) = &manifest_entry {
                if options.multiple_manifests == ManifestPolicy::Reject {
                    return Err(TemplateError::MultipleManifests {
                        first: first.clone(),
                        second: name,
                    });
                }
            }
        }

        if let Some(parent) = target.resolved.parent() {
            create_dir_all(parent, options.dir_mode)?;
        }

        let mode = match entry.unix_mode() {
            Some(stored) if stored & S_IFMT == S_IFLNK => {
                tracing::debug!(entry = %name, "Writing symlink entry as a regular file");
                options.file_mode
            }
            Some(stored) if stored & 0o7777 != 0 => stored & 0o7777,
            _ => options.file_mode,
        };
        let size = write_file(&mut entry, &target.resolved, mode)?;
        tracing::trace!(entry = %name, size, mode = format_args!("{:o}", mode), "Wrote file");

        if is_manifest {
            on_manifest(&target.resolved).map_err(|source| TemplateError::ManifestLoad {
                path: target.resolved.clone(),
                source,
            })?;
            manifest_entry = Some(name);
            report.manifest = Some(target.relative.clone());
        }

        report.entries.push(ExtractedEntry {
            path: target.relative,
            kind: EntryKind::File,
            size,
            mode,
        });
    }

    if report.manifest.is_none() {
        tracing::warn!(archive = %src.display(), "Archive has no manifest entry");
    }

    tracing::debug!(
        archive = %src.display(),
        dest = %dest.display(),
        entries = report.entries.len(),
        bytes = report.total_bytes(),
        "Extracted archive"
    );

    Ok(report)
}

/// List the entries of an archive in stored order
pub fn list_archive(src: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut archive = open_archive(src)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| entry_error(src, e))?;
        entries.push(ArchiveEntry {
            path: entry.name().to_string(),
            size: entry.size(),
            is_dir: entry.is_dir(),
            mode: entry.unix_mode().map(|m| m & 0o7777),
        });
    }

    Ok(entries)
}

/// Parse the manifest straight from the archive without extracting anything
///
/// Returns `None` when the archive has no manifest entry. Entry names are
/// normalized and checked exactly as extraction does, so an archive that
/// would fail to unpack with `PathTraversal` fails here too. Several
/// manifests are handled according to `options.multiple_manifests`.
pub fn read_manifest_from_archive(
    src: &Path,
    options: &UnpackOptions,
) -> Result<Option<ManifestData>> {
    let mut archive = open_archive(src)?;
    let mut found: Option<(String, ManifestData)> = None;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| entry_error(src, e))?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let target = sanitize_entry_path(&name, Path::new(""))?;
        if !is_manifest_path(&target, options) {
            continue;
        }

        if let Some((first, _)) = &found {
            if options.multiple_manifests == ManifestPolicy::Reject {
                return Err(TemplateError::MultipleManifests {
                    first: first.clone(),
                    second: name,
                });
            }
        }

        let load_error = |source: ManifestError| TemplateError::ManifestLoad {
            path: PathBuf::from(&name),
            source,
        };
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| load_error(ManifestError::Read(e)))?;
        let data = ManifestData::parse(&content).map_err(load_error)?;
        found = Some((name, data));
    }

    Ok(found.map(|(_, data)| data))
}

fn open_archive(src: &Path) -> Result<ZipArchive<File>> {
    let open_error = |source: ZipError| TemplateError::ArchiveOpen {
        path: src.to_path_buf(),
        source,
    };
    let file = File::open(src).map_err(|e| open_error(ZipError::Io(e)))?;
    ZipArchive::new(file).map_err(open_error)
}

/// Failures reading an individual entry are reported as IO errors on the archive
fn entry_error(src: &Path, err: ZipError) -> TemplateError {
    let source = match err {
        ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    };
    TemplateError::io(src, source)
}

/// Whether a sanitized entry names the manifest, judged on its normalized base name
fn is_manifest_path(target: &SanitizedPath, options: &UnpackOptions) -> bool {
    target
        .relative
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| options.is_manifest_name(n))
}

/// Create `path` and its missing ancestors
///
/// Directories created here get exactly `mode`; existing ones are left as they are.
fn create_dir_all(path: &Path, mode: u32) -> Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent, mode)?;
    }

    match fs::create_dir(path) {
        Ok(()) => set_mode(path, mode),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(TemplateError::io(path, e)),
    }
}

/// Apply exact permission bits, bypassing the umask
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| TemplateError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// Permission bits currently on disk; `fallback` where the platform has none
fn current_mode(path: &Path, fallback: u32) -> Result<u32> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fallback;
        let metadata = fs::metadata(path).map_err(|e| TemplateError::io(path, e))?;
        Ok(metadata.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(fallback)
    }
}

/// Create or truncate `path` and copy the entry content into it
fn write_file<R: Read>(reader: &mut R, path: &Path, mode: u32) -> Result<u64> {
    let mut open = OpenOptions::new();
    open.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        open.mode(mode);
    }

    let mut file = open.open(path).map_err(|e| TemplateError::io(path, e))?;
    let written = io::copy(reader, &mut file).map_err(|e| TemplateError::io(path, e))?;

    // The creation mode is filtered by the umask and ignored for existing files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))
            .map_err(|e| TemplateError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(written)
}
