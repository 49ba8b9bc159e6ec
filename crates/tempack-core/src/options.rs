//! Unpack configuration
//!
//! Options can be built in code or loaded from a YAML file:
//!
//! ```yaml
//! dirMode: 0o750
//! fileMode: 0o640
//! manifestSuffix: .tm
//! multipleManifests: lastWins
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TemplateError};

/// Default suffix identifying the manifest entry
pub const MANIFEST_SUFFIX: &str = ".tm";

/// Default permissions for directories created during extraction
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Default permissions for file entries that carry no mode
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// What to do when an archive holds more than one manifest entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManifestPolicy {
    /// Fail with `MultipleManifests` on the second manifest (default)
    #[default]
    Reject,
    /// Load every manifest in archive order; the last one wins
    LastWins,
}

/// Options controlling how a template archive is unpacked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpackOptions {
    /// Permissions for created directories (unix only)
    #[serde(default = "default_dir_mode", with = "octal_mode")]
    pub dir_mode: u32,

    /// Permissions for files whose entry stores no mode (unix only)
    #[serde(default = "default_file_mode", with = "octal_mode")]
    pub file_mode: u32,

    /// Base-name suffix that marks the manifest entry
    #[serde(default = "default_manifest_suffix")]
    pub manifest_suffix: String,

    /// Handling of archives with several manifest entries
    #[serde(default)]
    pub multiple_manifests: ManifestPolicy,
}

fn default_dir_mode() -> u32 {
    DEFAULT_DIR_MODE
}

fn default_file_mode() -> u32 {
    DEFAULT_FILE_MODE
}

fn default_manifest_suffix() -> String {
    MANIFEST_SUFFIX.to_string()
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            dir_mode: default_dir_mode(),
            file_mode: default_file_mode(),
            manifest_suffix: default_manifest_suffix(),
            multiple_manifests: ManifestPolicy::default(),
        }
    }
}

impl UnpackOptions {
    /// Load options from a YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))?;
        let options: Self = serde_yaml::from_str(&content).map_err(|e| TemplateError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    pub fn file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn manifest_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.manifest_suffix = suffix.into();
        self
    }

    pub fn multiple_manifests(mut self, policy: ManifestPolicy) -> Self {
        self.multiple_manifests = policy;
        self
    }

    /// Check the options for values extraction cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.manifest_suffix.is_empty() {
            return Err(TemplateError::Config {
                message: "manifestSuffix must not be empty".to_string(),
            });
        }
        if self.manifest_suffix.contains(['/', '\\']) {
            return Err(TemplateError::Config {
                message: format!(
                    "manifestSuffix '{}' must not contain a path separator",
                    self.manifest_suffix
                ),
            });
        }
        for (field, mode) in [("dirMode", self.dir_mode), ("fileMode", self.file_mode)] {
            if mode > 0o7777 {
                return Err(TemplateError::Config {
                    message: format!("{} {:o} is not a permission mode", field, mode),
                });
            }
        }
        Ok(())
    }

    /// Whether a base file name marks the manifest entry
    pub fn is_manifest_name(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.manifest_suffix)
    }
}

/// Permission modes are always octal: `0o755`, `755` and `"0o755"` all mean `rwxr-xr-x`
///
/// The scalar text is parsed rather than the resolved YAML integer, so an
/// unquoted `644` is octal 644 and not decimal 644.
mod octal_mode {
    use serde::{Deserializer, Serializer, de};
    use std::fmt;

    pub fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0o{:o}", mode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        deserializer.deserialize_str(OctalVisitor)
    }

    struct OctalVisitor;

    impl de::Visitor<'_> for OctalVisitor {
        type Value = u32;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "an octal permission mode such as \"0o755\"")
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<u32, E> {
            parse_octal(s).ok_or_else(|| E::custom(format!("invalid octal mode '{}'", s)))
        }

        // Only reached when the scalar text is unavailable; the decimal value is ambiguous
        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
            Err(E::custom(format!(
                "ambiguous permission mode {}; write it as a string such as \"0o{}\"",
                v, v
            )))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
            Err(E::custom(format!(
                "ambiguous permission mode {}; write it as a string such as \"0o{}\"",
                v, v
            )))
        }
    }

    pub(super) fn parse_octal(s: &str) -> Option<u32> {
        let s = s.trim();
        let digits = s.strip_prefix("0o").unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return None;
        }
        u32::from_str_radix(digits, 8).ok()
    }
}
