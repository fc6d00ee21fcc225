//! Release platforms for prebuilt shared-object packaging.
//!
//! A [`PlatformSpec`] names the release archive for one platform, the folder
//! that platform's files live under in the output tree, the shared-object
//! extension used on that platform, and the platform identifier the registry
//! expects in a manifest.

use super::error::{MatrixError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One platform of a prebuilt release.
///
/// # Examples
///
/// ```
/// use native_packager::matrix::platform::PlatformSpec;
///
/// let platform = PlatformSpec::new("sqlean-linux-arm64.zip", "linux-arm64", "so", "linux/arm64")
///     .expect("valid platform");
/// assert_eq!(platform.component_file_name("math"), "math.so");
/// assert!(platform.matches_file(std::path::Path::new("out/math.so")));
/// assert!(!platform.matches_file(std::path::Path::new("out/math.dll")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformSpec {
    archive_name: String,
    folder: String,
    extension: String,
    registry_platform: String,
}

impl PlatformSpec {
    /// Create a platform, validating every field.
    ///
    /// A leading `.` on the extension is accepted and stripped.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidPlatform`] if a field is empty or the
    /// archive name or folder are not plain file names.
    pub fn new(
        archive_name: impl Into<String>,
        folder: impl Into<String>,
        extension: impl Into<String>,
        registry_platform: impl Into<String>,
    ) -> Result<Self> {
        let extension = extension.into();
        let spec = Self {
            archive_name: archive_name.into(),
            folder: folder.into(),
            extension: extension.trim_start_matches('.').to_owned(),
            registry_platform: registry_platform.into(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// File name of the release archive for this platform.
    #[must_use]
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Folder name used for extraction and in the component output tree.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Shared-object extension without the leading dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Platform identifier recorded in manifests (e.g. `linux/arm64`).
    #[must_use]
    pub fn registry_platform(&self) -> &str {
        &self.registry_platform
    }

    /// File name of `component` on this platform.
    #[must_use]
    pub fn component_file_name(&self, component: &str) -> String {
        format!("{component}.{}", self.extension)
    }

    /// Whether `path` carries this platform's shared-object extension.
    #[must_use]
    pub fn matches_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }

    /// Re-run field validation, e.g. after deserialisation.
    ///
    /// # Errors
    ///
    /// See [`PlatformSpec::new`].
    pub fn validate(&self) -> Result<()> {
        require_file_name("archive_name", &self.archive_name)?;
        require_file_name("folder", &self.folder)?;
        require_non_empty("registry_platform", &self.registry_platform)?;
        require_non_empty("extension", &self.extension)?;
        if self.extension.contains(['.', '/', '\\']) {
            return Err(MatrixError::InvalidPlatform {
                field: "extension",
                value: self.extension.clone(),
                reason: "must be a single extension without separators".to_owned(),
            });
        }
        Ok(())
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MatrixError::InvalidPlatform {
            field,
            value: value.to_owned(),
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(())
}

fn require_file_name(field: &'static str, value: &str) -> Result<()> {
    require_non_empty(field, value)?;
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(MatrixError::InvalidPlatform {
            field,
            value: value.to_owned(),
            reason: "must be a plain file name".to_owned(),
        });
    }
    Ok(())
}

/// Ordered list of platforms with unique folders and archive names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PlatformList {
    platforms: Vec<PlatformSpec>,
}

impl PlatformList {
    /// Build a platform list.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::Empty`] for an empty list,
    /// [`MatrixError::Duplicate`] for repeated folders or archive names, and
    /// any per-platform validation error.
    pub fn new(platforms: Vec<PlatformSpec>) -> Result<Self> {
        if platforms.is_empty() {
            return Err(MatrixError::Empty("platform list"));
        }
        let mut folders = HashSet::new();
        let mut archives = HashSet::new();
        for platform in &platforms {
            platform.validate()?;
            if !folders.insert(platform.folder()) {
                return Err(MatrixError::Duplicate {
                    kind: "platform folder",
                    value: platform.folder().to_owned(),
                });
            }
            if !archives.insert(platform.archive_name()) {
                return Err(MatrixError::Duplicate {
                    kind: "archive name",
                    value: platform.archive_name().to_owned(),
                });
            }
        }
        Ok(Self { platforms })
    }

    /// Iterate over platforms in order.
    pub fn iter(&self) -> std::slice::Iter<'_, PlatformSpec> {
        self.platforms.iter()
    }

    /// Borrow the platforms as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[PlatformSpec] {
        &self.platforms
    }

    /// Number of platforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    /// Always false for a constructed list; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

impl<'a> IntoIterator for &'a PlatformList {
    type Item = &'a PlatformSpec;
    type IntoIter = std::slice::Iter<'a, PlatformSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn linux_arm() -> PlatformSpec {
        PlatformSpec::new("sqlean-linux-arm64.zip", "linux-arm64", "so", "linux/arm64")
            .expect("valid")
    }

    #[test]
    fn leading_dot_is_stripped_from_extension() {
        let platform = PlatformSpec::new("a.zip", "win", ".dll", "windows/amd64").expect("valid");
        assert_eq!(platform.extension(), "dll");
        assert_eq!(platform.component_file_name("uuid"), "uuid.dll");
    }

    #[rstest]
    #[case::same_ext("dir/crypto.so", true)]
    #[case::other_ext("dir/crypto.dylib", false)]
    #[case::no_ext("dir/crypto", false)]
    #[case::double_ext("dir/crypto.so.1", false)]
    fn matches_file_by_extension(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(linux_arm().matches_file(Path::new(path)), expected);
    }

    #[rstest]
    #[case::empty_folder("a.zip", "", "so", "linux/arm64")]
    #[case::nested_folder("a.zip", "linux/arm64", "so", "linux/arm64")]
    #[case::parent_folder("a.zip", "..", "so", "linux/arm64")]
    #[case::archive_path("dl/a.zip", "linux", "so", "linux/arm64")]
    #[case::empty_extension("a.zip", "linux", "", "linux/arm64")]
    #[case::compound_extension("a.zip", "linux", "so.1", "linux/arm64")]
    #[case::empty_registry("a.zip", "linux", "so", " ")]
    fn rejects_invalid_fields(
        #[case] archive: &str,
        #[case] folder: &str,
        #[case] ext: &str,
        #[case] registry: &str,
    ) {
        let err = PlatformSpec::new(archive, folder, ext, registry).expect_err("invalid");
        assert!(matches!(err, MatrixError::InvalidPlatform { .. }), "{err:?}");
    }

    #[test]
    fn list_rejects_duplicate_folders() {
        let other = PlatformSpec::new("b.zip", "linux-arm64", "so", "linux/arm64").expect("valid");
        let err = PlatformList::new(vec![linux_arm(), other]).expect_err("duplicate");
        assert!(matches!(
            err,
            MatrixError::Duplicate {
                kind: "platform folder",
                ..
            }
        ));
    }

    #[test]
    fn list_rejects_empty() {
        assert_eq!(
            PlatformList::new(Vec::new()),
            Err(MatrixError::Empty("platform list"))
        );
    }
}
