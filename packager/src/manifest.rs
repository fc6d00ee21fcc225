//! Component manifests.
//!
//! A manifest lists every platform for which a component's shared object is
//! present in the output tree. Building one is a pure function of the
//! release metadata, the component, the platform list, and which files exist
//! on disk, so repeated calls over the same tree yield identical manifests.
//!
//! The manifest is written as `manifest.toml` beside the platform folders:
//!
//! ```toml
//! name = "sqlean-math"
//! displayName = "sqlean math"
//! description = "Math functions"
//! version = "0.28.0"
//! author = "nalgeon"
//! license = "MIT"
//! homepage = "https://github.com/nalgeon/sqlean/blob/main/docs/math.md"
//! repository = "https://github.com/nalgeon/sqlean"
//! type = "sharedObject"
//! minimumAnyqueryVersion = "0.0.1"
//!
//! [[file]]
//! platform = "linux/arm64"
//! directory = "linux-arm64"
//! executablePath = "math.so"
//! ```

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::config::{ComponentSpec, ReleaseSource};
use crate::error::{PackagerError, Result};
use crate::matrix::platform::PlatformList;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the manifest inside a component directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.toml";

/// File name of the documentation inside a component directory.
pub const README_FILE_NAME: &str = "README.md";

/// One platform entry of a component manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFile {
    /// Registry platform identifier, e.g. `darwin/arm64`.
    pub platform: String,
    /// Folder holding the file, relative to the component directory.
    pub directory: String,
    /// File name relative to `directory`.
    pub executable_path: String,
}

/// Package descriptor for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentManifest {
    /// Registry package name.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// One-line description.
    pub description: String,
    /// Release version.
    pub version: String,
    /// Package author.
    pub author: String,
    /// Package licence.
    pub license: String,
    /// Component documentation page.
    pub homepage: String,
    /// Upstream repository.
    #[serde(rename = "repository")]
    pub repository_url: String,
    /// Registry package type.
    #[serde(rename = "type")]
    pub package_type: String,
    /// Oldest host version able to load the package.
    #[serde(rename = "minimumAnyqueryVersion")]
    pub minimum_host_version: String,
    /// Platforms with a file present, in platform-list order.
    #[serde(rename = "file", default)]
    pub files: Vec<PlatformFile>,
}

impl ComponentManifest {
    /// Whether no platform provided a file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Registry platform identifiers in manifest order.
    #[must_use]
    pub fn platforms(&self) -> Vec<String> {
        self.files.iter().map(|f| f.platform.clone()).collect()
    }

    /// Serialise the manifest as TOML.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error if the manifest cannot be encoded.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// Build the manifest for `component` from the files under `component_dir`.
///
/// A platform contributes an entry only if
/// `<component_dir>/<folder>/<component>.<ext>` is a file.
///
/// # Examples
///
/// ```
/// use native_packager::config::{ComponentSpec, PackagerConfig};
/// use native_packager::manifest::build_manifest;
///
/// let config = PackagerConfig::defaults().expect("defaults");
/// let component = ComponentSpec::new("math", "Math functions");
/// let dir = tempfile::tempdir().expect("temp dir");
///
/// let manifest = build_manifest(&config.release, &component, &config.platforms, dir.path());
/// assert_eq!(manifest.name, "sqlean-math");
/// assert!(manifest.is_empty());
/// ```
#[must_use]
pub fn build_manifest(
    release: &ReleaseSource,
    component: &ComponentSpec,
    platforms: &PlatformList,
    component_dir: &Path,
) -> ComponentManifest {
    let files = platforms
        .iter()
        .filter_map(|platform| {
            let file_name = platform.component_file_name(&component.name);
            let present = component_dir
                .join(platform.folder())
                .join(&file_name)
                .is_file();
            present.then(|| PlatformFile {
                platform: platform.registry_platform().to_owned(),
                directory: platform.folder().to_owned(),
                executable_path: file_name,
            })
        })
        .collect();

    ComponentManifest {
        name: release.package_name(&component.name),
        display_name: release.display_name(&component.name),
        description: component.description.clone(),
        version: release.version.clone(),
        author: release.author.clone(),
        license: release.license.clone(),
        homepage: release.homepage(&component.name),
        repository_url: release.repository_url.clone(),
        package_type: release.package_type.clone(),
        minimum_host_version: release.minimum_host_version.clone(),
        files,
    }
}

/// Write `manifest` to `<component_dir>/manifest.toml`.
///
/// # Errors
///
/// Returns [`PackagerError::ManifestWrite`] if serialisation or the write
/// fails.
pub fn write_manifest(manifest: &ComponentManifest, component_dir: &Path) -> Result<PathBuf> {
    let write_error = |reason: String| PackagerError::ManifestWrite {
        component: manifest.name.clone(),
        reason,
    };
    let contents = manifest.to_toml().map_err(|e| write_error(e.to_string()))?;
    let path = component_dir.join(MANIFEST_FILE_NAME);
    std::fs::create_dir_all(component_dir).map_err(|e| write_error(e.to_string()))?;

    // Staged beside the target, then renamed into place.
    let mut staged = tempfile::NamedTempFile::new_in(component_dir)
        .map_err(|e| write_error(format!("cannot stage {}: {e}", path.display())))?;
    staged
        .write_all(contents.as_bytes())
        .map_err(|e| write_error(format!("cannot write {}: {e}", path.display())))?;
    staged
        .persist(&path)
        .map_err(|e| write_error(format!("cannot write {}: {}", path.display(), e.error)))?;
    log::debug!("wrote {}", path.display());
    Ok(path)
}

/// Download the component documentation to `<component_dir>/README.md`.
///
/// Returns `Ok(false)` if the documentation does not exist upstream.
///
/// # Errors
///
/// Returns [`PackagerError::Download`] for other download failures and
/// [`PackagerError::Io`] if the file cannot be written.
pub fn fetch_readme(
    downloader: &dyn ArtefactDownloader,
    release: &ReleaseSource,
    component: &ComponentSpec,
    component_dir: &Path,
) -> Result<bool> {
    let url = release.docs_url(&component.name);
    match downloader.download_text(&url) {
        Ok(text) => {
            std::fs::write(component_dir.join(README_FILE_NAME), text)?;
            Ok(true)
        }
        Err(DownloadError::NotFound { url }) => {
            log::warn!("no documentation for {} at {url}", component.name);
            Ok(false)
        }
        Err(source) => Err(PackagerError::Download {
            platform: format!("{} documentation", component.name),
            source,
        }),
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
