//! Splitting extracted platform directories into per-component trees.
//!
//! Each platform directory holds one shared object per component. The
//! splitter copies `<work>/<folder>/<name>.<ext>` to
//! `<output>/<name>/<folder>/<name>.<ext>`, then deletes the platform
//! directory and confirms it is gone so the next platform starts clean.

use super::fetcher::remove_dir_verified;
use crate::error::{PackagerError, Result};
use crate::matrix::platform::PlatformSpec;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// One shared object copied into the component tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFile {
    /// Component name (the file stem).
    pub component: String,
    /// Platform folder the file belongs to.
    pub folder: String,
    /// Destination path.
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the file contents.
    pub sha256: String,
}

/// Copy every top-level file of `platform_dir` with the platform's
/// extension into `output_dir`, then remove `platform_dir`.
///
/// Files are processed in name order; subdirectories are ignored.
///
/// # Errors
///
/// Returns [`PackagerError::Split`] if the directory cannot be scanned or a
/// file cannot be copied, and [`PackagerError::CleanupFailed`] if the
/// platform directory survives removal.
pub fn split_platform(
    platform: &PlatformSpec,
    platform_dir: &Path,
    output_dir: &Path,
) -> Result<Vec<SplitFile>> {
    let split_error = |reason: String| PackagerError::Split {
        platform: platform.folder().to_owned(),
        reason,
    };

    let sources = scan_platform_dir(platform, platform_dir)
        .map_err(|e| split_error(format!("cannot scan {}: {e}", platform_dir.display())))?;

    let mut split = Vec::with_capacity(sources.len());
    for (component, source) in sources {
        let dest_dir = output_dir.join(&component).join(platform.folder());
        let dest = dest_dir.join(platform.component_file_name(&component));
        copy_file(&source, &dest_dir, &dest)
            .map_err(|e| split_error(format!("cannot copy {}: {e}", source.display())))?;
        let sha256 = file_sha256(&dest)
            .map_err(|e| split_error(format!("cannot hash {}: {e}", dest.display())))?;
        log::debug!("{} -> {}", source.display(), dest.display());
        split.push(SplitFile {
            component,
            folder: platform.folder().to_owned(),
            path: dest,
            sha256,
        });
    }

    remove_dir_verified(platform_dir)?;
    Ok(split)
}

/// Top-level files matching the platform extension, sorted by name, paired
/// with their component name.
fn scan_platform_dir(
    platform: &PlatformSpec,
    platform_dir: &Path,
) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(platform_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || !platform.matches_file(&path) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            log::warn!("skipping non-UTF-8 file name {}", path.display());
            continue;
        };
        found.push((stem.to_owned(), path));
    }
    found.sort();
    Ok(found)
}

fn copy_file(source: &Path, dest_dir: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest_dir)?;
    fs::copy(source, dest)?;
    Ok(())
}

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
