//! Release archive extraction.
//!
//! Extracts `.zip`, `.tar.gz`/`.tgz`, and `.tar.zst` archives into a
//! platform directory. Every entry path is validated before anything is
//! written, so an archive cannot place files outside the destination.

use std::fs;
use std::io::Read;
use std::path::{Component, Path};

/// Trait for extracting release archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use native_packager::artefact::extraction::ArchiveExtractor;
///
/// let extractor = ArchiveExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// # let _ = extractor;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactExtractor: Send + Sync {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the relative paths of the regular files that were extracted.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry
    /// attempts to escape the destination directory,
    /// [`ExtractionError::EmptyArchive`] if no files are found,
    /// [`ExtractionError::UnsupportedFormat`] for an unknown file name, and
    /// [`ExtractionError::Io`] or [`ExtractionError::Zip`] on read failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path)
    -> Result<Vec<String>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container is malformed.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,

    /// The archive file name has no recognised extension.
    #[error("unsupported archive format: {name}")]
    UnsupportedFormat {
        /// The archive file name.
        name: String,
    },
}

/// Container format, chosen from the archive file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar.gz` or `.tgz`
    TarGz,
    /// `.tar.zst`
    TarZst,
}

impl ArchiveFormat {
    /// Detect the format of `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::artefact::extraction::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::from_name("sqlean-win-x64.zip"), Some(ArchiveFormat::Zip));
    /// assert_eq!(ArchiveFormat::from_name("lib.tgz"), Some(ArchiveFormat::TarGz));
    /// assert_eq!(ArchiveFormat::from_name("lib.rar"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.zst") {
            Some(Self::TarZst)
        } else {
            None
        }
    }
}

/// Default extractor dispatching on [`ArchiveFormat`].
pub struct ArchiveExtractor;

impl ArtefactExtractor for ArchiveExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<String>, ExtractionError> {
        let name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let format =
            ArchiveFormat::from_name(&name).ok_or(ExtractionError::UnsupportedFormat { name })?;

        fs::create_dir_all(dest_dir)?;
        let file = fs::File::open(archive_path)?;
        let extracted = match format {
            ArchiveFormat::Zip => extract_zip(file, dest_dir)?,
            ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(file), dest_dir)?,
            ArchiveFormat::TarZst => extract_tar(zstd::Decoder::new(file)?, dest_dir)?,
        };

        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }
        log::debug!(
            "extracted {} file(s) from {}",
            extracted.len(),
            archive_path.display()
        );
        Ok(extracted)
    }
}

fn extract_zip(file: fs::File, dest_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(file)?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let raw_name = entry.name().to_owned();
        let entry_path = entry
            .enclosed_name()
            .ok_or_else(|| ExtractionError::PathTraversal {
                path: raw_name.clone(),
            })?;
        validate_entry_path(&entry_path)?;

        let dest_path = dest_dir.join(&entry_path);
        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&dest_path)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted.push(entry_path.to_string_lossy().into_owned());
    }

    Ok(extracted)
}

fn extract_tar(reader: impl Read, dest_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;

        let dest_path = dest_dir.join(&entry_path);
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if !kind.is_file() {
            log::debug!("skipping non-regular entry {}", entry_path.display());
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest_path)?;
        extracted.push(entry_path.to_string_lossy().into_owned());
    }

    Ok(extracted)
}

/// Validate that an entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
