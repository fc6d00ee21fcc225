//! Per-platform release archive retrieval.
//!
//! For each platform the fetcher clears any stale platform directory,
//! downloads the release archive into the working directory, extracts it into
//! `<work>/<folder>`, and deletes the archive. Platforms are independent:
//! every platform is attempted and the outcomes are collected before the
//! caller decides whether to continue.

use super::download::{ArtefactDownloader, DownloadError};
use super::extraction::ArtefactExtractor;
use crate::config::ReleaseSource;
use crate::error::{PackagerError, Result};
use crate::matrix::platform::{PlatformList, PlatformSpec};
use crate::report::FetchFailure;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

/// Parameters shared by every platform fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    /// Release metadata used to build download URLs.
    pub release: &'a ReleaseSource,
    /// Platforms to fetch, in order.
    pub platforms: &'a PlatformList,
    /// Directory holding archives and extracted platform directories.
    pub work_dir: &'a Path,
    /// Treat a missing (404) archive as a skipped platform.
    pub allow_missing: bool,
    /// Maximum number of concurrent downloads; `0` is treated as `1`.
    pub jobs: usize,
}

/// Result of fetching one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformFetch {
    /// The archive was extracted into `dir`.
    Extracted {
        /// The platform fetched.
        platform: PlatformSpec,
        /// Extracted platform directory.
        dir: PathBuf,
        /// Relative paths of the extracted files.
        files: Vec<String>,
    },
    /// The archive does not exist and missing archives are allowed.
    Missing {
        /// The platform skipped.
        platform: PlatformSpec,
    },
}

/// Downloads and extracts release archives.
pub struct Fetcher<'a> {
    downloader: &'a dyn ArtefactDownloader,
    extractor: &'a dyn ArtefactExtractor,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher over the given downloader and extractor.
    #[must_use]
    pub fn new(downloader: &'a dyn ArtefactDownloader, extractor: &'a dyn ArtefactExtractor) -> Self {
        Self {
            downloader,
            extractor,
        }
    }

    /// Fetch a single platform.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::CleanupFailed`] if a stale platform directory
    /// cannot be removed, [`PackagerError::Download`] if the archive cannot be
    /// downloaded (including 404 without `allow_missing`), and
    /// [`PackagerError::Extraction`] if it cannot be unpacked.
    pub fn fetch_platform(
        &self,
        request: &FetchRequest<'_>,
        platform: &PlatformSpec,
    ) -> Result<PlatformFetch> {
        let platform_dir = request.work_dir.join(platform.folder());
        remove_dir_verified(&platform_dir)?;

        let archive_path = request.work_dir.join(platform.archive_name());
        let url = request.release.download_url(platform.archive_name());
        match self.downloader.download_to_file(&url, &archive_path) {
            Ok(()) => {}
            Err(DownloadError::NotFound { url }) if request.allow_missing => {
                log::warn!(
                    "release archive for {} not found at {url}; skipping platform",
                    platform.folder()
                );
                return Ok(PlatformFetch::Missing {
                    platform: platform.clone(),
                });
            }
            Err(source) => {
                return Err(PackagerError::Download {
                    platform: platform.folder().to_owned(),
                    source,
                });
            }
        }

        let extracted = self.extractor.extract(&archive_path, &platform_dir);
        remove_archive(&archive_path)?;
        let files = extracted.map_err(|source| PackagerError::Extraction {
            platform: platform.folder().to_owned(),
            source,
        })?;

        Ok(PlatformFetch::Extracted {
            platform: platform.clone(),
            dir: platform_dir,
            files,
        })
    }

    /// Fetch every platform, running up to `request.jobs` downloads at once.
    ///
    /// Results are returned in platform-list order, one per platform.
    pub fn fetch_each(&self, request: &FetchRequest<'_>) -> Vec<Result<PlatformFetch>> {
        run_bounded(request.platforms.as_slice(), request.jobs, |platform| {
            self.fetch_platform(request, platform)
        })
    }

    /// Fetch every platform and aggregate failures.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::FetchFailures`] listing every platform that
    /// failed, after all platforms have been attempted.
    pub fn fetch_all(&self, request: &FetchRequest<'_>) -> Result<Vec<PlatformFetch>> {
        let mut fetched = Vec::new();
        let mut failures = Vec::new();
        for (platform, result) in request.platforms.iter().zip(self.fetch_each(request)) {
            match result {
                Ok(outcome) => fetched.push(outcome),
                Err(err) => {
                    log::error!("{}: {err}", platform.folder());
                    failures.push(FetchFailure {
                        platform: platform.folder().to_owned(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        if failures.is_empty() {
            Ok(fetched)
        } else {
            Err(PackagerError::FetchFailures { failures })
        }
    }
}

/// Apply `task` to every item on at most `jobs` scoped worker threads.
///
/// Results are returned in item order. With `jobs <= 1` the items are
/// processed sequentially on the calling thread.
///
/// # Examples
///
/// ```
/// use native_packager::artefact::fetcher::run_bounded;
///
/// let doubled = run_bounded(&[1, 2, 3, 4], 3, |n| n * 2);
/// assert_eq!(doubled, vec![2, 4, 6, 8]);
/// ```
pub fn run_bounded<T, R, F>(items: &[T], jobs: usize, task: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = jobs.clamp(1, items.len().max(1));
    if workers == 1 {
        return items.iter().map(&task).collect();
    }

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let task = &task;
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    if tx.send((index, task(item))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut indexed: Vec<(usize, R)> = rx.into_iter().collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}

/// Remove `dir` if present and confirm it is gone.
///
/// # Errors
///
/// Returns [`PackagerError::CleanupFailed`] if removal fails or the directory
/// still exists afterwards.
pub fn remove_dir_verified(dir: &Path) -> Result<()> {
    let cleanup_failed = |reason: String| PackagerError::CleanupFailed {
        path: camino::Utf8PathBuf::from(dir.to_string_lossy().into_owned()),
        reason,
    };
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(cleanup_failed(e.to_string())),
    }
    if dir.exists() {
        return Err(cleanup_failed("directory still exists after removal".to_owned()));
    }
    Ok(())
}

fn remove_archive(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PackagerError::CleanupFailed {
            path: camino::Utf8PathBuf::from(path.to_string_lossy().into_owned()),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;
