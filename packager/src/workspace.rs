//! Working and output directory layout for packaging runs.
//!
//! Every platform iteration reads and writes the same working directory, so
//! a run takes an exclusive advisory lock on it for its whole duration.

use crate::error::{PackagerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::fs::{File, OpenOptions};

/// Name of the lock file created inside the working directory.
pub const LOCK_FILE_NAME: &str = ".native-packager.lock";

/// Directories used by a packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    work_dir: Utf8PathBuf,
    output_dir: Utf8PathBuf,
}

impl PackageLayout {
    /// Describe a layout; nothing is created on disk.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::workspace::PackageLayout;
    ///
    /// let layout = PackageLayout::new("/tmp/work", "/tmp/out");
    /// assert_eq!(layout.component_dir("math").as_str(), "/tmp/out/math");
    /// ```
    #[must_use]
    pub fn new(work_dir: impl Into<Utf8PathBuf>, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Directory holding downloaded archives and extracted platforms.
    #[must_use]
    pub fn work_dir(&self) -> &Utf8Path {
        &self.work_dir
    }

    /// Root of the per-component output tree.
    #[must_use]
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Output directory of `component`.
    #[must_use]
    pub fn component_dir(&self, component: &str) -> Utf8PathBuf {
        self.output_dir.join(component)
    }

    /// Create both directories.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Io`] if either cannot be created.
    pub fn create(&self) -> Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

/// Exclusive lock on a working directory, released on drop.
#[derive(Debug)]
pub struct WorkDirLock {
    file: File,
    path: Utf8PathBuf,
}

impl WorkDirLock {
    /// Lock `work_dir`, failing immediately if another run holds it.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::WorkDirLocked`] if the lock is held and
    /// [`PackagerError::Io`] if the lock file cannot be opened.
    pub fn acquire(work_dir: &Utf8Path) -> Result<Self> {
        let path = work_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.try_lock_exclusive().map_err(|err| {
            if err.kind() == fs2::lock_contended_error().kind() {
                PackagerError::WorkDirLocked {
                    path: work_dir.to_owned(),
                }
            } else {
                PackagerError::Io(err)
            }
        })?;
        log::debug!("locked {path}");
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for WorkDirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_temp() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf8");
        (temp, path)
    }

    #[test]
    fn second_lock_is_refused_until_first_is_dropped() {
        let (_temp, dir) = utf8_temp();
        let first = WorkDirLock::acquire(&dir).expect("first lock");

        let err = WorkDirLock::acquire(&dir).expect_err("contended");
        assert!(matches!(err, PackagerError::WorkDirLocked { .. }));

        drop(first);
        WorkDirLock::acquire(&dir).expect("lock released");
    }

    #[test]
    fn create_makes_both_directories() {
        let (_temp, dir) = utf8_temp();
        let layout = PackageLayout::new(dir.join("work"), dir.join("out"));
        layout.create().expect("create");
        assert!(layout.work_dir().is_dir());
        assert!(layout.output_dir().is_dir());
    }
}
