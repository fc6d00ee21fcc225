//! Error types for the native packager.
//!
//! This module defines semantic error variants for every pipeline step. Each
//! variant maps onto an exit-code class so operators can script retries
//! against toolchain, download, and upload failures separately.

use crate::artefact::download::DownloadError;
use crate::artefact::extraction::ExtractionError;
use crate::config::ConfigError;
use crate::report::{FetchFailure, UploadFailure};
use camino::Utf8PathBuf;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of an upload failure reported by the uploader tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadFailureKind {
    /// The registry rejected the credential.
    AuthFailure,
    /// The uploader could not reach the registry.
    NetworkFailure,
    /// The registry refused the package.
    ServerRejection,
}

impl UploadFailureKind {
    /// Classify an uploader exit code.
    ///
    /// The uploader reports `2` for authentication failures and `3` for
    /// network failures; any other non-zero code is a server rejection.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::error::UploadFailureKind;
    ///
    /// assert_eq!(UploadFailureKind::from_exit_code(Some(2)), UploadFailureKind::AuthFailure);
    /// assert_eq!(UploadFailureKind::from_exit_code(Some(1)), UploadFailureKind::ServerRejection);
    /// ```
    #[must_use]
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(2) => Self::AuthFailure,
            Some(3) => Self::NetworkFailure,
            _ => Self::ServerRejection,
        }
    }
}

impl fmt::Display for UploadFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AuthFailure => "authentication failure",
            Self::NetworkFailure => "network failure",
            Self::ServerRejection => "server rejection",
        };
        f.write_str(label)
    }
}

/// Errors that can occur while building, packaging, or publishing.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// Registering a cross-compilation target or locating a compiler failed.
    #[error("toolchain setup failed for {target}: {reason}")]
    ToolchainSetup {
        /// The target triple being prepared.
        target: String,
        /// Description of the failure.
        reason: String,
    },

    /// The native build for a target failed.
    #[error("build failed for {target}: {reason}")]
    BuildFailed {
        /// The target triple that failed to build.
        target: String,
        /// Description of the build failure.
        reason: String,
    },

    /// Downloading a release asset failed.
    #[error("download failed for {platform}: {source}")]
    Download {
        /// Folder name of the platform whose archive was requested.
        platform: String,
        /// The underlying download error.
        #[source]
        source: DownloadError,
    },

    /// Extracting a release archive failed.
    #[error("extraction failed for {platform}: {source}")]
    Extraction {
        /// Folder name of the platform whose archive was extracted.
        platform: String,
        /// The underlying extraction error.
        #[source]
        source: ExtractionError,
    },

    /// Copying a platform's files into the component tree failed.
    #[error("splitting {platform} failed: {reason}")]
    Split {
        /// Folder name of the platform being split.
        platform: String,
        /// Description of the failure.
        reason: String,
    },

    /// A platform working directory could not be removed.
    #[error("cleanup of {path} failed: {reason}")]
    CleanupFailed {
        /// Directory that should have been removed.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// One or more platforms could not be fetched.
    #[error("{} platform(s) failed to fetch: {}", .failures.len(), FetchFailure::summarise(.failures))]
    FetchFailures {
        /// One entry per failed platform.
        failures: Vec<FetchFailure>,
    },

    /// A component manifest could not be serialised or written.
    #[error("failed to write manifest for {component}: {reason}")]
    ManifestWrite {
        /// Component whose manifest failed.
        component: String,
        /// Description of the failure.
        reason: String,
    },

    /// A component upload failed.
    #[error("upload of {package} failed ({kind}): {message}")]
    Upload {
        /// Registry package name.
        package: String,
        /// Failure classification.
        kind: UploadFailureKind,
        /// Uploader output or description.
        message: String,
    },

    /// One or more components failed to upload with continue-on-error set.
    #[error("{} upload(s) failed: {}", .failures.len(), UploadFailure::summarise(.failures))]
    UploadFailures {
        /// One entry per failed component.
        failures: Vec<UploadFailure>,
    },

    /// Acquiring the registry credential failed.
    #[error("credential input failed: {reason}")]
    Credential {
        /// Description of the failure.
        reason: String,
    },

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An external command did not finish within its timeout.
    #[error("{program} timed out after {} seconds", .timeout.as_secs())]
    CommandTimeout {
        /// The program that was killed.
        program: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Another packager run holds the working directory.
    #[error("working directory {path} is locked by another run")]
    WorkDirLocked {
        /// Locked working directory.
        path: Utf8PathBuf,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Exit status reported when configuration or an unclassified step fails.
pub const EXIT_GENERAL: i32 = 1;
/// Exit status reported for toolchain and build failures.
pub const EXIT_TOOLCHAIN: i32 = 2;
/// Exit status reported for download, extraction, and split failures.
pub const EXIT_DOWNLOAD: i32 = 3;
/// Exit status reported for upload failures.
pub const EXIT_UPLOAD: i32 = 4;
/// Exit status reported for manifest write failures.
pub const EXIT_MANIFEST: i32 = 5;

impl PackagerError {
    /// Return the process exit code for this failure class.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::error::PackagerError;
    ///
    /// let err = PackagerError::BuildFailed {
    ///     target: "x86_64-apple-darwin".to_owned(),
    ///     reason: "linker error".to_owned(),
    /// };
    /// assert_eq!(err.exit_code(), 2);
    /// ```
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ToolchainSetup { .. } | Self::BuildFailed { .. } => EXIT_TOOLCHAIN,
            Self::Download { .. }
            | Self::Extraction { .. }
            | Self::Split { .. }
            | Self::CleanupFailed { .. }
            | Self::FetchFailures { .. } => EXIT_DOWNLOAD,
            Self::Upload { .. } | Self::UploadFailures { .. } => EXIT_UPLOAD,
            Self::ManifestWrite { .. } => EXIT_MANIFEST,
            _ => EXIT_GENERAL,
        }
    }
}

/// Result type alias using [`PackagerError`].
pub type Result<T> = std::result::Result<T, PackagerError>;
