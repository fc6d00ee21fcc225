//! Registry publishing through the external uploader.
//!
//! Components are uploaded one at a time. Each upload runs
//! `<uploader> -u <user> --config manifest.toml -p <package>` in the
//! component directory with the secret in a single environment variable
//! set on that child only. A failed upload is never undone; later uploads
//! are skipped unless the caller asks to continue on error.

use crate::command::{CommandExecutor, CommandSpec, stderr_message};
use crate::credential::Credential;
use crate::error::{PackagerError, Result, UploadFailureKind};
use crate::manifest::MANIFEST_FILE_NAME;
use crate::output::Progress;
use crate::report::{ComponentOutcome, UploadFailure};
use camino::Utf8PathBuf;
use std::time::Duration;

/// A component ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUpload {
    /// Component name.
    pub component: String,
    /// Registry package name.
    pub package: String,
    /// Directory holding `manifest.toml` and the platform folders.
    pub directory: Utf8PathBuf,
}

/// Uploads one package to the registry.
#[cfg_attr(test, mockall::automock)]
pub trait Uploader {
    /// Upload `package` using `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Upload`] describing the failure.
    fn upload(&self, credential: &Credential, package: &PackageUpload) -> Result<()>;
}

/// Uploader backed by an external command-line tool.
pub struct ExternalUploader<'a> {
    executor: &'a dyn CommandExecutor,
    program: String,
    secret_env: String,
    timeout: Duration,
}

impl<'a> ExternalUploader<'a> {
    /// Create an uploader running `program` through `executor`.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        program: impl Into<String>,
        secret_env: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            program: program.into(),
            secret_env: secret_env.into(),
            timeout,
        }
    }

    /// The command uploading `package`.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::command::SystemCommandExecutor;
    /// use native_packager::credential::{Credential, Secret};
    /// use native_packager::publisher::{ExternalUploader, PackageUpload};
    /// use std::time::Duration;
    ///
    /// let uploader = ExternalUploader::new(
    ///     &SystemCommandExecutor,
    ///     "store-manager",
    ///     "ANYQUERY_PASSWORD",
    ///     Duration::from_secs(60),
    /// );
    /// let credential = Credential::new("alice", Secret::new("s3cret")).expect("credential");
    /// let package = PackageUpload {
    ///     component: "math".into(),
    ///     package: "sqlean-math".into(),
    ///     directory: "/out/math".into(),
    /// };
    /// let spec = uploader.command(&credential, &package);
    /// assert_eq!(
    ///     spec.display_line(),
    ///     "store-manager -u alice --config manifest.toml -p sqlean-math"
    /// );
    /// assert!(!format!("{spec:?}").contains("s3cret"));
    /// ```
    #[must_use]
    pub fn command(&self, credential: &Credential, package: &PackageUpload) -> CommandSpec {
        CommandSpec::new(self.program.clone())
            .args([
                "-u",
                credential.username(),
                "--config",
                MANIFEST_FILE_NAME,
                "-p",
                package.package.as_str(),
            ])
            .secret_env(self.secret_env.clone(), credential.secret().clone())
            .current_dir(package.directory.clone())
            .timeout(Some(self.timeout))
    }
}

impl Uploader for ExternalUploader<'_> {
    fn upload(&self, credential: &Credential, package: &PackageUpload) -> Result<()> {
        let spec = self.command(credential, package);
        let output = self.executor.run(&spec).map_err(|e| {
            let kind = match e {
                PackagerError::CommandTimeout { .. } => UploadFailureKind::NetworkFailure,
                _ => UploadFailureKind::ServerRejection,
            };
            PackagerError::Upload {
                package: package.package.clone(),
                kind,
                message: e.to_string(),
            }
        })?;
        if output.status.success() {
            return Ok(());
        }
        Err(PackagerError::Upload {
            package: package.package.clone(),
            kind: UploadFailureKind::from_exit_code(output.status.code()),
            message: stderr_message(&output),
        })
    }
}

/// Outcome of a publishing pass.
#[derive(Debug)]
pub struct PublishSummary {
    /// Outcome per package, in input order.
    pub outcomes: Vec<(String, ComponentOutcome)>,
    failures: Vec<UploadFailure>,
    abort: Option<PackagerError>,
}

impl PublishSummary {
    /// Failed uploads, in order.
    #[must_use]
    pub fn failures(&self) -> &[UploadFailure] {
        &self.failures
    }

    /// Convert the summary into the run result.
    ///
    /// # Errors
    ///
    /// Returns the aborting [`PackagerError::Upload`] when the pass stopped
    /// early, or [`PackagerError::UploadFailures`] when failures were
    /// collected with continue-on-error.
    pub fn into_result(self) -> Result<()> {
        if let Some(err) = self.abort {
            return Err(err);
        }
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(PackagerError::UploadFailures {
                failures: self.failures,
            })
        }
    }
}

/// Upload `packages` in order with one credential.
///
/// Without `continue_on_error`, the first failure stops the pass and every
/// later package is reported as [`ComponentOutcome::NotAttempted`].
pub fn publish_all(
    uploader: &dyn Uploader,
    credential: &Credential,
    packages: &[PackageUpload],
    continue_on_error: bool,
    progress: &mut Progress<'_>,
) -> PublishSummary {
    let mut summary = PublishSummary {
        outcomes: Vec::with_capacity(packages.len()),
        failures: Vec::new(),
        abort: None,
    };
    let total = packages.len();

    for (index, package) in packages.iter().enumerate() {
        if summary.abort.is_some() {
            summary
                .outcomes
                .push((package.package.clone(), ComponentOutcome::NotAttempted));
            continue;
        }
        let name = &package.package;
        progress.line(format!("[{}/{total}] Uploading {name}", index + 1));
        match uploader.upload(credential, package) {
            Ok(()) => {
                summary
                    .outcomes
                    .push((package.package.clone(), ComponentOutcome::Published));
            }
            Err(err) => {
                log::error!("{err}");
                progress.always(format!("  failed: {err}"));
                summary.outcomes.push((
                    package.package.clone(),
                    ComponentOutcome::Failed {
                        reason: err.to_string(),
                    },
                ));
                summary.failures.push(upload_failure(package, &err));
                if !continue_on_error {
                    summary.abort = Some(err);
                }
            }
        }
    }
    summary
}

fn upload_failure(package: &PackageUpload, err: &PackagerError) -> UploadFailure {
    match err {
        PackagerError::Upload { kind, message, .. } => UploadFailure {
            package: package.package.clone(),
            kind: *kind,
            message: message.clone(),
        },
        other => UploadFailure {
            package: package.package.clone(),
            kind: UploadFailureKind::ServerRejection,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
