//! Shared test utilities for the packager crate.

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::command::{CommandExecutor, CommandSpec};
use crate::error::{PackagerError, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::Mutex;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    exit_output(1, stderr)
}

/// Creates a command `Output` with the given exit code and stderr message.
pub fn exit_output(code: i32, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Runs `f` with `var` set to `value`, restoring the previous value after.
pub fn with_env_secret<R>(var: &str, value: &str, f: impl FnOnce() -> R) -> R {
    temp_env::with_var(var, Some(value), f)
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g., "cargo").
    pub program: &'static str,
    /// The arguments to pass to the program.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Expect `program args…` and answer with `result`.
    pub fn new(program: &'static str, args: &[&'static str], result: Result<Output>) -> Self {
        Self {
            program,
            args: args.to_vec(),
            result,
        }
    }

    /// Expect `program args…` and report success.
    pub fn ok(program: &'static str, args: &[&'static str]) -> Self {
        Self::new(program, args, Ok(success_output()))
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Checks invocations against a queue of expected calls, returns the
/// predefined results, and records every received [`CommandSpec`] so tests
/// can inspect environment and working-directory settings.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    received: RefCell<Vec<CommandSpec>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            received: RefCell::new(Vec::new()),
        }
    }

    /// Returns every command received so far, in order.
    pub fn received(&self) -> Vec<CommandSpec> {
        self.received.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        let remaining = self.expected.borrow();
        assert!(
            remaining.is_empty(),
            "expected no further command invocations, {} remain: {:?}",
            remaining.len(),
            remaining.iter().map(|c| c.program).collect::<Vec<_>>()
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        self.received.borrow_mut().push(spec.clone());
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(PackagerError::StubMismatch {
                message: format!("unexpected command: {}", spec.display_line()),
            });
        };

        if call.program != spec.program || call.args != spec.args {
            return Err(PackagerError::StubMismatch {
                message: format!(
                    "expected `{} {}`, got `{}`",
                    call.program,
                    call.args.join(" "),
                    spec.display_line()
                ),
            });
        }

        call.result
    }
}

/// Writes a `.zip` archive at `path` containing `entries`.
///
/// # Errors
///
/// Returns an I/O error if the archive cannot be written.
pub fn write_zip_archive(path: &Path, entries: &[(&str, &[u8])]) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in entries {
        writer.start_file(*name, options).map_err(std::io::Error::other)?;
        writer.write_all(contents)?;
    }
    writer.finish().map_err(std::io::Error::other)?;
    Ok(())
}

/// A downloader that serves files from a local directory.
///
/// The last segment of each requested URL names a file under `root`; a
/// missing file is reported as [`DownloadError::NotFound`]. Every requested
/// URL is recorded.
#[derive(Debug)]
pub struct LocalReleaseDownloader {
    root: PathBuf,
    requested: Mutex<Vec<String>>,
}

impl LocalReleaseDownloader {
    /// Serve files from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// URLs requested so far.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    fn resolve(&self, url: &str) -> std::result::Result<PathBuf, DownloadError> {
        if let Ok(mut urls) = self.requested.lock() {
            urls.push(url.to_owned());
        }
        let name = url.rsplit('/').next().unwrap_or_default();
        let path = self.root.join(name);
        if name.is_empty() || !path.is_file() {
            return Err(DownloadError::NotFound {
                url: url.to_owned(),
            });
        }
        Ok(path)
    }
}

impl ArtefactDownloader for LocalReleaseDownloader {
    fn download_to_file(&self, url: &str, dest: &Path) -> std::result::Result<(), DownloadError> {
        let source = self.resolve(url)?;
        std::fs::copy(source, dest)?;
        Ok(())
    }

    fn download_text(&self, url: &str) -> std::result::Result<String, DownloadError> {
        let source = self.resolve(url)?;
        Ok(std::fs::read_to_string(source)?)
    }
}
