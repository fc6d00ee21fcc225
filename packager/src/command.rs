//! External command execution with per-invocation environment and timeouts.
//!
//! Every external tool the pipelines drive (`rustup`, `cargo`, the registry
//! uploader) runs through [`CommandExecutor`]. Environment overrides apply to
//! the spawned child only and never touch the parent process environment.

use crate::credential::Secret;
use crate::error::{PackagerError, Result};
use camino::Utf8PathBuf;
use std::fmt;
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Value of an environment variable passed to a child process.
#[derive(Clone, PartialEq, Eq)]
pub enum EnvValue {
    /// A value that may appear in logs.
    Plain(String),
    /// A value that is redacted from every `Debug` rendering.
    Secret(Secret),
}

impl EnvValue {
    fn expose(&self) -> &str {
        match self {
            Self::Plain(value) => value,
            Self::Secret(secret) => secret.expose(),
        }
    }
}

impl fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => write!(f, "{value:?}"),
            Self::Secret(_) => f.write_str("<redacted>"),
        }
    }
}

/// A fully described external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to run.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Environment overrides scoped to this invocation.
    pub envs: Vec<(String, EnvValue)>,
    /// Working directory for the child, if any.
    pub current_dir: Option<Utf8PathBuf>,
    /// Upper bound on the child's run time.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Start describing an invocation of `program`.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::command::CommandSpec;
    ///
    /// let spec = CommandSpec::new("rustup").args(["target", "add", "x86_64-apple-darwin"]);
    /// assert_eq!(spec.display_line(), "rustup target add x86_64-apple-darwin");
    /// ```
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a plain environment variable on the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), EnvValue::Plain(value.into())));
        self
    }

    /// Set a redacted environment variable on the child.
    #[must_use]
    pub fn secret_env(mut self, key: impl Into<String>, value: Secret) -> Self {
        self.envs.push((key.into(), EnvValue::Secret(value)));
        self
    }

    /// Run the child in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Bound the child's run time.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Render the program and arguments as a single line for progress output.
    #[must_use]
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs the described command and returns its captured output.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Io`] if the command cannot be spawned and
    /// [`PackagerError::CommandTimeout`] if it outlives its timeout.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use native_packager::command::{CommandExecutor, CommandSpec, SystemCommandExecutor};
    ///
    /// let output = SystemCommandExecutor.run(&CommandSpec::new("cargo").args(["--version"]))?;
    /// assert!(output.status.success());
    /// # Ok::<(), native_packager::error::PackagerError>(())
    /// ```
    fn run(&self, spec: &CommandSpec) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        log::debug!("running {} (env: {:?})", spec.display_line(), spec.envs);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &spec.envs {
            cmd.env(key, value.expose());
        }
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir.as_std_path());
        }

        let mut child = cmd.spawn()?;

        // Drain both pipes concurrently so a chatty child cannot block on a
        // full pipe while we wait for it.
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let status = match spec.timeout {
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PackagerError::CommandTimeout {
                        program: spec.program.clone(),
                        timeout,
                    });
                }
            },
            None => child.wait()?,
        };

        Ok(Output {
            status,
            stdout: join_pipe_reader(stdout_reader)?,
            stderr: join_pipe_reader(stderr_reader)?,
        })
    }
}

type PipeReader = std::thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_pipe_reader<R>(pipe: Option<R>) -> PipeReader
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn join_pipe_reader(reader: PipeReader) -> Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| std::io::Error::other("pipe reader thread panicked"))?
        .map_err(PackagerError::from)
}

/// Return trimmed stderr of a failed command, or a placeholder when empty.
#[must_use]
pub fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        match output.status.code() {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_owned(),
        }
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exit_status, failure_output};

    #[test]
    fn display_line_joins_program_and_args() {
        let spec = CommandSpec::new("cargo").args(["build", "--release"]);
        assert_eq!(spec.display_line(), "cargo build --release");
    }

    #[test]
    fn debug_output_redacts_secret_env() {
        let spec = CommandSpec::new("uploader")
            .env("VISIBLE", "yes")
            .secret_env("TOKEN", Secret::new("hunter2"));
        let rendered = format!("{spec:?}");
        assert!(rendered.contains("VISIBLE"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn stderr_message_prefers_stderr_text() {
        let output = failure_output("  linker not found \n");
        assert_eq!(stderr_message(&output), "linker not found");
    }

    #[test]
    fn stderr_message_falls_back_to_status() {
        let output = Output {
            status: exit_status(7),
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        assert_eq!(stderr_message(&output), "exited with status 7");
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_scopes_env_to_child() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf %s \"$NATIVE_PACKAGER_PROBE\""])
            .secret_env("NATIVE_PACKAGER_PROBE", Secret::new("child-only"));
        let output = SystemCommandExecutor.run(&spec).expect("sh runs");
        assert_eq!(output.stdout, b"child-only");
        assert!(std::env::var_os("NATIVE_PACKAGER_PROBE").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_kills_on_timeout() {
        let spec = CommandSpec::new("sleep")
            .args(["5"])
            .timeout(Some(Duration::from_millis(100)));
        let err = SystemCommandExecutor.run(&spec).expect_err("sleep outlives timeout");
        assert!(matches!(err, PackagerError::CommandTimeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_runs_in_current_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let utf8 = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8");
        std::fs::write(dir.path().join("marker"), b"").expect("write marker");
        let spec = CommandSpec::new("ls").current_dir(utf8);
        let output = SystemCommandExecutor.run(&spec).expect("ls runs");
        assert!(String::from_utf8_lossy(&output.stdout).contains("marker"));
    }
}
