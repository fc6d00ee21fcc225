//! Cross-compilation toolchain preparation.
//!
//! Registers Rust targets through `rustup` and checks that `zig` is
//! available to act as the C and C++ cross compiler.

use crate::command::{CommandExecutor, CommandSpec, stderr_message};
use crate::error::{PackagerError, Result};
use crate::matrix::target::TargetSpec;
use std::time::Duration;

/// Prepares the host toolchain for cross builds.
pub struct Toolchain<'a> {
    executor: &'a dyn CommandExecutor,
    timeout: Duration,
}

impl<'a> Toolchain<'a> {
    /// Create a toolchain helper whose commands time out after `timeout`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    /// The `rustup` invocation that registers `target`.
    #[must_use]
    pub fn add_target_command(&self, target: &TargetSpec) -> CommandSpec {
        CommandSpec::new("rustup")
            .args(["target", "add", target.triple()])
            .timeout(Some(self.timeout))
    }

    /// Register `target` with `rustup`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ToolchainSetup`] if `rustup` cannot be run or
    /// exits unsuccessfully.
    pub fn add_target(&self, target: &TargetSpec) -> Result<()> {
        let spec = self.add_target_command(target);
        let output = self.executor.run(&spec).map_err(|e| setup_error(target.triple(), &e))?;
        if output.status.success() {
            return Ok(());
        }
        Err(PackagerError::ToolchainSetup {
            target: target.triple().to_owned(),
            reason: format!("rustup target add failed: {}", stderr_message(&output)),
        })
    }

    /// Check that `zig` is on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ToolchainSetup`] if `zig version` fails.
    pub fn check_zig(&self) -> Result<()> {
        let spec = CommandSpec::new("zig")
            .args(["version"])
            .timeout(Some(self.timeout));
        let output = self.executor.run(&spec).map_err(|e| setup_error("zig", &e))?;
        if output.status.success() {
            log::debug!("zig {}", String::from_utf8_lossy(&output.stdout).trim());
            return Ok(());
        }
        Err(PackagerError::ToolchainSetup {
            target: "zig".to_owned(),
            reason: stderr_message(&output),
        })
    }
}

fn setup_error(target: &str, err: &PackagerError) -> PackagerError {
    PackagerError::ToolchainSetup {
        target: target.to_owned(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output};

    fn target() -> TargetSpec {
        TargetSpec::new("aarch64-unknown-linux-musl", "aarch64-linux-musl").expect("valid")
    }

    #[test]
    fn add_target_runs_rustup() {
        let executor = StubExecutor::new(vec![ExpectedCall::ok(
            "rustup",
            &["target", "add", "aarch64-unknown-linux-musl"],
        )]);
        Toolchain::new(&executor, Duration::from_secs(5))
            .add_target(&target())
            .expect("rustup succeeds");
        executor.assert_finished();
        assert_eq!(
            executor.received()[0].timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn add_target_failure_is_toolchain_setup() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "rustup",
            &["target", "add", "aarch64-unknown-linux-musl"],
            Ok(failure_output("error: toolchain 'stable' is not installed")),
        )]);
        let err = Toolchain::new(&executor, Duration::from_secs(5))
            .add_target(&target())
            .expect_err("rustup fails");
        assert!(matches!(err, PackagerError::ToolchainSetup { .. }));
        assert!(err.to_string().contains("not installed"));
    }

    #[test]
    fn spawn_failure_is_toolchain_setup() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "rustup",
            &["target", "add", "aarch64-unknown-linux-musl"],
            Err(PackagerError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "rustup: not found",
            ))),
        )]);
        let err = Toolchain::new(&executor, Duration::from_secs(5))
            .add_target(&target())
            .expect_err("spawn fails");
        assert_eq!(err.exit_code(), crate::error::EXIT_TOOLCHAIN);
    }

    #[test]
    fn missing_zig_is_reported() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "zig",
            &["version"],
            Ok(failure_output("zig: command not found")),
        )]);
        let err = Toolchain::new(&executor, Duration::from_secs(5))
            .check_zig()
            .expect_err("zig missing");
        assert!(err.to_string().contains("zig"));
    }
}
