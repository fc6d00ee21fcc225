//! Release-library cross builds.
//!
//! The orchestrator walks the target matrix in order. For each target it
//! registers the target with `rustup`, runs `cargo build --release` with
//! `zig cc` configured as the C and C++ compiler for that child process, and
//! copies `lib<name>.a` to the output directory under a name embedding the
//! triple. The first failure aborts the run; no later target is attempted.

use crate::command::{CommandExecutor, CommandSpec, stderr_message};
use crate::error::{PackagerError, Result};
use crate::matrix::target::{TargetMatrix, TargetSpec};
use crate::output::Progress;
use crate::toolchain::Toolchain;
use camino::Utf8PathBuf;
use std::time::Duration;

/// Observable progress of a build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Nothing has started.
    Idle,
    /// Target `i` is being prepared or compiled.
    Compiling(usize),
    /// Target `i` produced its artefact.
    ArtifactReady(usize),
    /// Every target succeeded.
    Done,
    /// A target failed and the run stopped.
    Aborted,
}

/// Inputs for a build run.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Directory containing the crate's `Cargo.toml`.
    pub crate_dir: Utf8PathBuf,
    /// Cargo target directory; `<crate_dir>/target` when `None`.
    pub target_dir: Option<Utf8PathBuf>,
    /// Directory receiving the renamed artefacts.
    pub output_dir: Utf8PathBuf,
    /// Library name as cargo emits it.
    pub lib_name: String,
    /// Targets to build, in order.
    pub targets: TargetMatrix,
    /// Parallel jobs forwarded to cargo.
    pub jobs: Option<usize>,
    /// Pause between consecutive targets.
    pub pause: Duration,
    /// Check for `zig` before the first target.
    pub check_zig: bool,
}

impl BuildRequest {
    /// Cargo target directory for this request.
    #[must_use]
    pub fn effective_target_dir(&self) -> Utf8PathBuf {
        self.target_dir
            .clone()
            .unwrap_or_else(|| self.crate_dir.join("target"))
    }

    /// Path cargo writes the static library to for `target`.
    #[must_use]
    pub fn built_library_path(&self, target: &TargetSpec) -> Utf8PathBuf {
        self.effective_target_dir()
            .join(target.triple())
            .join("release")
            .join(target.static_lib_name(&self.lib_name))
    }

    /// Destination of the renamed artefact for `target`.
    #[must_use]
    pub fn artifact_path(&self, target: &TargetSpec) -> Utf8PathBuf {
        self.output_dir.join(target.artifact_file_name(&self.lib_name))
    }
}

/// An artefact produced for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    /// The target built.
    pub target: TargetSpec,
    /// Location of the renamed artefact.
    pub path: Utf8PathBuf,
}

/// Drives the cross build over a target matrix.
pub struct BuildOrchestrator<'a> {
    executor: &'a dyn CommandExecutor,
    toolchain: Toolchain<'a>,
    build_timeout: Duration,
    trail: Vec<BuildState>,
}

impl<'a> BuildOrchestrator<'a> {
    /// Create an orchestrator.
    ///
    /// `toolchain_timeout` bounds each `rustup` and `zig` call and
    /// `build_timeout` bounds each `cargo build`.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        toolchain_timeout: Duration,
        build_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            toolchain: Toolchain::new(executor, toolchain_timeout),
            build_timeout,
            trail: vec![BuildState::Idle],
        }
    }

    /// Every state entered so far, starting with [`BuildState::Idle`].
    #[must_use]
    pub fn trail(&self) -> &[BuildState] {
        &self.trail
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> BuildState {
        self.trail.last().copied().unwrap_or(BuildState::Idle)
    }

    /// The `cargo build` invocation for `target`.
    #[must_use]
    pub fn cargo_command(&self, request: &BuildRequest, target: &TargetSpec) -> CommandSpec {
        let mut args = vec![
            "build".to_owned(),
            "--release".to_owned(),
            "--target".to_owned(),
            target.triple().to_owned(),
        ];
        if let Some(jobs) = request.jobs {
            args.extend(["--jobs".to_owned(), jobs.to_string()]);
        }
        let zig = target.zig_target();
        CommandSpec::new("cargo")
            .args(args)
            .env("CC", format!("zig cc -target {zig}"))
            .env("CXX", format!("zig c++ -target {zig}"))
            .env("CFLAGS", format!("--target={zig}"))
            .env("CARGO_TARGET_DIR", request.effective_target_dir().as_str())
            .current_dir(request.crate_dir.clone())
            .timeout(Some(self.build_timeout))
    }

    /// Build every target in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ToolchainSetup`] or
    /// [`PackagerError::BuildFailed`] for the first failing target; the
    /// state trail then ends in [`BuildState::Aborted`].
    pub fn run(
        &mut self,
        request: &BuildRequest,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<BuildArtifact>> {
        let result = self.run_targets(request, progress);
        self.trail.push(match result {
            Ok(_) => BuildState::Done,
            Err(_) => BuildState::Aborted,
        });
        result
    }

    fn run_targets(
        &mut self,
        request: &BuildRequest,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<BuildArtifact>> {
        if request.check_zig {
            self.toolchain.check_zig()?;
        }
        std::fs::create_dir_all(&request.output_dir).map_err(|e| {
            PackagerError::BuildFailed {
                target: "all".to_owned(),
                reason: format!("cannot create {}: {e}", request.output_dir),
            }
        })?;

        let total = request.targets.len();
        let mut artifacts = Vec::with_capacity(total);
        for (index, target) in request.targets.iter().enumerate() {
            if index > 0 && !request.pause.is_zero() {
                std::thread::sleep(request.pause);
            }
            self.trail.push(BuildState::Compiling(index));
            progress.line(format!("[{}/{total}] Building {target}", index + 1));

            self.toolchain.add_target(target)?;
            self.compile(request, target)?;
            let path = copy_artifact(request, target)?;

            self.trail.push(BuildState::ArtifactReady(index));
            progress.line(format!("  -> {path}"));
            artifacts.push(BuildArtifact {
                target: target.clone(),
                path,
            });
        }
        Ok(artifacts)
    }

    fn compile(&self, request: &BuildRequest, target: &TargetSpec) -> Result<()> {
        let spec = self.cargo_command(request, target);
        let output = self
            .executor
            .run(&spec)
            .map_err(|e| build_failed(target, e.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        Err(build_failed(target, stderr_message(&output)))
    }
}

fn copy_artifact(request: &BuildRequest, target: &TargetSpec) -> Result<Utf8PathBuf> {
    let source = request.built_library_path(target);
    let dest = request.artifact_path(target);
    std::fs::copy(&source, &dest)
        .map_err(|e| build_failed(target, format!("cannot copy {source} to {dest}: {e}")))?;
    Ok(dest)
}

fn build_failed(target: &TargetSpec, reason: String) -> PackagerError {
    PackagerError::BuildFailed {
        target: target.triple().to_owned(),
        reason,
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
