//! Unit tests for the build orchestrator.

use super::*;
use crate::command::EnvValue;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output};
use rstest::{fixture, rstest};
use tempfile::TempDir;

const LIB: &str = "prqlc_c";

struct Workspace {
    _temp: TempDir,
    request: BuildRequest,
}

fn matrix(pairs: &[(&str, &str)]) -> TargetMatrix {
    TargetMatrix::new(
        pairs
            .iter()
            .map(|(triple, zig)| TargetSpec::new(*triple, *zig).expect("valid target"))
            .collect(),
    )
    .expect("valid matrix")
}

#[fixture]
fn workspace() -> Workspace {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf8 temp dir");
    let request = BuildRequest {
        crate_dir: root.join("crate"),
        target_dir: None,
        output_dir: root.join("dist"),
        lib_name: LIB.to_owned(),
        targets: matrix(&[
            ("aarch64-unknown-linux-musl", "aarch64-linux-musl"),
            ("x86_64-pc-windows-gnu", "x86_64-windows-gnu"),
            ("x86_64-apple-darwin", "x86_64-macos"),
        ]),
        jobs: None,
        pause: Duration::ZERO,
        check_zig: false,
    };
    Workspace {
        _temp: temp,
        request,
    }
}

/// Place the library cargo would have produced for `triple`.
fn seed_library(request: &BuildRequest, triple: &str) {
    let target = request
        .targets
        .iter()
        .find(|t| t.triple() == triple)
        .expect("target in matrix");
    let path = request.built_library_path(target);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, triple.as_bytes()).expect("write library");
}

fn quiet_run(
    orchestrator: &mut BuildOrchestrator<'_>,
    request: &BuildRequest,
) -> Result<Vec<BuildArtifact>> {
    let mut sink = Vec::new();
    let mut progress = Progress::new(&mut sink, true);
    orchestrator.run(request, &mut progress)
}

#[rstest]
fn builds_every_target_in_order(workspace: Workspace) {
    let request = &workspace.request;
    for target in &request.targets {
        seed_library(request, target.triple());
    }
    let executor = StubExecutor::new(vec![
        ExpectedCall::ok("rustup", &["target", "add", "aarch64-unknown-linux-musl"]),
        ExpectedCall::ok(
            "cargo",
            &["build", "--release", "--target", "aarch64-unknown-linux-musl"],
        ),
        ExpectedCall::ok("rustup", &["target", "add", "x86_64-pc-windows-gnu"]),
        ExpectedCall::ok(
            "cargo",
            &["build", "--release", "--target", "x86_64-pc-windows-gnu"],
        ),
        ExpectedCall::ok("rustup", &["target", "add", "x86_64-apple-darwin"]),
        ExpectedCall::ok(
            "cargo",
            &["build", "--release", "--target", "x86_64-apple-darwin"],
        ),
    ]);
    let mut orchestrator =
        BuildOrchestrator::new(&executor, Duration::from_secs(1), Duration::from_secs(1));

    let artifacts = quiet_run(&mut orchestrator, request).expect("build succeeds");

    executor.assert_finished();
    let names: Vec<_> = artifacts
        .iter()
        .map(|a| a.path.file_name().expect("file name").to_owned())
        .collect();
    assert_eq!(
        names,
        [
            "libprqlc_c-aarch64-unknown-linux-musl.a",
            "libprqlc_c-x86_64-pc-windows-gnu.a",
            "libprqlc_c-x86_64-apple-darwin.a",
        ]
    );
    assert_eq!(
        std::fs::read(&artifacts[1].path).expect("read artefact"),
        b"x86_64-pc-windows-gnu"
    );
    assert_eq!(
        orchestrator.trail(),
        [
            BuildState::Idle,
            BuildState::Compiling(0),
            BuildState::ArtifactReady(0),
            BuildState::Compiling(1),
            BuildState::ArtifactReady(1),
            BuildState::Compiling(2),
            BuildState::ArtifactReady(2),
            BuildState::Done,
        ]
    );
}

#[rstest]
fn cargo_command_scopes_cross_compiler_to_child(workspace: Workspace) {
    let executor = StubExecutor::new(Vec::new());
    let orchestrator =
        BuildOrchestrator::new(&executor, Duration::from_secs(1), Duration::from_secs(60));
    let target = TargetSpec::new("x86_64-apple-darwin", "x86_64-macos").expect("valid");

    let spec = orchestrator.cargo_command(&workspace.request, &target);

    let env = |key: &str| {
        spec.envs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(
        env("CC"),
        Some(EnvValue::Plain("zig cc -target x86_64-macos".to_owned()))
    );
    assert_eq!(
        env("CXX"),
        Some(EnvValue::Plain("zig c++ -target x86_64-macos".to_owned()))
    );
    assert_eq!(
        env("CFLAGS"),
        Some(EnvValue::Plain("--target=x86_64-macos".to_owned()))
    );
    assert_eq!(spec.current_dir, Some(workspace.request.crate_dir.clone()));
    assert_eq!(spec.timeout, Some(Duration::from_secs(60)));
}

#[rstest]
fn jobs_are_forwarded_to_cargo(mut workspace: Workspace) {
    workspace.request.jobs = Some(4);
    let executor = StubExecutor::new(Vec::new());
    let orchestrator =
        BuildOrchestrator::new(&executor, Duration::from_secs(1), Duration::from_secs(1));
    let target = TargetSpec::new("x86_64-apple-darwin", "x86_64-macos").expect("valid");

    let spec = orchestrator.cargo_command(&workspace.request, &target);

    assert_eq!(spec.args[spec.args.len() - 2..], ["--jobs", "4"]);
}

#[rstest]
fn build_failure_aborts_remaining_targets(workspace: Workspace) {
    let request = &workspace.request;
    seed_library(request, "aarch64-unknown-linux-musl");
    let executor = StubExecutor::new(vec![
        ExpectedCall::ok("rustup", &["target", "add", "aarch64-unknown-linux-musl"]),
        ExpectedCall::ok(
            "cargo",
            &["build", "--release", "--target", "aarch64-unknown-linux-musl"],
        ),
        ExpectedCall::ok("rustup", &["target", "add", "x86_64-pc-windows-gnu"]),
        ExpectedCall::new(
            "cargo",
            &["build", "--release", "--target", "x86_64-pc-windows-gnu"],
            Ok(failure_output("error: linking with `zig cc` failed")),
        ),
    ]);
    let mut orchestrator =
        BuildOrchestrator::new(&executor, Duration::from_secs(1), Duration::from_secs(1));

    let err = quiet_run(&mut orchestrator, request).expect_err("second target fails");

    executor.assert_finished();
    assert_eq!(executor.received().len(), 4, "third target must not start");
    assert!(matches!(
        &err,
        PackagerError::BuildFailed { target, .. } if target == "x86_64-pc-windows-gnu"
    ));
    assert_ne!(err.exit_code(), 0);
    assert_eq!(
        orchestrator.trail(),
        [
            BuildState::Idle,
            BuildState::Compiling(0),
            BuildState::ArtifactReady(0),
            BuildState::Compiling(1),
            BuildState::Aborted,
        ]
    );
    assert!(!request
        .output_dir
        .join("libprqlc_c-x86_64-apple-darwin.a")
        .exists());
}

#[rstest]
fn rustup_failure_stops_before_cargo(workspace: Workspace) {
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "rustup",
        &["target", "add", "aarch64-unknown-linux-musl"],
        Ok(failure_output("error: component download failed")),
    )]);
    let mut orchestrator =
        BuildOrchestrator::new(&executor, Duration::from_secs(1), Duration::from_secs(1));

    let err = quiet_run(&mut orchestrator, &workspace.request).expect_err("rustup fails");

    assert!(matches!(err, PackagerError::ToolchainSetup { .. }));
    assert_eq!(orchestrator.state(), BuildState::Aborted);
    executor.assert_finished();
}

#[rstest]
fn missing_library_is_a_build_failure(workspace: Workspace) {
    let executor = StubExecutor::new(vec![
        ExpectedCall::ok("rustup", &["target", "add", "aarch64-unknown-linux-musl"]),
        ExpectedCall::ok(
            "cargo",
            &["build", "--release", "--target", "aarch64-unknown-linux-musl"],
        ),
    ]);
    let mut orchestrator =
        BuildOrchestrator::new(&executor, Duration::from_secs(1), Duration::from_secs(1));

    let err = quiet_run(&mut orchestrator, &workspace.request).expect_err("no library");

    assert!(err.to_string().contains("libprqlc_c.a"));
}

#[rstest]
fn zig_check_runs_first(mut workspace: Workspace) {
    workspace.request.check_zig = true;
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "zig",
        &["version"],
        Ok(failure_output("zig: not found")),
    )]);
    let mut orchestrator =
        BuildOrchestrator::new(&executor, Duration::from_secs(1), Duration::from_secs(1));

    let err = quiet_run(&mut orchestrator, &workspace.request).expect_err("zig missing");

    assert!(matches!(err, PackagerError::ToolchainSetup { .. }));
    assert_eq!(
        orchestrator.trail(),
        [BuildState::Idle, BuildState::Aborted]
    );
}
