//! Tests for packager CLI parsing and default behaviours.

use super::*;
use clap::CommandFactory;
use rstest::rstest;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("native-packager").chain(args.iter().copied()))
        .expect("arguments should parse")
}

#[test]
fn definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn build_defaults() {
    let cli = parse(&["build"]);
    assert_eq!(cli.global, GlobalArgs::default());
    match cli.command {
        Command::Build(args) => assert_eq!(args, BuildArgs::default()),
        other => panic!("expected Build, got {other:?}"),
    }
}

#[test]
fn build_accepts_repeated_targets() {
    let cli = parse(&[
        "build",
        "-t",
        "x86_64-apple-darwin",
        "--target",
        "aarch64-apple-darwin",
        "--jobs",
        "8",
        "--pause-secs",
        "3",
        "--skip-zig-check",
    ]);
    let Command::Build(args) = cli.command else {
        panic!("expected Build");
    };
    assert_eq!(args.target, ["x86_64-apple-darwin", "aarch64-apple-darwin"]);
    assert_eq!(args.jobs, Some(8));
    assert_eq!(args.pause_secs, Some(3));
    assert!(args.skip_zig_check);
}

#[test]
fn package_defaults() {
    let cli = parse(&["package"]);
    match cli.command {
        Command::Package(args) => assert_eq!(args, PackageArgs::default()),
        other => panic!("expected Package, got {other:?}"),
    }
}

#[test]
fn package_flags_map_to_options() {
    let cli = parse(&[
        "package",
        "--work-dir",
        "/tmp/work",
        "-o",
        "/tmp/out",
        "--release",
        "0.27.1",
        "--allow-missing",
        "-j",
        "3",
        "--skip-docs",
        "--json",
    ]);
    let Command::Package(args) = cli.command else {
        panic!("expected Package");
    };
    assert_eq!(args.work_dir, Utf8PathBuf::from("/tmp/work"));
    assert_eq!(args.output_dir, Utf8PathBuf::from("/tmp/out"));
    assert_eq!(args.release_version.as_deref(), Some("0.27.1"));
    assert!(args.json);
    assert_eq!(
        args.options(),
        PackageOptions {
            allow_missing: true,
            jobs: 3,
            skip_docs: true,
        }
    );
}

#[rstest]
#[case::zero("0")]
#[case::too_many("65")]
#[case::not_a_number("many")]
fn package_rejects_invalid_jobs(#[case] jobs: &str) {
    let result = Cli::try_parse_from(["native-packager", "package", "--jobs", jobs]);
    assert!(result.is_err());
}

#[rstest]
#[case::before(&["-vv", "package"])]
#[case::after(&["package", "-vv"])]
fn verbosity_is_global(#[case] args: &[&str]) {
    assert_eq!(parse(args).global.verbosity, 2);
}

#[test]
fn quiet_conflicts_with_verbose() {
    let result = Cli::try_parse_from(["native-packager", "-q", "-v", "targets"]);
    assert!(result.is_err());
}

#[test]
fn config_path_is_global() {
    let cli = parse(&["targets", "--config", "packager.toml"]);
    assert_eq!(cli.global.config, Some(Utf8PathBuf::from("packager.toml")));
    assert!(matches!(cli.command, Command::Targets));
}

#[test]
fn publish_without_username_prompts() {
    let Command::Publish(args) = parse(&["publish", "--continue-on-error"]).command else {
        panic!("expected Publish");
    };
    assert!(args.continue_on_error);
    assert_eq!(args.credential_source(), CredentialSource::Interactive);
}

#[test]
fn publish_with_username_reads_environment() {
    let Command::Publish(args) = parse(&[
        "publish",
        "-u",
        "ci",
        "--password-env",
        "REGISTRY_SECRET",
        "--uploader",
        "/opt/bin/store-manager",
        "--allow-missing",
    ])
    .command
    else {
        panic!("expected Publish");
    };
    assert_eq!(
        args.credential_source(),
        CredentialSource::Environment {
            username: "ci".to_owned(),
            secret_var: "REGISTRY_SECRET".to_owned(),
        }
    );
    assert_eq!(args.uploader.as_deref(), Some("/opt/bin/store-manager"));
    assert!(args.package.allow_missing);
}

#[rstest]
#[case::username_only(&["publish", "--username", "ci"])]
#[case::env_only(&["publish", "--password-env", "SECRET"])]
fn publish_credential_flags_require_each_other(#[case] args: &[&str]) {
    let result = Cli::try_parse_from(std::iter::once("native-packager").chain(args.iter().copied()));
    assert!(result.is_err());
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["native-packager"]).is_err());
}
