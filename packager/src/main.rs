//! Native packager CLI entrypoint.
//!
//! This binary cross-builds a native library for the target matrix, or
//! downloads a prebuilt release, splits it into per-component packages and
//! publishes them to the plugin registry.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use native_packager::artefact::download::{HttpDownloader, RetryPolicy};
use native_packager::artefact::extraction::ArchiveExtractor;
use native_packager::builder::{BuildOrchestrator, BuildRequest};
use native_packager::cli::{BuildArgs, Cli, Command, PackageArgs, PublishArgs};
use native_packager::command::SystemCommandExecutor;
use native_packager::config::{ConfigError, PackagerConfig};
use native_packager::error::{PackagerError, Result};
use native_packager::logging;
use native_packager::output::{
    Progress, build_dry_run_text, package_dry_run_text, summary_line, targets_text,
    write_stderr_line,
};
use native_packager::pipeline::{PackagePipeline, PackageRun, publish_packages};
use native_packager::publisher::ExternalUploader;
use native_packager::report::RunReport;
use native_packager::workspace::PackageLayout;
use std::io::Write;
use std::time::Duration;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbosity, cli.global.quiet);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let config = PackagerConfig::load(cli.global.config.as_deref())?;
    let cwd = current_dir()?;
    let quiet = cli.global.quiet;

    match &cli.command {
        Command::Build(args) => run_build(&config, args, &cwd, quiet, stderr),
        Command::Package(args) => {
            let config = apply_release_override(config, args)?;
            run_package(&config, args, &cwd, quiet, stderr)
        }
        Command::Publish(args) => {
            let config = apply_release_override(config, &args.package)?;
            run_publish(&config, args, &cwd, quiet, stderr)
        }
        Command::Targets => {
            println!("{}", targets_text(&config));
            Ok(())
        }
    }
}

/// Cross-builds the library for the selected targets.
fn run_build(
    config: &PackagerConfig,
    args: &BuildArgs,
    cwd: &Utf8Path,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    let request = build_request(config, args, cwd)?;
    if args.dry_run {
        write_stderr_line(stderr, build_dry_run_text(&request));
        return Ok(());
    }

    let executor = SystemCommandExecutor;
    let mut orchestrator = BuildOrchestrator::new(
        &executor,
        config.timeouts.toolchain(),
        config.timeouts.build(),
    );
    let mut progress = Progress::new(stderr, quiet);
    progress.line(format!(
        "Building lib{} for {} target(s)...",
        request.lib_name,
        request.targets.len()
    ));
    let artifacts = orchestrator.run(&request, &mut progress)?;
    progress.line(format!(
        "Built {} artefact(s) in {}",
        artifacts.len(),
        request.output_dir
    ));
    Ok(())
}

/// Downloads the release and writes the component tree.
fn run_package(
    config: &PackagerConfig,
    args: &PackageArgs,
    cwd: &Utf8Path,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    let layout = package_layout(args, cwd);
    if args.dry_run {
        write_stderr_line(
            stderr,
            package_dry_run_text(config, layout.work_dir().as_str(), layout.output_dir().as_str()),
        );
        return Ok(());
    }

    let mut progress = Progress::new(stderr, quiet);
    let run = package(config, args, &layout, &mut progress)?;
    finish(&run.report, args.json, &mut progress)
}

/// Acquires the credential, packages the release and uploads every component.
fn run_publish(
    config: &PackagerConfig,
    args: &PublishArgs,
    cwd: &Utf8Path,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    let layout = package_layout(&args.package, cwd);
    let program = args
        .uploader
        .clone()
        .unwrap_or_else(|| config.publish.uploader.clone());
    if args.package.dry_run {
        write_stderr_line(
            stderr,
            package_dry_run_text(config, layout.work_dir().as_str(), layout.output_dir().as_str()),
        );
        write_stderr_line(stderr, "");
        write_stderr_line(
            stderr,
            format!(
                "Uploader: {program} (secret passed in {})",
                config.publish.secret_env
            ),
        );
        return Ok(());
    }

    let credential = {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        args.credential_source().acquire(&mut input, &mut *stderr)?
    };

    let mut progress = Progress::new(stderr, quiet);
    let run = package(config, &args.package, &layout, &mut progress)?;

    let executor = SystemCommandExecutor;
    let uploader = ExternalUploader::new(
        &executor,
        program,
        config.publish.secret_env.clone(),
        config.timeouts.upload(),
    );
    let (report, result) = publish_packages(
        run,
        &uploader,
        &credential,
        args.continue_on_error,
        &mut progress,
    );
    finish(&report, args.package.json, &mut progress)?;
    result
}

fn package(
    config: &PackagerConfig,
    args: &PackageArgs,
    layout: &PackageLayout,
    progress: &mut Progress<'_>,
) -> Result<PackageRun> {
    let downloader = HttpDownloader::new(
        config.timeouts.http(),
        RetryPolicy::new(
            config.network.download_retries,
            Duration::from_millis(config.network.retry_backoff_ms),
        ),
    );
    PackagePipeline::new(config, &downloader, &ArchiveExtractor).run(
        layout,
        args.options(),
        progress,
    )
}

fn finish(report: &RunReport, json: bool, progress: &mut Progress<'_>) -> Result<()> {
    progress.line(summary_line(report));
    if json {
        let rendered = report.to_json().map_err(std::io::Error::from)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{rendered}")?;
    }
    Ok(())
}

fn apply_release_override(config: PackagerConfig, args: &PackageArgs) -> Result<PackagerConfig> {
    match &args.release_version {
        Some(version) => Ok(config.with_release_version(version.clone())?),
        None => Ok(config),
    }
}

fn build_request(config: &PackagerConfig, args: &BuildArgs, cwd: &Utf8Path) -> Result<BuildRequest> {
    let targets = config
        .targets
        .select(&args.target)
        .map_err(ConfigError::from)?;
    Ok(BuildRequest {
        crate_dir: absolute(cwd, &args.crate_dir),
        target_dir: args.target_dir.as_deref().map(|dir| absolute(cwd, dir)),
        output_dir: absolute(cwd, &args.output_dir),
        lib_name: args
            .lib_name
            .clone()
            .unwrap_or_else(|| config.lib_name.clone()),
        targets,
        jobs: args.jobs,
        pause: args
            .pause_secs
            .map_or(config.pause_between_targets, Duration::from_secs),
        check_zig: !args.skip_zig_check,
    })
}

fn package_layout(args: &PackageArgs, cwd: &Utf8Path) -> PackageLayout {
    PackageLayout::new(
        absolute(cwd, &args.work_dir),
        absolute(cwd, &args.output_dir),
    )
}

fn absolute(cwd: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        cwd.join(path)
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| {
        PackagerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("current directory is not valid UTF-8: {e}"),
        ))
    })
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            err.exit_code()
        }
    }
}
