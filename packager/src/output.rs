//! Output formatting for the packager CLI.
//!
//! Progress lines go to an injected writer (stderr in production) so tests
//! can capture them; `--quiet` suppresses everything but errors.

use crate::builder::BuildRequest;
use crate::config::PackagerConfig;
use crate::report::{ComponentOutcome, RunReport};
use std::fmt::Display;
use std::io::Write;

/// User-facing progress sink.
pub struct Progress<'a> {
    sink: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Progress<'a> {
    /// Write progress to `sink`, or nothing when `quiet`.
    pub fn new(sink: &'a mut dyn Write, quiet: bool) -> Self {
        Self { sink, quiet }
    }

    /// Whether progress output is suppressed.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Write one progress line.
    pub fn line(&mut self, message: impl Display) {
        if !self.quiet {
            write_stderr_line(self.sink, message);
        }
    }

    /// Write one line even in quiet mode.
    pub fn always(&mut self, message: impl Display) {
        write_stderr_line(self.sink, message);
    }
}

/// Write a line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Describe a build run without performing it.
///
/// # Example
///
/// ```
/// use camino::Utf8PathBuf;
/// use native_packager::builder::BuildRequest;
/// use native_packager::config::PackagerConfig;
/// use native_packager::output::build_dry_run_text;
/// use std::time::Duration;
///
/// let config = PackagerConfig::defaults().expect("defaults");
/// let request = BuildRequest {
///     crate_dir: Utf8PathBuf::from("/src/prqlc-c"),
///     target_dir: None,
///     output_dir: Utf8PathBuf::from("/dist"),
///     lib_name: config.lib_name.clone(),
///     targets: config.targets.clone(),
///     jobs: None,
///     pause: Duration::ZERO,
///     check_zig: true,
/// };
/// let text = build_dry_run_text(&request);
/// assert!(text.contains("CC=\"zig cc -target aarch64-linux-musl\""));
/// assert!(text.contains("/dist/libprqlc_c-x86_64-apple-darwin.a"));
/// ```
#[must_use]
pub fn build_dry_run_text(request: &BuildRequest) -> String {
    let mut lines = vec![
        "Dry run - no commands will be executed".to_owned(),
        String::new(),
        format!("Crate directory: {}", request.crate_dir),
        format!("Target directory: {}", request.effective_target_dir()),
        format!("Output directory: {}", request.output_dir),
        format!("Library: lib{}.a", request.lib_name),
    ];
    if let Some(jobs) = request.jobs {
        lines.push(format!("Jobs: {jobs}"));
    }
    lines.push(String::new());
    for target in &request.targets {
        let zig = target.zig_target();
        lines.push(format!("rustup target add {}", target.triple()));
        lines.push(format!(
            "CC=\"zig cc -target {zig}\" CXX=\"zig c++ -target {zig}\" CFLAGS=\"--target={zig}\" cargo build --release --target {}",
            target.triple()
        ));
        lines.push(format!(
            "copy {} -> {}",
            request.built_library_path(target),
            request.artifact_path(target)
        ));
    }
    lines.join("\n")
}

/// Describe a packaging run without performing it.
#[must_use]
pub fn package_dry_run_text(config: &PackagerConfig, work_dir: &str, output_dir: &str) -> String {
    let mut lines = vec![
        "Dry run - nothing will be downloaded or written".to_owned(),
        String::new(),
        format!("Release: {} {}", config.release.name, config.release.version),
        format!("Work directory: {work_dir}"),
        format!("Output directory: {output_dir}"),
        String::new(),
        "Platforms:".to_owned(),
    ];
    for platform in &config.platforms {
        lines.push(format!(
            "  {} (*.{}, {}) <- {}",
            platform.folder(),
            platform.extension(),
            platform.registry_platform(),
            config.release.download_url(platform.archive_name())
        ));
    }
    lines.push(String::new());
    lines.push("Components:".to_owned());
    for component in &config.components {
        lines.push(format!(
            "  {} - {}",
            config.release.package_name(&component.name),
            component.description
        ));
    }
    lines.join("\n")
}

/// One-line summary of a packaging or publishing run.
#[must_use]
pub fn summary_line(report: &RunReport) -> String {
    let count = |outcome: &ComponentOutcome| report.with_outcome(outcome).count();
    let published = count(&ComponentOutcome::Published);
    let packaged = count(&ComponentOutcome::Packaged) + published;
    let skipped = count(&ComponentOutcome::Skipped);
    let failed = report
        .components
        .iter()
        .filter(|c| matches!(c.outcome, ComponentOutcome::Failed { .. }))
        .count();

    let mut parts = vec![format!("{packaged} packaged")];
    if published > 0 || failed > 0 {
        parts.push(format!("{published} published"));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    if skipped > 0 {
        parts.push(format!("{skipped} skipped"));
    }
    if !report.skipped_platforms.is_empty() {
        parts.push(format!(
            "missing platforms: {}",
            report.skipped_platforms.join(", ")
        ));
    }
    format!("Release {}: {}", report.version, parts.join(", "))
}

/// Describe the build matrix and platform list.
#[must_use]
pub fn targets_text(config: &PackagerConfig) -> String {
    let mut lines = vec![format!("Build targets (lib{}):", config.lib_name)];
    for target in &config.targets {
        lines.push(format!(
            "  {:<28} zig {:<20} -> {}",
            target.triple(),
            target.zig_target(),
            target.artifact_file_name(&config.lib_name)
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "Platforms ({} {}):",
        config.release.name, config.release.version
    ));
    for platform in &config.platforms {
        lines.push(format!(
            "  {:<12} {:<14} *.{:<6} {}",
            platform.folder(),
            platform.registry_platform(),
            platform.extension(),
            platform.archive_name()
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ComponentReport;

    fn report_with(outcomes: Vec<ComponentOutcome>) -> RunReport {
        let mut report = RunReport::new("0.28.0");
        for (i, outcome) in outcomes.into_iter().enumerate() {
            report.components.push(ComponentReport {
                component: format!("c{i}"),
                platforms: Vec::new(),
                outcome,
            });
        }
        report
    }

    #[test]
    fn quiet_progress_writes_nothing() {
        let mut sink = Vec::new();
        let mut progress = Progress::new(&mut sink, true);
        progress.line("hidden");
        assert!(sink.is_empty());
    }

    #[test]
    fn always_writes_in_quiet_mode() {
        let mut sink = Vec::new();
        let mut progress = Progress::new(&mut sink, true);
        progress.always("shown");
        assert_eq!(sink, b"shown\n");
    }

    #[test]
    fn summary_counts_packaged_only() {
        let report = report_with(vec![ComponentOutcome::Packaged, ComponentOutcome::Skipped]);
        assert_eq!(
            summary_line(&report),
            "Release 0.28.0: 1 packaged, 1 skipped"
        );
    }

    #[test]
    fn summary_counts_publish_failures() {
        let mut report = report_with(vec![
            ComponentOutcome::Published,
            ComponentOutcome::Failed {
                reason: "denied".to_owned(),
            },
        ]);
        report.skipped_platforms.push("windows-x64".to_owned());
        assert_eq!(
            summary_line(&report),
            "Release 0.28.0: 1 packaged, 1 published, 1 failed, missing platforms: windows-x64"
        );
    }

    #[test]
    fn targets_text_lists_matrix_in_order() {
        let config = PackagerConfig::defaults().expect("defaults");
        let text = targets_text(&config);
        let darwin = text.find("aarch64-apple-darwin").expect("darwin target");
        let musl = text.find("aarch64-unknown-linux-musl").expect("musl target");
        assert!(musl < darwin);
        assert!(text.contains("libprqlc_c-x86_64-pc-windows-gnu.a"));
        assert!(text.contains("windows/amd64"));
    }

    #[test]
    fn package_dry_run_lists_urls_and_packages() {
        let config = PackagerConfig::defaults().expect("defaults");
        let text = package_dry_run_text(&config, "/work", "/out");
        assert!(text.contains(
            "https://github.com/nalgeon/sqlean/releases/download/0.28.0/sqlean-macos-arm64.zip"
        ));
        assert!(text.contains("sqlean-vsv - CSV files as virtual tables"));
    }
}
