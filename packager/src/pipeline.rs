//! Packaging and publishing orchestration.
//!
//! A packaging run locks the working directory, clears the component
//! directories left by earlier runs, processes every platform (download,
//! extract, split into component trees, delete), and only when every
//! platform succeeded writes one manifest per component. Publishing
//! uploads the packaged components with a single credential.

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::extraction::ArtefactExtractor;
use crate::artefact::fetcher::{
    FetchRequest, Fetcher, PlatformFetch, remove_dir_verified, run_bounded,
};
use crate::artefact::splitter::{SplitFile, split_platform};
use crate::config::{ComponentSpec, PackagerConfig};
use crate::credential::Credential;
use crate::error::{PackagerError, Result};
use crate::manifest::{ComponentManifest, build_manifest, fetch_readme, write_manifest};
use crate::matrix::platform::PlatformSpec;
use crate::output::Progress;
use crate::publisher::{PackageUpload, Uploader, publish_all};
use crate::report::{ComponentOutcome, ComponentReport, FetchFailure, RunReport};
use crate::workspace::{PackageLayout, WorkDirLock};
use camino::Utf8PathBuf;
use std::path::Path;

/// Switches for a packaging run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageOptions {
    /// Skip platforms whose archive is not published instead of failing.
    pub allow_missing: bool,
    /// Maximum number of platforms processed at once.
    pub jobs: usize,
    /// Do not download component documentation.
    pub skip_docs: bool,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            allow_missing: false,
            jobs: 1,
            skip_docs: false,
        }
    }
}

/// A component with a written manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedComponent {
    /// The configured component.
    pub component: ComponentSpec,
    /// The manifest written for it.
    pub manifest: ComponentManifest,
    /// Component output directory.
    pub directory: Utf8PathBuf,
    /// Whether `README.md` was written.
    pub readme: bool,
}

/// Result of a successful packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRun {
    /// Per-component outcomes.
    pub report: RunReport,
    /// Components ready for upload, in configuration order.
    pub packaged: Vec<PackagedComponent>,
    /// Every shared object copied, in platform order.
    pub files: Vec<SplitFile>,
}

impl PackageRun {
    /// Upload requests for every packaged component.
    #[must_use]
    pub fn uploads(&self) -> Vec<PackageUpload> {
        self.packaged
            .iter()
            .map(|packaged| PackageUpload {
                component: packaged.component.name.clone(),
                package: packaged.manifest.name.clone(),
                directory: packaged.directory.clone(),
            })
            .collect()
    }
}

enum PlatformOutcome {
    Split(Vec<SplitFile>),
    Missing(PlatformSpec),
}

/// Downloads a release and writes the per-component output tree.
pub struct PackagePipeline<'a> {
    config: &'a PackagerConfig,
    downloader: &'a dyn ArtefactDownloader,
    extractor: &'a dyn ArtefactExtractor,
}

impl<'a> PackagePipeline<'a> {
    /// Create a pipeline for `config`.
    #[must_use]
    pub fn new(
        config: &'a PackagerConfig,
        downloader: &'a dyn ArtefactDownloader,
        extractor: &'a dyn ArtefactExtractor,
    ) -> Self {
        Self {
            config,
            downloader,
            extractor,
        }
    }

    /// Run the packaging pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::WorkDirLocked`] if another run owns the
    /// working directory, [`PackagerError::FetchFailures`] if any platform
    /// failed (no manifest is written in that case), and
    /// [`PackagerError::ManifestWrite`] if a manifest cannot be written.
    pub fn run(
        &self,
        layout: &PackageLayout,
        options: PackageOptions,
        progress: &mut Progress<'_>,
    ) -> Result<PackageRun> {
        layout.create()?;
        let _lock = WorkDirLock::acquire(layout.work_dir())?;

        let release = &self.config.release;
        progress.line(format!(
            "Packaging {} {} for {} platform(s)...",
            release.name,
            release.version,
            self.config.platforms.len()
        ));

        self.clear_component_dirs(layout)?;
        let mut report = RunReport::new(release.version.clone());
        let files = self.process_platforms(layout, options, &mut report, progress)?;

        let mut packaged = Vec::new();
        for component in &self.config.components {
            let directory = layout.component_dir(&component.name);
            let manifest = build_manifest(
                release,
                component,
                &self.config.platforms,
                directory.as_std_path(),
            );
            if manifest.is_empty() {
                log::warn!(
                    "no platform files for component {}; skipping",
                    component.name
                );
                progress.line(format!("  {}: skipped (no files)", component.name));
                report.components.push(ComponentReport {
                    component: component.name.clone(),
                    platforms: Vec::new(),
                    outcome: ComponentOutcome::Skipped,
                });
                continue;
            }

            write_manifest(&manifest, directory.as_std_path())?;
            let readme = !options.skip_docs
                && fetch_readme(self.downloader, release, component, directory.as_std_path())?;
            progress.line(format!(
                "  {}: {} platform(s)",
                manifest.name,
                manifest.files.len()
            ));
            report.components.push(ComponentReport {
                component: component.name.clone(),
                platforms: manifest.platforms(),
                outcome: ComponentOutcome::Packaged,
            });
            packaged.push(PackagedComponent {
                component: component.clone(),
                manifest,
                directory,
                readme,
            });
        }

        self.warn_unconfigured(&files);
        Ok(PackageRun {
            report,
            packaged,
            files,
        })
    }

    /// Remove output from earlier runs so manifests only see this release.
    fn clear_component_dirs(&self, layout: &PackageLayout) -> Result<()> {
        for component in &self.config.components {
            let directory = layout.component_dir(&component.name);
            remove_dir_verified(directory.as_std_path())?;
        }
        Ok(())
    }

    fn process_platforms(
        &self,
        layout: &PackageLayout,
        options: PackageOptions,
        report: &mut RunReport,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<SplitFile>> {
        let fetcher = Fetcher::new(self.downloader, self.extractor);
        let request = FetchRequest {
            release: &self.config.release,
            platforms: &self.config.platforms,
            work_dir: layout.work_dir().as_std_path(),
            allow_missing: options.allow_missing,
            jobs: options.jobs,
        };
        let output_dir = layout.output_dir().as_std_path();

        let results = run_bounded(self.config.platforms.as_slice(), options.jobs, |platform| {
            process_platform(&fetcher, &request, platform, output_dir)
        });

        let mut files = Vec::new();
        let mut failures = Vec::new();
        for (platform, result) in self.config.platforms.iter().zip(results) {
            match result {
                Ok(PlatformOutcome::Split(split)) => {
                    progress.line(format!("  {}: {} file(s)", platform.folder(), split.len()));
                    files.extend(split);
                }
                Ok(PlatformOutcome::Missing(missing)) => {
                    progress.line(format!("  {}: not published, skipped", missing.folder()));
                    report.skipped_platforms.push(missing.folder().to_owned());
                }
                Err(err) => {
                    log::error!("{}: {err}", platform.folder());
                    failures.push(FetchFailure {
                        platform: platform.folder().to_owned(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(files)
        } else {
            Err(PackagerError::FetchFailures { failures })
        }
    }

    fn warn_unconfigured(&self, files: &[SplitFile]) {
        let mut unknown: Vec<&str> = files
            .iter()
            .map(|file| file.component.as_str())
            .filter(|name| !self.config.components.iter().any(|c| c.name == *name))
            .collect();
        unknown.sort_unstable();
        unknown.dedup();
        for name in unknown {
            log::warn!("release contains unconfigured component {name}; not packaged");
        }
    }
}

fn process_platform(
    fetcher: &Fetcher<'_>,
    request: &FetchRequest<'_>,
    platform: &PlatformSpec,
    output_dir: &Path,
) -> Result<PlatformOutcome> {
    match fetcher.fetch_platform(request, platform)? {
        PlatformFetch::Extracted { dir, .. } => {
            split_platform(platform, &dir, output_dir).map(PlatformOutcome::Split)
        }
        PlatformFetch::Missing { platform } => Ok(PlatformOutcome::Missing(platform)),
    }
}

/// Upload every packaged component and fold the outcomes into the report.
///
/// The returned report is complete even when publishing failed, so callers
/// can render it before reporting the error.
pub fn publish_packages(
    run: PackageRun,
    uploader: &dyn Uploader,
    credential: &Credential,
    continue_on_error: bool,
    progress: &mut Progress<'_>,
) -> (RunReport, Result<()>) {
    let uploads = run.uploads();
    let summary = publish_all(uploader, credential, &uploads, continue_on_error, progress);

    let mut report = run.report;
    for (upload, (_, outcome)) in uploads.iter().zip(&summary.outcomes) {
        if let Some(entry) = report
            .components
            .iter_mut()
            .find(|entry| entry.component == upload.component)
        {
            entry.outcome = outcome.clone();
        }
    }
    (report, summary.into_result())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
