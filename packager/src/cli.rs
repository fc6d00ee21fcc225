//! CLI argument definitions for the native packager.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::credential::CredentialSource;
use crate::pipeline::PackageOptions;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Cross-build native libraries and publish prebuilt shared objects.
#[derive(Parser, Debug)]
#[command(name = "native-packager")]
#[command(version, about)]
#[command(long_about = concat!(
    "Cross-build native libraries and publish prebuilt shared objects.\n\n",
    "The `build` pipeline compiles a static library for every entry of the ",
    "target matrix with zig as the C compiler. The `package` pipeline downloads ",
    "a release archive per platform, splits it into one directory per component ",
    "and writes a manifest for each. `publish` packages and then uploads every ",
    "component through the external uploader.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build the library for every target:\n",
    "    $ native-packager build --crate-dir prqlc-c --output-dir dist\n\n",
    "  Build one target only:\n",
    "    $ native-packager build --target x86_64-apple-darwin\n\n",
    "  Package a release, tolerating platforms without an archive:\n",
    "    $ native-packager package --allow-missing --jobs 4\n\n",
    "  Publish unattended:\n",
    "    $ native-packager publish --username ci --password-env REGISTRY_SECRET\n\n",
    "  Show the target matrix:\n",
    "    $ native-packager targets",
))]
pub struct Cli {
    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file overriding the built-in release and matrix.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<Utf8PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Cross-compile the static library for the target matrix.
    Build(BuildArgs),

    /// Download a release and write per-component packages.
    Package(PackageArgs),

    /// Package a release and upload every component.
    Publish(PublishArgs),

    /// Print the target matrix and platform list.
    Targets,
}

/// Arguments for the build command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    /// Crate to build.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub crate_dir: Utf8PathBuf,

    /// Cargo target directory [default: <crate-dir>/target].
    #[arg(long, value_name = "DIR")]
    pub target_dir: Option<Utf8PathBuf>,

    /// Directory receiving `lib<name>-<triple>.a` artefacts.
    #[arg(short, long, value_name = "DIR", default_value = "dist")]
    pub output_dir: Utf8PathBuf,

    /// Build only this target triple (can be repeated).
    #[arg(short, long, value_name = "TRIPLE")]
    pub target: Vec<String>,

    /// Library name as cargo emits it [default: from configuration].
    #[arg(long, value_name = "NAME")]
    pub lib_name: Option<String>,

    /// Number of parallel cargo build jobs.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Seconds to pause between targets [default: from configuration].
    #[arg(long, value_name = "SECS")]
    pub pause_secs: Option<u64>,

    /// Do not check that zig is installed before building.
    #[arg(long)]
    pub skip_zig_check: bool,

    /// Show the build plan and exit without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl Default for BuildArgs {
    fn default() -> Self {
        Self {
            crate_dir: Utf8PathBuf::from("."),
            target_dir: None,
            output_dir: Utf8PathBuf::from("dist"),
            target: Vec::new(),
            lib_name: None,
            jobs: None,
            pause_secs: None,
            skip_zig_check: false,
            dry_run: false,
        }
    }
}

/// Arguments for the package command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PackageArgs {
    /// Directory for downloaded archives and extracted platforms.
    #[arg(long, value_name = "DIR", default_value = "work")]
    pub work_dir: Utf8PathBuf,

    /// Root of the per-component output tree.
    #[arg(short, long, value_name = "DIR", default_value = "packages")]
    pub output_dir: Utf8PathBuf,

    /// Release version to package [default: from configuration].
    #[arg(long = "release", value_name = "VERSION")]
    pub release_version: Option<String>,

    /// Skip platforms whose archive is not published instead of failing.
    #[arg(long)]
    pub allow_missing: bool,

    /// Number of platforms downloaded at once.
    #[arg(
        short,
        long,
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u16).range(1..=64)
    )]
    pub jobs: u16,

    /// Do not download component documentation.
    #[arg(long)]
    pub skip_docs: bool,

    /// Show the packaging plan and exit without downloading.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl Default for PackageArgs {
    fn default() -> Self {
        Self {
            work_dir: Utf8PathBuf::from("work"),
            output_dir: Utf8PathBuf::from("packages"),
            release_version: None,
            allow_missing: false,
            jobs: 1,
            skip_docs: false,
            dry_run: false,
            json: false,
        }
    }
}

impl PackageArgs {
    /// Packaging switches selected by these arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::cli::PackageArgs;
    ///
    /// let args = PackageArgs {
    ///     jobs: 4,
    ///     allow_missing: true,
    ///     ..PackageArgs::default()
    /// };
    /// let options = args.options();
    /// assert_eq!(options.jobs, 4);
    /// assert!(options.allow_missing);
    /// assert!(!options.skip_docs);
    /// ```
    #[must_use]
    pub fn options(&self) -> PackageOptions {
        PackageOptions {
            allow_missing: self.allow_missing,
            jobs: usize::from(self.jobs),
            skip_docs: self.skip_docs,
        }
    }
}

/// Arguments for the publish command.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishArgs {
    /// Packaging options.
    #[command(flatten)]
    pub package: PackageArgs,

    /// Registry username; prompts interactively when omitted.
    #[arg(short, long, value_name = "NAME", requires = "password_env")]
    pub username: Option<String>,

    /// Environment variable holding the registry secret.
    #[arg(long, value_name = "VAR", requires = "username")]
    pub password_env: Option<String>,

    /// Keep uploading after a component fails and report all failures.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Uploader executable [default: from configuration].
    #[arg(long, value_name = "PROGRAM")]
    pub uploader: Option<String>,
}

impl PublishArgs {
    /// Where the credential comes from.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::cli::PublishArgs;
    /// use native_packager::credential::CredentialSource;
    ///
    /// assert_eq!(PublishArgs::default().credential_source(), CredentialSource::Interactive);
    /// ```
    #[must_use]
    pub fn credential_source(&self) -> CredentialSource {
        match (&self.username, &self.password_env) {
            (Some(username), Some(secret_var)) => CredentialSource::Environment {
                username: username.clone(),
                secret_var: secret_var.clone(),
            },
            _ => CredentialSource::Interactive,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
