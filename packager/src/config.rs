//! Packager configuration.
//!
//! The compiled-in defaults describe the release this tool was written for:
//! the sqlean shared objects for five platforms and the `prqlc_c` static
//! library for five cross-compilation targets. An optional TOML file
//! overrides any section; fields missing from a section keep their default,
//! while list sections (`components`, `platforms`, `build.targets`) replace
//! the default list wholesale.
//!
//! ```toml
//! [release]
//! version = "0.28.1"
//!
//! [[components]]
//! name = "math"
//! description = "Math functions"
//!
//! [build]
//! lib_name = "prqlc_c"
//! targets = [{ triple = "x86_64-apple-darwin", zig_target = "x86_64-macos" }]
//! ```

use crate::matrix::error::MatrixError;
use crate::matrix::platform::{PlatformList, PlatformSpec};
use crate::matrix::target::{TargetMatrix, TargetSpec};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors arising while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid config {path}: {reason}")]
    Parse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// The target matrix or platform list is invalid.
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    /// A field holds an unusable value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Description of the validation failure.
        reason: String,
    },
}

/// Static metadata describing the upstream release being repackaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseSource {
    /// Upstream project name.
    pub name: String,
    /// Release version tag to download.
    pub version: String,
    /// Archive URL; `{version}` and `{archive}` are substituted.
    pub download_url_template: String,
    /// Documentation URL per component; `{component}` is substituted.
    pub docs_url_template: String,
    /// Homepage per component; `{component}` is substituted.
    pub homepage_template: String,
    /// Package author recorded in manifests.
    pub author: String,
    /// Package licence recorded in manifests.
    pub license: String,
    /// Upstream repository URL.
    pub repository_url: String,
    /// Prefix joined to the component name to form the package name.
    pub package_prefix: String,
    /// Prefix joined to the component name to form the display name.
    pub display_prefix: String,
    /// Oldest host version able to load the packages.
    pub minimum_host_version: String,
    /// Registry package type.
    pub package_type: String,
}

impl Default for ReleaseSource {
    fn default() -> Self {
        Self {
            name: "sqlean".to_owned(),
            version: "0.28.0".to_owned(),
            download_url_template:
                "https://github.com/nalgeon/sqlean/releases/download/{version}/{archive}".to_owned(),
            docs_url_template:
                "https://raw.githubusercontent.com/nalgeon/sqlean/main/docs/{component}.md"
                    .to_owned(),
            homepage_template: "https://github.com/nalgeon/sqlean/blob/main/docs/{component}.md"
                .to_owned(),
            author: "nalgeon".to_owned(),
            license: "MIT".to_owned(),
            repository_url: "https://github.com/nalgeon/sqlean".to_owned(),
            package_prefix: "sqlean-".to_owned(),
            display_prefix: "sqlean ".to_owned(),
            minimum_host_version: "0.0.1".to_owned(),
            package_type: "sharedObject".to_owned(),
        }
    }
}

impl ReleaseSource {
    /// Download URL of `archive` for the configured version.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::config::ReleaseSource;
    ///
    /// let release = ReleaseSource::default();
    /// assert_eq!(
    ///     release.download_url("sqlean-win-x64.zip"),
    ///     "https://github.com/nalgeon/sqlean/releases/download/0.28.0/sqlean-win-x64.zip"
    /// );
    /// ```
    #[must_use]
    pub fn download_url(&self, archive: &str) -> String {
        self.render(&self.download_url_template, archive, "")
    }

    /// Documentation URL for `component`.
    #[must_use]
    pub fn docs_url(&self, component: &str) -> String {
        self.render(&self.docs_url_template, "", component)
    }

    /// Homepage URL for `component`.
    #[must_use]
    pub fn homepage(&self, component: &str) -> String {
        self.render(&self.homepage_template, "", component)
    }

    /// Registry package name for `component`.
    #[must_use]
    pub fn package_name(&self, component: &str) -> String {
        format!("{}{component}", self.package_prefix)
    }

    /// Human-readable name for `component`.
    #[must_use]
    pub fn display_name(&self, component: &str) -> String {
        format!("{}{component}", self.display_prefix)
    }

    fn render(&self, template: &str, archive: &str, component: &str) -> String {
        template
            .replace("{version}", &self.version)
            .replace("{archive}", archive)
            .replace("{component}", component)
    }
}

/// A component (one shared object) of the release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    /// File stem of the shared object, e.g. `math`.
    pub name: String,
    /// One-line description recorded in the manifest.
    pub description: String,
}

impl ComponentSpec {
    /// Create a component description.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

const DEFAULT_COMPONENTS: &[(&str, &str)] = &[
    ("crypto", "Hashing, encoding and decoding data"),
    ("define", "User-defined functions and dynamic sql"),
    ("fileio", "Read and write files"),
    ("fuzzy", "Fuzzy string matching and phonetics"),
    ("ipaddr", "IP address manipulation"),
    ("math", "Math functions"),
    ("regexp", "Regular expressions"),
    ("stats", "Math statistics"),
    ("text", "String functions and Unicode"),
    ("time", "High-precision date/time"),
    ("uuid", "Universally Unique IDentifiers"),
    ("vsv", "CSV files as virtual tables"),
];

/// Archive name, folder, extension, and registry id per default platform.
const DEFAULT_PLATFORMS: &[(&str, &str, &str, &str)] = &[
    ("sqlean-linux-arm64.zip", "linux-arm64", "so", "linux/arm64"),
    ("sqlean-linux-x64.zip", "linux-x86", "so", "linux/amd64"),
    ("sqlean-macos-x64.zip", "macos-x86", "dylib", "darwin/amd64"),
    ("sqlean-macos-arm64.zip", "macos-arm64", "dylib", "darwin/arm64"),
    ("sqlean-win-x64.zip", "windows-x64", "dll", "windows/amd64"),
];

/// Rust triple and `zig cc` target per default build target.
const DEFAULT_TARGETS: &[(&str, &str)] = &[
    ("aarch64-unknown-linux-musl", "aarch64-linux-musl"),
    ("x86_64-unknown-linux-musl", "x86_64-linux-musl"),
    ("x86_64-pc-windows-gnu", "x86_64-windows-gnu"),
    ("aarch64-apple-darwin", "aarch64-macos"),
    ("x86_64-apple-darwin", "x86_64-macos"),
];

/// One build target as written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetEntry {
    /// Rust target triple.
    pub triple: String,
    /// Matching `zig cc` target.
    pub zig_target: String,
}

/// Settings for the release-library build pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    /// Library name as cargo emits it (`lib<lib_name>.a`).
    pub lib_name: String,
    /// Seconds to pause between targets.
    pub pause_between_targets_secs: u64,
    /// Ordered build targets.
    pub targets: Vec<TargetEntry>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            lib_name: "prqlc_c".to_owned(),
            pause_between_targets_secs: 0,
            targets: DEFAULT_TARGETS
                .iter()
                .map(|(triple, zig)| TargetEntry {
                    triple: (*triple).to_owned(),
                    zig_target: (*zig).to_owned(),
                })
                .collect(),
        }
    }
}

/// Settings for the publish step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishSection {
    /// Uploader executable, resolved through `PATH` unless absolute.
    pub uploader: String,
    /// Environment variable carrying the secret to the uploader.
    pub secret_env: String,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            uploader: "store-manager".to_owned(),
            secret_env: "ANYQUERY_PASSWORD".to_owned(),
        }
    }
}

/// Time limits, in seconds, for external operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutSection {
    /// `rustup` invocations.
    pub toolchain_secs: u64,
    /// `cargo build` invocations.
    pub build_secs: u64,
    /// Each HTTP request.
    pub http_secs: u64,
    /// Each uploader invocation.
    pub upload_secs: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            toolchain_secs: 600,
            build_secs: 1_800,
            http_secs: 120,
            upload_secs: 600,
        }
    }
}

impl TimeoutSection {
    /// `rustup` timeout.
    #[must_use]
    pub fn toolchain(&self) -> Duration {
        Duration::from_secs(self.toolchain_secs)
    }

    /// `cargo build` timeout.
    #[must_use]
    pub fn build(&self) -> Duration {
        Duration::from_secs(self.build_secs)
    }

    /// HTTP request timeout.
    #[must_use]
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    /// Uploader timeout.
    #[must_use]
    pub fn upload(&self) -> Duration {
        Duration::from_secs(self.upload_secs)
    }
}

/// Retry behaviour for downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSection {
    /// Extra attempts after a transient download failure.
    pub download_retries: u32,
    /// Delay before the first retry, doubled for each further retry.
    pub retry_backoff_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            download_retries: 2,
            retry_backoff_ms: 1_000,
        }
    }
}

/// Raw configuration file layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Upstream release metadata.
    pub release: ReleaseSource,
    /// Components to package.
    pub components: Vec<ComponentSpec>,
    /// Platforms to download.
    pub platforms: Vec<PlatformSpec>,
    /// Cross-build settings.
    pub build: BuildSection,
    /// Publish settings.
    pub publish: PublishSection,
    /// Time limits.
    pub timeouts: TimeoutSection,
    /// Download retry policy.
    pub network: NetworkSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            release: ReleaseSource::default(),
            components: DEFAULT_COMPONENTS
                .iter()
                .map(|(name, description)| ComponentSpec::new(*name, *description))
                .collect(),
            platforms: DEFAULT_PLATFORMS
                .iter()
                .filter_map(|(archive, folder, ext, id)| {
                    PlatformSpec::new(*archive, *folder, *ext, *id).ok()
                })
                .collect(),
            build: BuildSection::default(),
            publish: PublishSection::default(),
            timeouts: TimeoutSection::default(),
            network: NetworkSection::default(),
        }
    }
}

/// Validated configuration used by the pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerConfig {
    /// Upstream release metadata.
    pub release: ReleaseSource,
    /// Components to package, in manifest and upload order.
    pub components: Vec<ComponentSpec>,
    /// Platforms to download, in manifest order.
    pub platforms: PlatformList,
    /// Library name for the cross build.
    pub lib_name: String,
    /// Cross-build target matrix.
    pub targets: TargetMatrix,
    /// Pause between cross-build targets.
    pub pause_between_targets: Duration,
    /// Publish settings.
    pub publish: PublishSection,
    /// Time limits.
    pub timeouts: TimeoutSection,
    /// Download retry policy.
    pub network: NetworkSection,
}

impl PackagerConfig {
    /// Return the compiled-in configuration.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in tables are inconsistent.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::try_from(ConfigFile::default())
    }

    /// Load configuration from `path`, or the defaults when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`], [`ConfigError::Parse`], or a
    /// validation error.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Self::defaults();
        };
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    /// Parse configuration from TOML `contents`; `path` is used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or a validation error.
    pub fn parse(path: &Utf8Path, contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::try_from(file)
    }

    /// Replace the release version, e.g. from a command-line override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `version` is blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::config::PackagerConfig;
    ///
    /// let config = PackagerConfig::defaults()?.with_release_version("0.27.1")?;
    /// assert_eq!(config.release.version, "0.27.1");
    /// assert!(PackagerConfig::defaults()?.with_release_version(" ").is_err());
    /// # Ok::<(), native_packager::config::ConfigError>(())
    /// ```
    pub fn with_release_version(mut self, version: impl Into<String>) -> Result<Self, ConfigError> {
        let version = version.into();
        require("release.version", &version)?;
        self.release.version = version;
        Ok(self)
    }
}

impl TryFrom<ConfigFile> for PackagerConfig {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        validate_release(&file.release)?;
        validate_components(&file.components)?;
        require("build.lib_name", &file.build.lib_name)?;
        require("publish.uploader", &file.publish.uploader)?;
        require("publish.secret_env", &file.publish.secret_env)?;

        let platforms = PlatformList::new(file.platforms)?;
        let targets = file
            .build
            .targets
            .into_iter()
            .map(|entry| TargetSpec::new(entry.triple, entry.zig_target))
            .collect::<Result<Vec<_>, _>>()?;
        let targets = TargetMatrix::new(targets)?;

        Ok(Self {
            release: file.release,
            components: file.components,
            platforms,
            lib_name: file.build.lib_name,
            targets,
            pause_between_targets: Duration::from_secs(file.build.pause_between_targets_secs),
            publish: file.publish,
            timeouts: file.timeouts,
            network: file.network,
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(())
}

fn validate_release(release: &ReleaseSource) -> Result<(), ConfigError> {
    require("release.version", &release.version)?;
    require("release.download_url_template", &release.download_url_template)?;
    if !release.download_url_template.contains("{archive}") {
        return Err(ConfigError::Invalid {
            field: "release.download_url_template",
            reason: "must contain the {archive} placeholder".to_owned(),
        });
    }
    Ok(())
}

fn validate_components(components: &[ComponentSpec]) -> Result<(), ConfigError> {
    if components.is_empty() {
        return Err(ConfigError::Invalid {
            field: "components",
            reason: "at least one component is required".to_owned(),
        });
    }
    let mut seen = HashSet::new();
    for component in components {
        let valid = !component.name.is_empty()
            && component
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigError::Invalid {
                field: "components.name",
                reason: format!("\"{}\" is not a valid component name", component.name),
            });
        }
        if !seen.insert(component.name.as_str()) {
            return Err(ConfigError::Invalid {
                field: "components.name",
                reason: format!("duplicate component \"{}\"", component.name),
            });
        }
    }
    Ok(())
}
