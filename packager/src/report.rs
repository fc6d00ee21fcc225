//! Per-unit outcome records.
//!
//! Fetching and publishing isolate failures per platform and per component
//! respectively. The records here collect those outcomes so a run can report
//! every failure at once, and [`RunReport`] serialises the whole run for
//! `--json` output.

use crate::error::UploadFailureKind;
use serde::Serialize;

/// A platform whose archive could not be fetched or split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    /// Folder name of the platform.
    pub platform: String,
    /// Rendered error.
    pub reason: String,
}

impl FetchFailure {
    /// Join failures into a single `platform: reason` list.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::report::FetchFailure;
    ///
    /// let failures = [
    ///     FetchFailure { platform: "linux-x86".into(), reason: "HTTP 500".into() },
    ///     FetchFailure { platform: "windows-x64".into(), reason: "not found".into() },
    /// ];
    /// assert_eq!(
    ///     FetchFailure::summarise(&failures),
    ///     "linux-x86: HTTP 500; windows-x64: not found"
    /// );
    /// ```
    #[must_use]
    pub fn summarise(failures: &[Self]) -> String {
        failures
            .iter()
            .map(|f| format!("{}: {}", f.platform, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A component whose upload failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    /// Registry package name.
    pub package: String,
    /// Failure classification.
    pub kind: UploadFailureKind,
    /// Uploader output or description.
    pub message: String,
}

impl UploadFailure {
    /// Join failures into a single `package (kind)` list.
    #[must_use]
    pub fn summarise(failures: &[Self]) -> String {
        failures
            .iter()
            .map(|f| format!("{} ({})", f.package, f.kind))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// What happened to one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ComponentOutcome {
    /// Manifest written; not uploaded.
    Packaged,
    /// Manifest written and uploaded.
    Published,
    /// No platform files were found.
    Skipped,
    /// Upload failed.
    Failed {
        /// Rendered failure.
        reason: String,
    },
    /// Not attempted because an earlier upload failed.
    NotAttempted,
}

/// Outcome record for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentReport {
    /// Component name.
    pub component: String,
    /// Registry platforms with a file, in manifest order.
    pub platforms: Vec<String>,
    /// Result for this component.
    #[serde(flatten)]
    pub outcome: ComponentOutcome,
}

/// Serialisable summary of a packaging or publishing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Release version processed.
    pub version: String,
    /// Platforms skipped because their archive was missing.
    pub skipped_platforms: Vec<String>,
    /// Per-component outcomes in configuration order.
    pub components: Vec<ComponentReport>,
}

impl RunReport {
    /// Create an empty report for `version`.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    /// Components that ended in `outcome`.
    pub fn with_outcome<'a>(
        &'a self,
        outcome: &'a ComponentOutcome,
    ) -> impl Iterator<Item = &'a ComponentReport> + 'a {
        self.components.iter().filter(move |c| &c.outcome == outcome)
    }

    /// Render the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_summary_names_kind() {
        let failures = [UploadFailure {
            package: "sqlean-math".to_owned(),
            kind: UploadFailureKind::AuthFailure,
            message: "denied".to_owned(),
        }];
        assert_eq!(
            UploadFailure::summarise(&failures),
            "sqlean-math (authentication failure)"
        );
    }

    #[test]
    fn report_json_flattens_outcome() {
        let mut report = RunReport::new("0.28.0");
        report.components.push(ComponentReport {
            component: "math".to_owned(),
            platforms: vec!["linux/arm64".to_owned()],
            outcome: ComponentOutcome::Failed {
                reason: "boom".to_owned(),
            },
        });
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("serialise")).expect("parse");
        assert_eq!(json["version"], "0.28.0");
        assert_eq!(json["components"][0]["status"], "failed");
        assert_eq!(json["components"][0]["reason"], "boom");
        assert_eq!(json["components"][0]["platforms"][0], "linux/arm64");
    }

    #[test]
    fn with_outcome_filters_components() {
        let mut report = RunReport::new("1");
        for (name, outcome) in [
            ("a", ComponentOutcome::Skipped),
            ("b", ComponentOutcome::Published),
            ("c", ComponentOutcome::Skipped),
        ] {
            report.components.push(ComponentReport {
                component: name.to_owned(),
                platforms: Vec::new(),
                outcome,
            });
        }
        let skipped: Vec<_> = report
            .with_outcome(&ComponentOutcome::Skipped)
            .map(|c| c.component.as_str())
            .collect();
        assert_eq!(skipped, ["a", "c"]);
    }
}
