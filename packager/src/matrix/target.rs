//! Cross-compilation target matrix.
//!
//! A [`TargetMatrix`] is an ordered list of [`TargetSpec`] values, each
//! pairing a Rust target triple with the `zig cc` target that compiles C
//! code for the same platform. Keeping both identifiers in one value removes
//! any chance of the two lists drifting apart; construction additionally
//! checks that the architecture, operating system, and ABI agree.

use super::error::{MatrixError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Operating system family shared by both naming schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OsFamily {
    Linux,
    Windows,
    MacOs,
    Other(String),
}

/// A Rust target triple paired with its `zig cc` target.
///
/// # Examples
///
/// ```
/// use native_packager::matrix::target::TargetSpec;
///
/// let spec = TargetSpec::new("aarch64-unknown-linux-musl", "aarch64-linux-musl")
///     .expect("aligned target");
/// assert_eq!(spec.artifact_file_name("prqlc_c"), "libprqlc_c-aarch64-unknown-linux-musl.a");
///
/// assert!(TargetSpec::new("x86_64-apple-darwin", "aarch64-macos").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TargetSpec {
    triple: String,
    zig_target: String,
}

impl TargetSpec {
    /// Pair a triple with a cross-compiler target, validating alignment.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidTarget`] for malformed identifiers and
    /// [`MatrixError::MisalignedTarget`] when the two describe different
    /// platforms.
    pub fn new(triple: impl Into<String>, zig_target: impl Into<String>) -> Result<Self> {
        let spec = Self {
            triple: triple.into(),
            zig_target: zig_target.into(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Return the Rust target triple.
    #[must_use]
    pub fn triple(&self) -> &str {
        &self.triple
    }

    /// Return the `zig cc` target.
    #[must_use]
    pub fn zig_target(&self) -> &str {
        &self.zig_target
    }

    /// File name of the static library cargo produces for `lib_name`.
    #[must_use]
    pub fn static_lib_name(&self, lib_name: &str) -> String {
        format!("lib{lib_name}.a")
    }

    /// File name of the renamed artefact, embedding the target triple.
    #[must_use]
    pub fn artifact_file_name(&self, lib_name: &str) -> String {
        format!("lib{lib_name}-{}.a", self.triple)
    }

    fn validate(&self) -> Result<()> {
        let triple_parts = split_identifier(&self.triple, 3, 4)?;
        let zig_parts = split_identifier(&self.zig_target, 2, 3)?;

        let (triple_arch, zig_arch) = (triple_parts[0], zig_parts[0]);
        if triple_arch != zig_arch {
            return Err(self.misaligned(format!(
                "architecture {triple_arch} differs from {zig_arch}"
            )));
        }

        let triple_os = os_from_triple(&triple_parts[1..]);
        let zig_os = os_from_zig(zig_parts[1]);
        if triple_os != zig_os {
            return Err(self.misaligned(format!(
                "operating system {triple_os:?} differs from {zig_os:?}"
            )));
        }

        if let (Some(triple_abi), Some(zig_abi)) = (triple_parts.get(3), zig_parts.get(2))
            && triple_abi != zig_abi
        {
            return Err(self.misaligned(format!("ABI {triple_abi} differs from {zig_abi}")));
        }

        Ok(())
    }

    fn misaligned(&self, reason: String) -> MatrixError {
        MatrixError::MisalignedTarget {
            triple: self.triple.clone(),
            zig_target: self.zig_target.clone(),
            reason,
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (zig: {})", self.triple, self.zig_target)
    }
}

fn split_identifier(value: &str, min: usize, max: usize) -> Result<Vec<&str>> {
    let parts: Vec<&str> = value.split('-').collect();
    let well_formed = (min..=max).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if well_formed {
        Ok(parts)
    } else {
        Err(MatrixError::InvalidTarget {
            value: value.to_owned(),
            reason: format!("expected {min} to {max} dash-separated alphanumeric components"),
        })
    }
}

/// `parts` is the triple without its architecture: vendor, os, and abi.
fn os_from_triple(parts: &[&str]) -> OsFamily {
    if parts.contains(&"darwin") {
        OsFamily::MacOs
    } else if parts.contains(&"windows") {
        OsFamily::Windows
    } else if parts.contains(&"linux") {
        OsFamily::Linux
    } else {
        OsFamily::Other(parts.get(1).copied().unwrap_or_default().to_owned())
    }
}

fn os_from_zig(os: &str) -> OsFamily {
    match os {
        "macos" => OsFamily::MacOs,
        "windows" => OsFamily::Windows,
        "linux" => OsFamily::Linux,
        other => OsFamily::Other(other.to_owned()),
    }
}

/// Ordered, validated list of cross-compilation targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetMatrix {
    targets: Vec<TargetSpec>,
}

impl TargetMatrix {
    /// Build a matrix, rejecting empty lists and duplicate triples.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::Empty`] or [`MatrixError::Duplicate`].
    pub fn new(targets: Vec<TargetSpec>) -> Result<Self> {
        if targets.is_empty() {
            return Err(MatrixError::Empty("target matrix"));
        }
        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target.triple()) {
                return Err(MatrixError::Duplicate {
                    kind: "target triple",
                    value: target.triple().to_owned(),
                });
            }
        }
        Ok(Self { targets })
    }

    /// Iterate over targets in build order.
    pub fn iter(&self) -> std::slice::Iter<'_, TargetSpec> {
        self.targets.iter()
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false for a constructed matrix; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Restrict the matrix to `triples`, keeping matrix order.
    ///
    /// An empty filter returns the full matrix.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::UnknownTarget`] if a requested triple is not
    /// part of the matrix.
    pub fn select(&self, triples: &[String]) -> Result<Self> {
        if triples.is_empty() {
            return Ok(self.clone());
        }
        for requested in triples {
            if !self.targets.iter().any(|t| t.triple() == requested) {
                return Err(MatrixError::UnknownTarget {
                    value: requested.clone(),
                    expected: self.triples().join(", "),
                });
            }
        }
        Self::new(
            self.targets
                .iter()
                .filter(|t| triples.iter().any(|r| r == t.triple()))
                .cloned()
                .collect(),
        )
    }

    /// Return the configured triples in order.
    #[must_use]
    pub fn triples(&self) -> Vec<&str> {
        self.targets.iter().map(TargetSpec::triple).collect()
    }
}

impl<'a> IntoIterator for &'a TargetMatrix {
    type Item = &'a TargetSpec;
    type IntoIter = std::slice::Iter<'a, TargetSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::linux_musl_arm("aarch64-unknown-linux-musl", "aarch64-linux-musl")]
    #[case::linux_musl_x86("x86_64-unknown-linux-musl", "x86_64-linux-musl")]
    #[case::windows_gnu("x86_64-pc-windows-gnu", "x86_64-windows-gnu")]
    #[case::macos_arm("aarch64-apple-darwin", "aarch64-macos")]
    #[case::macos_x86("x86_64-apple-darwin", "x86_64-macos")]
    fn accepts_aligned_pairs(#[case] triple: &str, #[case] zig: &str) {
        let spec = TargetSpec::new(triple, zig).expect("aligned pair");
        assert_eq!(spec.triple(), triple);
        assert_eq!(spec.zig_target(), zig);
    }

    #[rstest]
    #[case::arch("x86_64-apple-darwin", "aarch64-macos")]
    #[case::os("x86_64-unknown-linux-musl", "x86_64-windows-gnu")]
    #[case::abi("x86_64-unknown-linux-musl", "x86_64-linux-gnu")]
    #[case::gnullvm("aarch64-pc-windows-gnullvm", "aarch64-windows-gnu")]
    fn rejects_misaligned_pairs(#[case] triple: &str, #[case] zig: &str) {
        let err = TargetSpec::new(triple, zig).expect_err("misaligned");
        assert!(matches!(err, MatrixError::MisalignedTarget { .. }), "{err:?}");
    }

    #[rstest]
    #[case::empty("", "x86_64-linux-musl")]
    #[case::one_part("x86_64", "x86_64-linux")]
    #[case::bad_char("x86_64-unknown-linux-gnu!", "x86_64-linux-gnu")]
    fn rejects_malformed_identifiers(#[case] triple: &str, #[case] zig: &str) {
        let err = TargetSpec::new(triple, zig).expect_err("malformed");
        assert!(matches!(err, MatrixError::InvalidTarget { .. }));
    }

    #[test]
    fn artifact_name_embeds_triple() {
        let spec = TargetSpec::new("x86_64-pc-windows-gnu", "x86_64-windows-gnu").expect("valid");
        assert_eq!(spec.static_lib_name("prqlc_c"), "libprqlc_c.a");
        assert_eq!(
            spec.artifact_file_name("prqlc_c"),
            "libprqlc_c-x86_64-pc-windows-gnu.a"
        );
    }

    fn two_targets() -> Vec<TargetSpec> {
        vec![
            TargetSpec::new("x86_64-apple-darwin", "x86_64-macos").expect("valid"),
            TargetSpec::new("aarch64-apple-darwin", "aarch64-macos").expect("valid"),
        ]
    }

    #[test]
    fn matrix_rejects_empty_and_duplicates() {
        assert_eq!(
            TargetMatrix::new(Vec::new()),
            Err(MatrixError::Empty("target matrix"))
        );
        let mut targets = two_targets();
        targets.push(targets[0].clone());
        assert!(matches!(
            TargetMatrix::new(targets),
            Err(MatrixError::Duplicate { .. })
        ));
    }

    #[test]
    fn select_keeps_matrix_order() {
        let matrix = TargetMatrix::new(two_targets()).expect("valid");
        let selected = matrix
            .select(&["aarch64-apple-darwin".to_owned(), "x86_64-apple-darwin".to_owned()])
            .expect("known targets");
        assert_eq!(
            selected.triples(),
            vec!["x86_64-apple-darwin", "aarch64-apple-darwin"]
        );
    }

    #[test]
    fn select_rejects_unknown_target() {
        let matrix = TargetMatrix::new(two_targets()).expect("valid");
        let err = matrix
            .select(&["wasm32-unknown-unknown".to_owned()])
            .expect_err("unknown");
        assert!(matches!(err, MatrixError::UnknownTarget { .. }));
    }
}
