//! Native packager library.
//!
//! This crate provides the two pipelines behind the `native-packager` CLI:
//! cross-building a static library for a matrix of targets, and turning a
//! prebuilt multi-platform release into per-component registry packages. It
//! can also be consumed programmatically for testing or custom release
//! workflows.
//!
//! # Modules
//!
//! - [`artefact`] - Release archive download, extraction, and splitting
//! - [`builder`] - Cross-build orchestration over the target matrix
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution with timeouts
//! - [`config`] - Release metadata, matrix, and timeout configuration
//! - [`credential`] - Registry credential acquisition
//! - [`error`] - Error types and exit codes
//! - [`logging`] - Diagnostic logging to standard error
//! - [`manifest`] - Per-component manifest synthesis
//! - [`matrix`] - Target and platform descriptors
//! - [`output`] - Progress lines and dry-run descriptions
//! - [`pipeline`] - Packaging and publishing orchestration
//! - [`publisher`] - Registry uploads through the external uploader
//! - [`report`] - Per-unit outcome records
//! - [`toolchain`] - Rust target registration and compiler checks
//! - [`workspace`] - Working directory layout and locking

pub mod artefact;
pub mod builder;
pub mod cli;
pub mod command;
pub mod config;
pub mod credential;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod matrix;
pub mod output;
pub mod pipeline;
pub mod publisher;
pub mod report;
pub mod toolchain;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
