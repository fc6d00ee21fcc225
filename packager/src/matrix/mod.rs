//! Target and platform matrices shared by both pipelines.
//!
//! - [`target`] - Rust triple to `zig cc` target mapping for cross builds.
//! - [`platform`] - Release archive, folder, extension, and registry id per
//!   packaged platform.
//! - [`error`] - Validation errors for both.

pub mod error;
pub mod platform;
pub mod target;
