//! Release archive retrieval and splitting.
//!
//! # Sub-modules
//!
//! - [`download`] - Downloader trait, HTTP implementation, and retry policy.
//! - [`extraction`] - Archive extraction with path traversal protection.
//! - [`fetcher`] - Per-platform download and extraction with a bounded pool.
//! - [`splitter`] - Copying platform files into per-component trees.

pub mod download;
pub mod extraction;
pub mod fetcher;
pub mod splitter;
