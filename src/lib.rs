//! mp4press - batch MP4 compression with thumbnail extraction
//!
//! This library crate exposes the CLI's config loading and console
//! reporting for integration testing.

pub mod config;
pub mod report;
