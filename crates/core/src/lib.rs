//! Core types for the protogen artifact cache.
//!
//! This crate holds the pieces shared by every cache component:
//! - The [`Error`] type and [`Result`] alias used across the workspace
//! - The [`CacheConfig`] surface supplied by the build-rule layer
//!
//! It deliberately contains no I/O; all filesystem access lives in
//! `protogen-cache`.

pub mod config;
mod error;

pub use config::CacheConfig;
pub use error::{Error, Result};
