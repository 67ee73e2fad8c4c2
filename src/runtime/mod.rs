//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the environment and
//! the file system, enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `env` - Environment variables
//! - `fs` - File reads and glob matching

mod env;
mod fs;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    /// Snapshot of the process environment, sorted by name.
    fn env_vars(&self) -> BTreeMap<String, String>;

    // File System
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Files matching a glob pattern, in the order the matcher yields them.
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_vars(&self) -> BTreeMap<String, String> {
        self.env_vars_impl()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        self.glob_impl(pattern)
    }
}
