//! Common test utilities
//!
//! Helpers for building fake filesystem trees that stand in for mounted
//! ISOs and extracted root filesystems.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch tree rooted in a temporary directory
pub struct TestTree {
    pub dir: TempDir,
}

impl TestTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Root path of the tree
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty file, creating parent directories as needed
    pub fn touch(&self, relative: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, b"").expect("Failed to create file");
        path
    }

    /// Create a file with content, creating parent directories as needed
    pub fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Create a directory, including parents
    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        std::fs::create_dir_all(&path).expect("Failed to create directory");
        path
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}
