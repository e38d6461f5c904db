// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path utilities for the on-disk storage layout.

use std::path::{Path, PathBuf};

/// Default base directory for persistent storage.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the security database.
    pub fn security_dir(&self) -> PathBuf {
        self.root.join("security")
    }

    /// Path to the redb security database file.
    pub fn security_db(&self) -> PathBuf {
        self.security_dir().join("security.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_root_is_data() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
        assert_eq!(
            paths.security_db(),
            PathBuf::from("/data/security/security.redb")
        );
    }

    #[test]
    fn custom_root() {
        let paths = StoragePaths::new("/tmp/wallet-guard");
        assert_eq!(
            paths.security_dir(),
            PathBuf::from("/tmp/wallet-guard/security")
        );
    }
}
