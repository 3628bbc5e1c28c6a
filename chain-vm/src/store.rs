//! Package source storage

use crate::{VmError, VmResult};
use chain_core::MemPackage;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Point-in-time copy of a [`PackageStore`]
#[derive(Debug, Clone)]
pub struct PackageSnapshot(BTreeMap<String, MemPackage>);

/// In-memory package store, shared between clones
#[derive(Debug, Clone, Default)]
pub struct PackageStore {
    packages: Arc<RwLock<BTreeMap<String, MemPackage>>>,
}

impl PackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package; its path must be free
    pub fn add_package(&self, pkg: MemPackage) -> VmResult<()> {
        let mut packages = self.packages.write();
        if packages.contains_key(&pkg.path) {
            return Err(VmError::invalid_pkg_path(format!(
                "package already exists: {}",
                pkg.path
            )));
        }
        packages.insert(pkg.path.clone(), pkg);
        Ok(())
    }

    pub fn get_package(&self, path: &str) -> Option<MemPackage> {
        self.packages.read().get(path).cloned()
    }

    pub fn has_package(&self, path: &str) -> bool {
        self.packages.read().contains_key(path)
    }

    /// Paths of all stored packages in order
    pub fn package_paths(&self) -> Vec<String> {
        self.packages.read().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> PackageSnapshot {
        PackageSnapshot(self.packages.read().clone())
    }

    pub fn restore(&self, snapshot: PackageSnapshot) {
        *self.packages.write() = snapshot.0;
    }
}
