//! Atomically swappable registry handle.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Registry, RegistryBuilder};
use crate::error::SchemaError;
use crate::schema::SchemaDeclaration;

/// Holds the currently published [`Registry`] snapshot.
///
/// Readers take an `Arc` and keep it for the whole query, so a reload never
/// changes the snapshot an in-flight query is using.
#[derive(Debug)]
pub struct SharedRegistry {
    current: RwLock<Arc<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Build and publish the first snapshot.
    pub fn from_declaration(declaration: &SchemaDeclaration) -> Result<Self, SchemaError> {
        Ok(Self::new(Registry::register(declaration)?))
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<Registry> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> u64 {
        self.current.read().version()
    }

    /// Build a new snapshot and publish it.
    ///
    /// On failure the previous snapshot stays published.
    pub fn reload(&self, declaration: &SchemaDeclaration) -> Result<Arc<Registry>, SchemaError> {
        let next_version = self.version() + 1;
        let registry = match RegistryBuilder::new().version(next_version).build(declaration) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(error = %e, version = self.version(), "Registry reload failed, keeping current snapshot");
                return Err(e);
            }
        };
        Ok(self.publish(registry))
    }

    /// Publish an already-built registry, stamping the next version.
    pub fn publish(&self, registry: Registry) -> Arc<Registry> {
        let mut current = self.current.write();
        let version = current.version() + 1;
        let snapshot = Arc::new(registry.with_version(version));
        *current = Arc::clone(&snapshot);
        info!(version, "Published registry snapshot");
        snapshot
    }
}
