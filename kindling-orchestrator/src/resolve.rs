//! External reference resolution
//!
//! Reference names that don't match a sibling unit in the group are handed to
//! an external resolver, which may hit disk, a package cache, or the network.
//! Resolution is async so a slow fetch suspends only the requesting unit's
//! coordination task, never a worker thread.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::ResolveError;
use crate::frontend::BinaryHandle;

/// Resolves a reference name to a concrete binary
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<BinaryHandle, ResolveError>;
}

/// Map-backed resolver for embedding hosts and tests
#[derive(Default)]
pub struct MapResolver {
    entries: RwLock<HashMap<String, BinaryHandle>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, handle: BinaryHandle) {
        self.entries.write().insert(name.into(), handle);
    }

    pub fn remove(&self, name: &str) -> Option<BinaryHandle> {
        self.entries.write().remove(name)
    }
}

#[async_trait]
impl ReferenceResolver for MapResolver {
    async fn resolve(&self, name: &str) -> Result<BinaryHandle, ResolveError> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))
    }
}

/// Resolver that knows nothing
///
/// The default for groups whose units only reference each other.
pub struct NullResolver;

#[async_trait]
impl ReferenceResolver for NullResolver {
    async fn resolve(&self, name: &str) -> Result<BinaryHandle, ResolveError> {
        Err(ResolveError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::frontend::BinaryBlob;

    fn handle(name: &str) -> BinaryHandle {
        Arc::new(BinaryBlob {
            name: name.to_string(),
            references: Vec::new(),
            data: Vec::new().into(),
        })
    }

    #[tokio::test]
    async fn test_map_resolver_hit() {
        let resolver = MapResolver::new();
        resolver.insert("std", handle("std"));
        let resolved = resolver.resolve("std").await.unwrap();
        assert_eq!(resolved.name, "std");
    }

    #[tokio::test]
    async fn test_map_resolver_miss() {
        let resolver = MapResolver::new();
        assert!(matches!(
            resolver.resolve("ghost").await,
            Err(ResolveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_null_resolver_always_misses() {
        assert!(NullResolver.resolve("anything").await.is_err());
    }
}
