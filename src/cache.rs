//! Caches parsed documents by the hash of their source.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::Document;

/// Stores parsed documents keyed by content hash.
///
/// The [`Engine`][crate::Engine] keys documents by the source hash joined
/// with the fingerprint of its tag registry, so engines with different tags
/// can share one cache.
///
/// Documents are immutable, so a cache may be read by many renders at once.
/// Two writers of the same key store equal documents, so the last write can
/// simply win.
pub trait TemplateCache: Send + Sync {
    fn read(&self, hash: &str) -> Option<Arc<Document>>;

    fn write(&self, hash: &str, document: Arc<Document>);

    fn exists(&self, hash: &str) -> bool {
        self.read(hash).is_some()
    }
}

/// An in-memory cache guarded by a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryCache {
    documents: RwLock<HashMap<String, Arc<Document>>>,
}

/// A cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn clear(&self) {
        self.documents.write().clear();
    }
}

impl TemplateCache for MemoryCache {
    fn read(&self, hash: &str) -> Option<Arc<Document>> {
        self.documents.read().get(hash).cloned()
    }

    fn write(&self, hash: &str, document: Arc<Document>) {
        self.documents.write().insert(hash.to_owned(), document);
    }

    fn exists(&self, hash: &str) -> bool {
        self.documents.read().contains_key(hash)
    }
}

impl TemplateCache for NoCache {
    fn read(&self, _: &str) -> Option<Arc<Document>> {
        None
    }

    fn write(&self, _: &str, _: Arc<Document>) {}
}
