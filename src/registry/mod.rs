//! Per-user client handles.
//!
//! Middleware operations act through a [`ClientHandle`] scoped to one user
//! id, with the configured retrieval limits baked in. Handles are cheap
//! stateless delegators over the shared [`MemoryService`], cached per user
//! in a bounded LRU so hot users skip re-construction.
//!
//! The cache lock is held across lookup and insert, so concurrent requests
//! for a cold user id build one handle and share it. Eviction only means a
//! later request rebuilds one; an evicted handle stays usable, since
//! handles hold no state of their own.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::client::MemoryService;
use crate::config::MemoryConfig;
use crate::types::{ChatMessage, Fact, Memory, Result};

// ============= Client Handle =============

/// A user-scoped view of the memory service.
pub struct ClientHandle {
    user_id: String,
    max_memories: usize,
    max_context_tokens: usize,
    service: Arc<dyn MemoryService>,
}

impl ClientHandle {
    fn new(user_id: String, config: &RegistryLimits, service: Arc<dyn MemoryService>) -> Self {
        Self {
            user_id,
            max_memories: config.max_memories,
            max_context_tokens: config.max_context_tokens,
            service,
        }
    }

    /// The user id this handle is scoped to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Token budget for context assembled from this handle's results.
    pub fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    /// Search this user's memories, capped at the configured limit.
    pub async fn search(&self, query: &str) -> Result<Vec<Fact>> {
        self.service
            .search(&self.user_id, query, self.max_memories)
            .await
    }

    /// Submit a finished conversation for extraction.
    pub async fn store_conversation(
        &self,
        turns: &[ChatMessage],
        metadata: Option<serde_json::Value>,
    ) -> Result<Vec<Memory>> {
        self.service
            .extract_from_conversation(&self.user_id, turns, metadata)
            .await
    }

    /// Store one piece of content directly.
    pub async fn store_content(
        &self,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<Memory>> {
        self.service.store(&self.user_id, content, metadata).await
    }
}

// ============= Registry =============

#[derive(Debug, Clone, Copy)]
struct RegistryLimits {
    max_memories: usize,
    max_context_tokens: usize,
}

/// Bounded cache of per-user [`ClientHandle`]s.
pub struct ClientRegistry {
    service: Arc<dyn MemoryService>,
    limits: RegistryLimits,
    // Mutex because LruCache reorders entries even on reads.
    handles: Mutex<LruCache<String, Arc<ClientHandle>>>,
}

impl ClientRegistry {
    /// Creates a registry over the given service, sized from the config.
    pub fn new(service: Arc<dyn MemoryService>, config: &MemoryConfig) -> Self {
        let capacity = NonZeroUsize::new(config.registry_capacity)
            .unwrap_or_else(|| NonZeroUsize::new(256).unwrap());

        Self {
            service,
            limits: RegistryLimits {
                max_memories: config.max_memories,
                max_context_tokens: config.max_context_tokens,
            },
            handles: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached handle for a user, creating it on first use.
    pub fn handle_for(&self, user_id: &str) -> Arc<ClientHandle> {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(user_id) {
            return Arc::clone(handle);
        }

        let handle = Arc::new(ClientHandle::new(
            user_id.to_string(),
            &self.limits,
            Arc::clone(&self.service),
        ));
        handles.put(user_id.to_string(), Arc::clone(&handle));
        handle
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether the registry holds no handles.
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Whether a handle is cached for the given user.
    pub fn contains(&self, user_id: &str) -> bool {
        self.handles.lock().contains(user_id)
    }

    /// Drops all cached handles.
    pub fn clear(&self) {
        self.handles.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryError;
    use async_trait::async_trait;

    struct NullService;

    #[async_trait]
    impl MemoryService for NullService {
        async fn search(&self, _user_id: &str, _query: &str, limit: usize) -> Result<Vec<Fact>> {
            Ok((0..limit).map(|i| Fact::new(format!("fact {}", i))).collect())
        }

        async fn extract_from_conversation(
            &self,
            _user_id: &str,
            _turns: &[ChatMessage],
            _metadata: Option<serde_json::Value>,
        ) -> Result<Vec<Memory>> {
            Ok(Vec::new())
        }

        async fn store(
            &self,
            _user_id: &str,
            _content: &str,
            _metadata: Option<serde_json::Value>,
        ) -> Result<Option<Memory>> {
            Err(MemoryError::Transport("unreachable".to_string()))
        }
    }

    fn registry_with_capacity(capacity: usize) -> ClientRegistry {
        let config = MemoryConfig::new("key")
            .with_registry_capacity(capacity)
            .with_max_memories(2);
        ClientRegistry::new(Arc::new(NullService), &config)
    }

    #[test]
    fn test_handle_is_reused_per_user() {
        let registry = registry_with_capacity(8);

        let first = registry.handle_for("alice");
        let second = registry.handle_for("alice");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        registry.handle_for("bob");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("alice"));
        assert!(registry.contains("bob"));
    }

    #[test]
    fn test_concurrent_cold_lookups_share_one_handle() {
        let registry = Arc::new(registry_with_capacity(8));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.handle_for("alice"))
            })
            .collect();

        let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handle_carries_configured_budget() {
        let config = MemoryConfig::new("key")
            .with_max_context_tokens(64)
            .with_registry_capacity(4);
        let registry = ClientRegistry::new(Arc::new(NullService), &config);

        assert_eq!(registry.handle_for("alice").max_context_tokens(), 64);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let registry = registry_with_capacity(2);

        registry.handle_for("a");
        registry.handle_for("b");
        registry.handle_for("a"); // refresh a
        registry.handle_for("c"); // evicts b

        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert!(registry.contains("c"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_evicted_handle_stays_usable() {
        let registry = registry_with_capacity(1);

        let alice = registry.handle_for("alice");
        registry.handle_for("bob");
        assert!(!registry.contains("alice"));

        // The evicted handle still delegates to the shared service.
        assert_eq!(alice.user_id(), "alice");
    }

    #[tokio::test]
    async fn test_handle_applies_configured_limit() {
        let registry = registry_with_capacity(4);
        let handle = registry.handle_for("alice");

        let facts = handle.search("anything").await.unwrap();
        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn test_clear() {
        let registry = registry_with_capacity(4);
        registry.handle_for("a");
        registry.handle_for("b");
        registry.clear();
        assert!(registry.is_empty());
    }
}
