//! The service abstraction the middleware is built against.
//!
//! [`MemoryService`] covers the three operations the middleware needs from a
//! memory backend. The production implementation is
//! [`MemoryApi`](super::MemoryApi); tests substitute in-memory stubs through
//! [`MemoryMiddleware::with_service`](crate::middleware::MemoryMiddleware::with_service).

use crate::types::{ChatMessage, Fact, Memory, Result};
use async_trait::async_trait;

/// Abstract trait for memory service operations
///
/// Everything above this trait (registry, middleware, stream observer) is
/// transport-agnostic. Implementations decide how and where memories live.
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Search memories relevant to a query, most relevant first.
    ///
    /// `limit` caps the number of returned facts.
    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Fact>>;

    /// Submit a finished conversation for memory extraction.
    ///
    /// `metadata` is stored alongside whatever the service extracts.
    /// Returns the extracted memories, which may be empty when the
    /// conversation contained nothing worth keeping.
    async fn extract_from_conversation(
        &self,
        user_id: &str,
        turns: &[ChatMessage],
        metadata: Option<serde_json::Value>,
    ) -> Result<Vec<Memory>>;

    /// Store a single piece of content directly.
    ///
    /// Returns `None` when the service judged the content not memorable.
    async fn store(
        &self,
        user_id: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<Memory>>;
}
