//! Mock implementations for testing.
//!
//! This module provides a recording in-memory memory service that can be
//! used across different test files without duplication.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use mnemon::{ChatMessage, Fact, Memory, MemoryError, MemoryService, Result};

/// A recorded call to [`MemoryService::search`].
#[derive(Debug, Clone)]
pub struct SearchCall {
    pub user_id: String,
    pub query: String,
    pub limit: usize,
}

/// A recorded call to [`MemoryService::extract_from_conversation`].
#[derive(Debug, Clone)]
pub struct ExtractCall {
    pub user_id: String,
    pub turns: Vec<ChatMessage>,
    pub metadata: Option<serde_json::Value>,
}

/// A recorded call to [`MemoryService::store`].
#[derive(Debug, Clone)]
pub struct StoreCall {
    pub user_id: String,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
}

/// Recording memory service for testing with configurable responses.
///
/// Every call is recorded so tests can assert on exactly what reached the
/// service. The service can be configured to return specific facts and
/// memories, or to fail every call.
///
/// # Examples
///
/// ```ignore
/// // A service that knows one fact
/// let service = RecordingService::new().with_fact("favorite color is blue");
///
/// // A service where every call fails
/// let service = RecordingService::failing();
/// ```
#[derive(Default)]
pub struct RecordingService {
    facts: Mutex<Vec<Fact>>,
    extracted: Mutex<Vec<Memory>>,
    stored: Mutex<Option<Memory>>,
    should_fail: bool,
    searches: Mutex<Vec<SearchCall>>,
    extractions: Mutex<Vec<ExtractCall>>,
    stores: Mutex<Vec<StoreCall>>,
}

impl RecordingService {
    /// Create a service that answers every call successfully with nothing.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a service where every call returns a transport error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            should_fail: true,
            ..Self::default()
        })
    }

    /// Add a fact returned by subsequent searches.
    pub fn with_fact(self: Arc<Self>, text: &str) -> Arc<Self> {
        self.facts.lock().push(Fact::new(text));
        self
    }

    /// Set the memories returned by subsequent extractions.
    pub fn with_extracted(self: Arc<Self>, memories: Vec<Memory>) -> Arc<Self> {
        *self.extracted.lock() = memories;
        self
    }

    /// Set the memory returned by subsequent direct stores.
    pub fn with_stored(self: Arc<Self>, memory: Memory) -> Arc<Self> {
        *self.stored.lock() = Some(memory);
        self
    }

    /// All recorded search calls.
    pub fn searches(&self) -> Vec<SearchCall> {
        self.searches.lock().clone()
    }

    /// All recorded extraction calls.
    pub fn extractions(&self) -> Vec<ExtractCall> {
        self.extractions.lock().clone()
    }

    /// All recorded direct store calls.
    pub fn stores(&self) -> Vec<StoreCall> {
        self.stores.lock().clone()
    }

    /// Total number of calls that reached the service.
    pub fn total_calls(&self) -> usize {
        self.searches.lock().len() + self.extractions.lock().len() + self.stores.lock().len()
    }
}

#[async_trait]
impl MemoryService for RecordingService {
    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Fact>> {
        self.searches.lock().push(SearchCall {
            user_id: user_id.to_string(),
            query: query.to_string(),
            limit,
        });

        if self.should_fail {
            return Err(MemoryError::Transport("connection refused".to_string()));
        }
        Ok(self.facts.lock().clone())
    }

    async fn extract_from_conversation(
        &self,
        user_id: &str,
        turns: &[ChatMessage],
        metadata: Option<serde_json::Value>,
    ) -> Result<Vec<Memory>> {
        self.extractions.lock().push(ExtractCall {
            user_id: user_id.to_string(),
            turns: turns.to_vec(),
            metadata,
        });

        if self.should_fail {
            return Err(MemoryError::Transport("connection refused".to_string()));
        }
        Ok(self.extracted.lock().clone())
    }

    async fn store(
        &self,
        user_id: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<Memory>> {
        self.stores.lock().push(StoreCall {
            user_id: user_id.to_string(),
            content: content.to_string(),
            metadata,
        });

        if self.should_fail {
            return Err(MemoryError::Transport("connection refused".to_string()));
        }
        Ok(self.stored.lock().clone())
    }
}

/// A memory record with the given id and content, for stub responses.
pub fn memory(id: &str, content: &str) -> Memory {
    Memory {
        id: id.to_string(),
        content: content.to_string(),
        user_id: "test-user".to_string(),
        metadata: None,
        created_at: None,
        updated_at: None,
    }
}
