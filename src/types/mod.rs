//! Core types shared across the crate: chat messages, memory records,
//! middleware results, and the crate-wide error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============= Chat Types =============

/// Role of a chat message, serialized lowercase to match common chat APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// A human turn.
    User,
    /// A model turn.
    Assistant,
    /// A tool result turn.
    Tool,
}

/// A single chat message as it flows through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who produced the message.
    pub role: Role,
    /// The message text.
    pub content: String,
    /// Optional participant name, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }
}

// ============= Memory Types =============

/// One retrieved memory hit, as returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// The remembered text.
    pub text: String,
    /// Identifier of the backing memory record, when the service exposes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
    /// When the backing memory was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Similarity to the query in `[0, 1]`, higher is closer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl Fact {
    /// Creates a fact carrying only text, for tests and manual assembly.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            memory_id: None,
            timestamp: None,
            similarity: None,
        }
    }
}

/// A stored memory record as the service returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique record identifier.
    pub id: String,
    /// The remembered text.
    pub content: String,
    /// Owner of the memory.
    pub user_id: String,
    /// Arbitrary metadata the record was stored with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// When the record was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ============= Middleware Results =============

/// Result of a standalone context retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Assembled context block, empty when nothing was retrieved.
    pub context: String,
    /// The facts behind the block, most relevant first.
    pub memories: Vec<Fact>,
}

impl RetrievedContext {
    /// An empty retrieval, used on the degraded path.
    pub fn empty() -> Self {
        Self {
            context: String::new(),
            memories: Vec::new(),
        }
    }
}

/// Result of [`before_chat`](crate::middleware::MemoryMiddleware::before_chat):
/// the retrieved context plus the message list with that context injected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedChat {
    /// Assembled context block, empty when retrieval found nothing or failed.
    pub context: String,
    /// The facts behind the block, most relevant first.
    pub memories: Vec<Fact>,
    /// Copy of the input messages with the context injected.
    pub messages: Vec<ChatMessage>,
    /// The user id the request was resolved to.
    pub user_id: String,
}

/// Outcome of a persistence attempt. Failures are reported here rather than
/// raised, so a chat pipeline never breaks on a memory hiccup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreReceipt {
    /// Whether the conversation was accepted (or storage was intentionally skipped).
    pub success: bool,
    /// Memories the service extracted from the conversation.
    #[serde(default)]
    pub memories: Vec<Memory>,
    /// Failure description when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreReceipt {
    /// A successful store with the extracted memories.
    pub fn ok(memories: Vec<Memory>) -> Self {
        Self {
            success: true,
            memories,
            error: None,
        }
    }

    /// Storage was disabled or there was nothing to store. Counts as success.
    pub fn skipped() -> Self {
        Self {
            success: true,
            memories: Vec::new(),
            error: None,
        }
    }

    /// A failed store with the reason.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            memories: Vec::new(),
            error: Some(error.into()),
        }
    }
}

// ============= Error Types =============

/// Errors produced by the memory client.
///
/// Middleware entry points never surface these to callers; they degrade and
/// log instead. The error type is visible on the [`MemoryService`]
/// trait and the HTTP client, where callers want to branch on failure.
///
/// [`MemoryService`]: crate::client::MemoryService
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Invalid construction-time configuration. Raised eagerly, never at call time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request never produced an HTTP response (connect, TLS, timeout, body IO).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Error message from the response body, or the status line.
        message: String,
    },

    /// The service answered 2xx with a body this client could not decode.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MemoryError>;
