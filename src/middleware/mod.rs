//! Memory middleware for chat pipelines.
//!
//! [`MemoryMiddleware`] is the main entry point of this crate. It sits
//! around a chat completion call:
//!
//! - [`before_chat`](MemoryMiddleware::before_chat) retrieves memories
//!   relevant to the incoming messages and injects them as context
//! - [`after_chat`](MemoryMiddleware::after_chat) persists the finished
//!   conversation so new memories can be extracted from it
//! - [`wrap_stream`](MemoryMiddleware::wrap_stream) does the same for
//!   streaming responses, persisting once the stream ends
//!
//! All entry points degrade on remote failure: they log a warning and
//! return an empty context or a failed receipt instead of an error. A chat
//! pipeline must keep answering even when its memory is unreachable.
//! Configuration problems, in contrast, surface immediately from
//! [`MemoryMiddleware::new`].
//!
//! # Example
//!
//! ```ignore
//! use mnemon::{ChatMessage, ChatOptions, MemoryConfig, MemoryMiddleware, StoreOptions};
//!
//! let memory = MemoryMiddleware::new(MemoryConfig::from_env()?)?;
//!
//! let messages = vec![ChatMessage::user("What should I cook tonight?")];
//! let enhanced = memory
//!     .before_chat(&messages, ChatOptions::new().with_user_id("user-42"))
//!     .await;
//!
//! // ... run the chat completion with enhanced.messages ...
//!
//! let receipt = memory
//!     .after_chat(&messages, &response_text, StoreOptions::new().with_user_id("user-42"))
//!     .await;
//! ```

use std::sync::Arc;

use futures::Stream;

use crate::client::{MemoryApi, MemoryService};
use crate::config::MemoryConfig;
use crate::context;
use crate::identity::{resolve_user, IdentityExtractor, RequestContext};
use crate::registry::ClientRegistry;
use crate::stream::{DeltaExtractor, MemoryStream};
use crate::types::{
    ChatMessage, EnhancedChat, Memory, Result, RetrievedContext, StoreReceipt,
};

// ============= Call Options =============

/// Per-call options for [`before_chat`](MemoryMiddleware::before_chat) and
/// [`get_context`](MemoryMiddleware::get_context).
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Explicit user id, overriding extractor and default.
    pub user_id: Option<String>,
    /// Explicit retrieval query, overriding the last user message.
    pub query: Option<String>,
    /// Request context handed to the identity extractor.
    pub request: Option<RequestContext>,
}

impl ChatOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user id for this call.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the retrieval query for this call.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Attaches request context for the identity extractor.
    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }
}

/// Per-call options for the persisting operations,
/// [`after_chat`](MemoryMiddleware::after_chat),
/// [`wrap_stream`](MemoryMiddleware::wrap_stream), and
/// [`store`](MemoryMiddleware::store).
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Explicit user id, overriding extractor and default.
    pub user_id: Option<String>,
    /// Request context handed to the identity extractor.
    pub request: Option<RequestContext>,
    /// Arbitrary metadata stored with whatever gets persisted.
    pub metadata: Option<serde_json::Value>,
}

impl StoreOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user id for this call.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attaches request context for the identity extractor.
    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }

    /// Attaches metadata to the stored memory.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// ============= Middleware =============

/// Memory augmentation middleware. Cheap to clone; clones share the client,
/// the handle registry, and the extractor.
#[derive(Clone)]
pub struct MemoryMiddleware {
    config: Arc<MemoryConfig>,
    registry: Arc<ClientRegistry>,
    extractor: Option<Arc<dyn IdentityExtractor>>,
}

impl MemoryMiddleware {
    /// Creates middleware backed by the hosted service over HTTP.
    ///
    /// Fails fast on invalid configuration.
    pub fn new(config: MemoryConfig) -> Result<Self> {
        let api = MemoryApi::new(&config)?;
        Self::with_service(config, Arc::new(api))
    }

    /// Creates middleware over a caller-supplied service implementation.
    ///
    /// This is the seam for tests and for alternative transports.
    pub fn with_service(config: MemoryConfig, service: Arc<dyn MemoryService>) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(ClientRegistry::new(service, &config));

        Ok(Self {
            config: Arc::new(config),
            registry,
            extractor: None,
        })
    }

    /// Installs an identity extractor consulted when no explicit user id is given.
    pub fn with_extractor(mut self, extractor: Arc<dyn IdentityExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// The configuration this middleware was built with.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    async fn resolve(&self, explicit: Option<&str>, request: Option<&RequestContext>) -> String {
        resolve_user(
            explicit,
            request,
            self.extractor.as_deref(),
            &self.config.default_user_id,
        )
        .await
    }

    /// Retrieves relevant memories and injects them into the messages.
    ///
    /// The query is the explicit override when given, otherwise the content
    /// of the most recent user message. Without a query no retrieval
    /// happens. Retrieval failures degrade to an empty context.
    ///
    /// The input slice is never mutated; the returned
    /// [`EnhancedChat::messages`] is a copy with the context injected into
    /// the system message (or with a new system message prepended). When
    /// system message injection is disabled the copy is unchanged and
    /// callers can place [`EnhancedChat::context`] themselves.
    pub async fn before_chat(&self, messages: &[ChatMessage], options: ChatOptions) -> EnhancedChat {
        let user_id = self
            .resolve(options.user_id.as_deref(), options.request.as_ref())
            .await;
        let handle = self.registry.handle_for(&user_id);

        let memories = match context::select_query(options.query.as_deref(), messages) {
            Some(query) => match handle.search(query).await {
                Ok(facts) => facts,
                Err(e) => {
                    tracing::warn!(
                        "Memory search failed for user '{}', continuing without context: {}",
                        user_id,
                        e
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let block = context::build_context_block(
            &self.config.context_banner,
            &memories,
            handle.max_context_tokens(),
        );

        let enhanced_messages = if self.config.inject_system_message {
            context::inject_context(messages, &block)
        } else {
            messages.to_vec()
        };

        EnhancedChat {
            context: block,
            memories,
            messages: enhanced_messages,
            user_id,
        }
    }

    /// Persists a finished conversation for memory extraction.
    ///
    /// The stored record is the user and assistant turns of `messages` in
    /// order, with `response_text` appended as the final assistant turn.
    /// With auto-store disabled this returns a successful receipt without
    /// touching the service. Failures come back in the receipt, never as a
    /// panic or error.
    pub async fn after_chat(
        &self,
        messages: &[ChatMessage],
        response_text: &str,
        options: StoreOptions,
    ) -> StoreReceipt {
        if !self.config.auto_store {
            return StoreReceipt::skipped();
        }

        let user_id = self
            .resolve(options.user_id.as_deref(), options.request.as_ref())
            .await;

        let record = context::conversation_record(messages, response_text);
        if record.is_empty() {
            return StoreReceipt::skipped();
        }

        let handle = self.registry.handle_for(&user_id);
        match handle.store_conversation(&record, options.metadata).await {
            Ok(memories) => {
                tracing::debug!(
                    "Stored conversation for user '{}', extracted {} memories",
                    user_id,
                    memories.len()
                );
                StoreReceipt::ok(memories)
            }
            Err(e) => {
                tracing::warn!("Failed to store conversation for user '{}': {}", user_id, e);
                StoreReceipt::failed(e.to_string())
            }
        }
    }

    /// Retrieves context for an ad-hoc query without touching any messages.
    ///
    /// Degrades to an empty context on failure, like
    /// [`before_chat`](Self::before_chat). A blank query short-circuits.
    pub async fn get_context(&self, query: &str, options: ChatOptions) -> RetrievedContext {
        if query.is_empty() {
            return RetrievedContext::empty();
        }

        let user_id = self
            .resolve(options.user_id.as_deref(), options.request.as_ref())
            .await;
        let handle = self.registry.handle_for(&user_id);

        match handle.search(query).await {
            Ok(memories) => {
                let block = context::build_context_block(
                    &self.config.context_banner,
                    &memories,
                    handle.max_context_tokens(),
                );
                RetrievedContext {
                    context: block,
                    memories,
                }
            }
            Err(e) => {
                tracing::warn!("Memory search failed for user '{}': {}", user_id, e);
                RetrievedContext::empty()
            }
        }
    }

    /// Stores one piece of content directly.
    ///
    /// Returns the created memory, or `None` when the service rejected the
    /// content as not memorable or the call failed (failures are logged).
    pub async fn store(&self, content: &str, options: StoreOptions) -> Option<Memory> {
        let user_id = self
            .resolve(options.user_id.as_deref(), options.request.as_ref())
            .await;
        let handle = self.registry.handle_for(&user_id);

        match handle.store_content(content, options.metadata).await {
            Ok(memory) => memory,
            Err(e) => {
                tracing::warn!("Failed to store memory for user '{}': {}", user_id, e);
                None
            }
        }
    }

    /// Wraps a streaming chat response so the assistant text is accumulated
    /// while chunks pass through untouched, and the conversation is
    /// persisted exactly once when the stream ends for any reason.
    ///
    /// `extractor` pulls the text delta out of each chunk;
    /// [`json_delta`](crate::stream::json_delta) handles OpenAI-style JSON
    /// chunks. Await [`MemoryStream::completion`] for the resulting
    /// [`StoreReceipt`].
    pub fn wrap_stream<S, C, E, X>(
        &self,
        stream: S,
        messages: &[ChatMessage],
        options: StoreOptions,
        extractor: X,
    ) -> MemoryStream<S, X>
    where
        S: Stream<Item = std::result::Result<C, E>> + Unpin,
        X: DeltaExtractor<C>,
    {
        MemoryStream::new(stream, self.clone(), messages.to_vec(), options, extractor)
    }

    /// Number of per-user handles currently cached.
    pub fn cached_users(&self) -> usize {
        self.registry.len()
    }
}
