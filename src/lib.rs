//! # Mnemon Client
//!
//! Memory augmentation middleware for chat applications, backed by the
//! Mnemon memory service. The middleware retrieves what the service knows
//! about a user before a chat completion runs, injects it as context, and
//! persists the finished conversation afterwards so new memories can be
//! extracted from it. Streaming responses are supported through a
//! transparent stream wrapper.
//!
//! ## Overview
//!
//! The crate can be used at two levels:
//!
//! 1. **As middleware** - wrap chat calls with [`MemoryMiddleware`]
//! 2. **As a plain API client** - talk to the service with [`MemoryApi`]
//!
//! Remote failures never break the chat pipeline: middleware entry points
//! degrade to an empty context or a failed [`StoreReceipt`] and log a
//! warning. Configuration errors fail fast at construction.
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mnemon-client = "0.3"
//! ```
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use mnemon::{ChatMessage, ChatOptions, MemoryConfig, MemoryMiddleware, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let memory = MemoryMiddleware::new(MemoryConfig::from_env()?)?;
//!
//!     let messages = vec![ChatMessage::user("What's my favorite color?")];
//!
//!     // Retrieve and inject memory context.
//!     let opts = ChatOptions::new().with_user_id("user-42");
//!     let enhanced = memory.before_chat(&messages, opts).await;
//!
//!     // ... run the chat completion with enhanced.messages ...
//!     let response_text = "Your favorite color is blue.";
//!
//!     // Persist the conversation for memory extraction.
//!     let store = StoreOptions::new().with_user_id("user-42");
//!     let receipt = memory.after_chat(&messages, response_text, store).await;
//!     println!("stored: {}", receipt.success);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Streaming
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use mnemon::stream::json_delta;
//!
//! let mut stream = memory.wrap_stream(upstream, &messages, store, json_delta);
//! let completion = stream.completion();
//!
//! while let Some(chunk) = stream.next().await {
//!     // forward the chunk to the client untouched
//! }
//! drop(stream);
//!
//! let receipt = completion.await;
//! ```
//!
//! ## Modules
//!
//! - [`middleware`] - The main entry point wrapping chat calls
//! - [`client`] - Service trait and REST API client
//! - [`stream`] - Stream observation for streaming responses
//! - [`context`] - Pure context assembly and injection helpers
//! - [`identity`] - User id resolution and extractors
//! - [`registry`] - Per-user client handle cache
//! - [`config`] - Construction-time configuration
//! - [`types`] - Common types and error handling
//!
//! ## Architecture
//!
//! [`MemoryMiddleware`] resolves a user id per call (explicit override,
//! then the configured [`IdentityExtractor`], then the default), fetches a
//! per-user [`ClientHandle`](registry::ClientHandle) from a bounded LRU
//! registry, and drives the [`MemoryService`] trait through it. Production
//! traffic goes through [`MemoryApi`] over HTTPS; tests substitute the
//! service with in-memory stubs.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Memory service clients and abstractions.
pub mod client;
/// Construction-time configuration.
pub mod config;
/// Context assembly and injection helpers.
pub mod context;
/// User identity resolution.
pub mod identity;
/// The memory middleware wrapping chat calls.
pub mod middleware;
/// Per-user client handle cache.
pub mod registry;
/// Stream observation for streaming chat responses.
pub mod stream;
/// Core types (messages, memories, receipts, errors).
pub mod types;

// Re-export commonly used types
pub use client::{MemoryApi, MemoryService};
pub use config::MemoryConfig;
pub use identity::{HeaderExtractor, IdentityExtractor, RequestContext};
pub use middleware::{ChatOptions, MemoryMiddleware, StoreOptions};
pub use stream::{DeltaExtractor, MemoryStream, StoreCompletion};
pub use types::{
    ChatMessage, EnhancedChat, Fact, Memory, MemoryError, Result, RetrievedContext, Role,
    StoreReceipt,
};
