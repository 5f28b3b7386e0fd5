//! Memory service clients and abstractions.
//!
//! This module provides the seam between the middleware and the wire:
//!
//! - [`MemoryService`] - The trait the middleware is written against
//! - [`MemoryApi`] - Production implementation over the Mnemon REST API
//!
//! # Example
//!
//! ```ignore
//! use mnemon::{MemoryApi, MemoryConfig, MemoryService};
//!
//! let api = MemoryApi::new(&MemoryConfig::from_env()?)?;
//! let facts = api.search("user-42", "favorite color", 5).await?;
//! ```

/// Core memory service trait.
pub mod traits;

/// HTTP client for the Mnemon REST API.
pub mod http;

pub use http::MemoryApi;
pub use traits::MemoryService;
