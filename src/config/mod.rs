//! Client configuration.
//!
//! All behavior of the middleware is fixed at construction time through
//! [`MemoryConfig`]: credentials, endpoint, retrieval limits, and the
//! injection/persistence switches. Invalid configuration fails fast in
//! [`MemoryMiddleware::new`](crate::middleware::MemoryMiddleware::new);
//! nothing is validated lazily on the request path.
//!
//! # Example
//!
//! ```ignore
//! use mnemon::MemoryConfig;
//!
//! let config = MemoryConfig::new("mn-live-...")
//!     .with_max_memories(8)
//!     .with_auto_store(false);
//! ```
//!
//! Or from the environment (`MNEMON_API_KEY` etc., `.env` supported):
//!
//! ```ignore
//! let config = MemoryConfig::from_env()?;
//! ```

use serde::Deserialize;
use std::env;

use crate::types::{MemoryError, Result};

/// Default endpoint of the hosted service.
pub const DEFAULT_BASE_URL: &str = "https://api.mnemon.dev/v1";

/// Banner line prepended to injected context blocks.
pub const DEFAULT_CONTEXT_BANNER: &str = "Relevant information from previous conversations:";

/// Configuration for [`MemoryMiddleware`](crate::middleware::MemoryMiddleware).
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// API key sent as a bearer token on every request.
    pub api_key: String,

    /// Base URL of the memory service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User id used when no override is given and no extractor matches.
    #[serde(default = "default_user_id")]
    pub default_user_id: String,

    /// Maximum number of facts requested per search.
    #[serde(default = "default_max_memories")]
    pub max_memories: usize,

    /// Token budget for the assembled context block.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Whether finished conversations are persisted automatically.
    #[serde(default = "default_true")]
    pub auto_store: bool,

    /// Whether retrieved context is injected into the system message.
    #[serde(default = "default_true")]
    pub inject_system_message: bool,

    /// Banner line above the injected facts.
    #[serde(default = "default_context_banner")]
    pub context_banner: String,

    /// Capacity of the per-user client handle cache.
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_id() -> String {
    "default".to_string()
}

fn default_max_memories() -> usize {
    5
}

fn default_max_context_tokens() -> usize {
    2000
}

fn default_true() -> bool {
    true
}

fn default_context_banner() -> String {
    DEFAULT_CONTEXT_BANNER.to_string()
}

fn default_registry_capacity() -> usize {
    256
}

impl MemoryConfig {
    /// Creates a configuration with the given API key and defaults everywhere else.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            default_user_id: default_user_id(),
            max_memories: default_max_memories(),
            max_context_tokens: default_max_context_tokens(),
            auto_store: default_true(),
            inject_system_message: default_true(),
            context_banner: default_context_banner(),
            registry_capacity: default_registry_capacity(),
        }
    }

    /// Loads configuration from environment variables, reading `.env` first.
    ///
    /// Recognized variables: `MNEMON_API_KEY` (required), `MNEMON_BASE_URL`,
    /// `MNEMON_DEFAULT_USER_ID`, `MNEMON_MAX_MEMORIES`,
    /// `MNEMON_MAX_CONTEXT_TOKENS`, `MNEMON_AUTO_STORE`,
    /// `MNEMON_INJECT_SYSTEM_MESSAGE`, `MNEMON_CONTEXT_BANNER`,
    /// `MNEMON_REGISTRY_CAPACITY`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("MNEMON_API_KEY").map_err(|_| {
            MemoryError::Configuration("MNEMON_API_KEY is not set".to_string())
        })?;

        Ok(Self {
            api_key,
            base_url: env::var("MNEMON_BASE_URL").unwrap_or_else(|_| default_base_url()),
            default_user_id: env::var("MNEMON_DEFAULT_USER_ID")
                .unwrap_or_else(|_| default_user_id()),
            max_memories: parse_env("MNEMON_MAX_MEMORIES", default_max_memories())?,
            max_context_tokens: parse_env(
                "MNEMON_MAX_CONTEXT_TOKENS",
                default_max_context_tokens(),
            )?,
            auto_store: parse_env("MNEMON_AUTO_STORE", true)?,
            inject_system_message: parse_env("MNEMON_INJECT_SYSTEM_MESSAGE", true)?,
            context_banner: env::var("MNEMON_CONTEXT_BANNER")
                .unwrap_or_else(|_| default_context_banner()),
            registry_capacity: parse_env("MNEMON_REGISTRY_CAPACITY", default_registry_capacity())?,
        })
    }

    /// Sets the base URL of the memory service.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the fallback user id.
    pub fn with_default_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.default_user_id = user_id.into();
        self
    }

    /// Sets the maximum number of facts requested per search.
    pub fn with_max_memories(mut self, max: usize) -> Self {
        self.max_memories = max;
        self
    }

    /// Sets the token budget for the assembled context block.
    pub fn with_max_context_tokens(mut self, max: usize) -> Self {
        self.max_context_tokens = max;
        self
    }

    /// Enables or disables automatic conversation persistence.
    pub fn with_auto_store(mut self, enabled: bool) -> Self {
        self.auto_store = enabled;
        self
    }

    /// Enables or disables context injection into the system message.
    pub fn with_system_message_injection(mut self, enabled: bool) -> Self {
        self.inject_system_message = enabled;
        self
    }

    /// Sets the banner line above the injected facts.
    pub fn with_context_banner(mut self, banner: impl Into<String>) -> Self {
        self.context_banner = banner.into();
        self
    }

    /// Sets the capacity of the per-user handle cache.
    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    /// Checks the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(MemoryError::Configuration(
                "api_key must not be empty".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(MemoryError::Configuration(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.max_memories == 0 {
            return Err(MemoryError::Configuration(
                "max_memories must be at least 1".to_string(),
            ));
        }
        if self.registry_capacity == 0 {
            return Err(MemoryError::Configuration(
                "registry_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            MemoryError::Configuration(format!("{} has invalid value '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}
