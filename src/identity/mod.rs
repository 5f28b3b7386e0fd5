//! User identity resolution.
//!
//! Every middleware operation acts on behalf of a user id. The id is
//! resolved from, in order of precedence:
//!
//! 1. An explicit override on the call options
//! 2. A configured [`IdentityExtractor`] applied to the request context,
//!    when both are present
//! 3. The configured default user id
//!
//! Resolved ids are passed through verbatim. The service owns identity
//! semantics; this client performs no validation or normalization, so an
//! empty or malformed id reaches the service unchanged and fails there.
//!
//! # Example
//!
//! ```ignore
//! use mnemon::identity::{HeaderExtractor, RequestContext};
//!
//! let extractor = HeaderExtractor::new("X-User-Id");
//! let mut ctx = RequestContext::new();
//! ctx.insert_header("X-User-Id", "user-42");
//! ```

use async_trait::async_trait;
use std::collections::HashMap;

// ============= Request Context =============

/// Request-scoped information an extractor can resolve a user id from.
///
/// Header names are lowercased on insert and lookup, so callers can feed
/// them in whatever casing their framework uses.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: HashMap<String, String>,
}

impl RequestContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header, lowercasing its name.
    pub fn insert_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Adds a header, returning the context for chaining.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }
}

// ============= Extractor Trait =============

/// Pluggable user id extraction.
///
/// Implementations may consult session stores or decode tokens, hence the
/// async signature. Returning `None` falls through to the configured
/// default user id; any returned id is used verbatim.
#[async_trait]
pub trait IdentityExtractor: Send + Sync {
    /// Resolve a user id from the request context.
    async fn extract(&self, ctx: &RequestContext) -> Option<String>;
}

/// Extractor reading the user id from a single header.
#[derive(Debug, Clone)]
pub struct HeaderExtractor {
    header_name: String,
}

impl HeaderExtractor {
    /// Creates an extractor reading the given header.
    pub fn new(header_name: impl AsRef<str>) -> Self {
        Self {
            header_name: header_name.as_ref().to_ascii_lowercase(),
        }
    }
}

#[async_trait]
impl IdentityExtractor for HeaderExtractor {
    async fn extract(&self, ctx: &RequestContext) -> Option<String> {
        ctx.header(&self.header_name).map(|v| v.to_string())
    }
}

// ============= Resolution =============

/// Resolves the user id for one middleware call.
///
/// Precedence: explicit override, then the extractor (consulted only when
/// a request context is present), then the default. Results are used
/// verbatim; nothing is validated here.
pub async fn resolve_user(
    explicit: Option<&str>,
    request: Option<&RequestContext>,
    extractor: Option<&dyn IdentityExtractor>,
    default_user_id: &str,
) -> String {
    if let Some(id) = explicit {
        return id.to_string();
    }

    if let (Some(extractor), Some(ctx)) = (extractor, request) {
        if let Some(id) = extractor.extract(ctx).await {
            return id;
        }
    }

    default_user_id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_override_wins() {
        let extractor = HeaderExtractor::new("X-User-Id");
        let ctx = RequestContext::new().with_header("X-User-Id", "from-header");

        let resolved =
            resolve_user(Some("explicit"), Some(&ctx), Some(&extractor), "default").await;
        assert_eq!(resolved, "explicit");
    }

    #[tokio::test]
    async fn test_extractor_beats_default() {
        let extractor = HeaderExtractor::new("X-User-Id");
        let ctx = RequestContext::new().with_header("x-user-id", "from-header");

        let resolved = resolve_user(None, Some(&ctx), Some(&extractor), "default").await;
        assert_eq!(resolved, "from-header");
    }

    #[tokio::test]
    async fn test_falls_back_to_default() {
        let extractor = HeaderExtractor::new("X-User-Id");
        let ctx = RequestContext::new();

        let resolved = resolve_user(None, Some(&ctx), Some(&extractor), "default").await;
        assert_eq!(resolved, "default");

        let resolved = resolve_user(None, None, None, "default").await;
        assert_eq!(resolved, "default");
    }

    #[tokio::test]
    async fn test_extractor_skipped_without_request() {
        struct ConstantExtractor;

        #[async_trait]
        impl IdentityExtractor for ConstantExtractor {
            async fn extract(&self, _ctx: &RequestContext) -> Option<String> {
                Some("constant".to_string())
            }
        }

        let resolved = resolve_user(None, None, Some(&ConstantExtractor), "default").await;
        assert_eq!(resolved, "default");

        let ctx = RequestContext::new();
        let resolved = resolve_user(None, Some(&ctx), Some(&ConstantExtractor), "default").await;
        assert_eq!(resolved, "constant");
    }

    #[tokio::test]
    async fn test_resolved_ids_are_not_validated() {
        let resolved = resolve_user(Some(""), None, None, "default").await;
        assert_eq!(resolved, "");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = RequestContext::new().with_header("X-USER-ID", "u1");
        assert_eq!(ctx.header("x-user-id"), Some("u1"));
        assert_eq!(ctx.header("X-User-Id"), Some("u1"));
        assert_eq!(ctx.header("other"), None);
    }
}
