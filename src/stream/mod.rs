//! Stream observation for streaming chat responses.
//!
//! A streaming completion never hands the middleware a final response text,
//! so [`MemoryStream`] watches the stream instead: every chunk is forwarded
//! to the consumer untouched while the assistant text is accumulated from
//! the chunk deltas in the same pass. When the stream ends, the full
//! conversation is persisted exactly once.
//!
//! # Architecture
//!
//! - [`DeltaExtractor`] - pulls the text delta out of one chunk; any
//!   `FnMut(&C) -> Option<String>` closure qualifies
//! - [`json_delta`] - the provided extractor for OpenAI-style JSON chunks
//! - [`MemoryStream`] - the forwarding wrapper produced by
//!   [`MemoryMiddleware::wrap_stream`](crate::middleware::MemoryMiddleware::wrap_stream)
//! - [`StoreCompletion`] - future resolving to the persistence receipt
//!
//! Persistence fires on whichever of these happens first: the stream is
//! exhausted, the producer yields an error, or the consumer drops the
//! wrapper early. The receipt reports failures; nothing here panics or
//! returns an error to the chat pipeline.
//!
//! The accumulation buffer is unbounded, like the response itself; a chat
//! completion long enough for that to matter has already broken its
//! consumer.
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use mnemon::stream::json_delta;
//! use mnemon::StoreOptions;
//!
//! let mut stream = memory.wrap_stream(upstream, &messages, options, json_delta);
//! let completion = stream.completion();
//!
//! while let Some(chunk) = stream.next().await {
//!     // forward chunk to the client
//! }
//! drop(stream);
//!
//! let receipt = completion.await; // resolves once persistence finished
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::oneshot;

use crate::middleware::{MemoryMiddleware, StoreOptions};
use crate::types::{ChatMessage, StoreReceipt};

// ============= Delta Extraction =============

/// Pulls the incremental text out of one stream chunk.
///
/// Implemented for every `FnMut(&C) -> Option<String>`, so a closure (or
/// [`json_delta`] for JSON chunks) can be passed directly to
/// [`wrap_stream`](crate::middleware::MemoryMiddleware::wrap_stream).
pub trait DeltaExtractor<C> {
    /// Returns the text delta carried by `chunk`, if any.
    fn extract(&mut self, chunk: &C) -> Option<String>;
}

impl<C, F> DeltaExtractor<C> for F
where
    F: FnMut(&C) -> Option<String>,
{
    fn extract(&mut self, chunk: &C) -> Option<String> {
        self(chunk)
    }
}

/// Extracts the text delta from an OpenAI-style JSON chunk.
///
/// Probes, in order: `choices[0].delta.content`, a top-level
/// `delta.content`, then a plain `content` string field. The first string
/// found wins; chunks carrying none of them (role markers, usage frames)
/// yield `None`.
pub fn json_delta(chunk: &serde_json::Value) -> Option<String> {
    if let Some(content) = chunk
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
    {
        return Some(content.to_string());
    }

    if let Some(content) = chunk
        .get("delta")
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
    {
        return Some(content.to_string());
    }

    chunk
        .get("content")
        .and_then(|content| content.as_str())
        .map(|content| content.to_string())
}

// ============= Memory Stream =============

/// Everything needed to persist once the stream ends. Taken exactly once.
struct Capture {
    middleware: MemoryMiddleware,
    messages: Vec<ChatMessage>,
    options: StoreOptions,
    sender: oneshot::Sender<StoreReceipt>,
}

/// A chunk stream wrapper that accumulates assistant text and persists the
/// conversation when the stream ends.
///
/// Implements [`Stream`] with the same item type as the wrapped stream;
/// chunks and errors are forwarded unmodified and without delay. See the
/// [module docs](self) for the persistence contract.
pub struct MemoryStream<S, X> {
    inner: S,
    extractor: X,
    buffer: String,
    capture: Option<Capture>,
    receiver: Option<oneshot::Receiver<StoreReceipt>>,
    done: bool,
}

impl<S, X> MemoryStream<S, X> {
    pub(crate) fn new(
        inner: S,
        middleware: MemoryMiddleware,
        messages: Vec<ChatMessage>,
        options: StoreOptions,
        extractor: X,
    ) -> Self {
        let (sender, receiver) = oneshot::channel();

        Self {
            inner,
            extractor,
            buffer: String::new(),
            capture: Some(Capture {
                middleware,
                messages,
                options,
                sender,
            }),
            receiver: Some(receiver),
            done: false,
        }
    }

    /// Text accumulated from the deltas seen so far.
    pub fn accumulated(&self) -> &str {
        &self.buffer
    }

    /// Returns the handle that resolves to the persistence receipt.
    ///
    /// The handle never fails: persistence problems come back inside the
    /// receipt, and a completion consumed twice resolves to a failed
    /// receipt. It can be awaited before or after the stream is consumed
    /// or dropped.
    pub fn completion(&mut self) -> StoreCompletion {
        StoreCompletion {
            receiver: self.receiver.take(),
        }
    }

    /// Fires persistence at most once, resolving the completion handle.
    fn finalize(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        let Capture {
            middleware,
            messages,
            options,
            sender,
        } = capture;
        let text = std::mem::take(&mut self.buffer);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let receipt = middleware.after_chat(&messages, &text, options).await;
                    let _ = sender.send(receipt);
                });
            }
            Err(_) => {
                // Dropped on a thread without a runtime; nothing to spawn on.
                let _ = sender.send(StoreReceipt::failed(
                    "stream finalized outside a tokio runtime; conversation not stored",
                ));
            }
        }
    }
}

impl<S, C, E, X> Stream for MemoryStream<S, X>
where
    S: Stream<Item = std::result::Result<C, E>> + Unpin,
    X: DeltaExtractor<C> + Unpin,
{
    type Item = std::result::Result<C, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if this.capture.is_some() {
                    if let Some(delta) = this.extractor.extract(&chunk) {
                        this.buffer.push_str(&delta);
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                // A producer error ends the completion; persist what we have
                // and forward the error untouched.
                this.done = true;
                this.finalize();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.finalize();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S, X> Drop for MemoryStream<S, X> {
    fn drop(&mut self) {
        self.finalize();
    }
}

// ============= Completion Handle =============

/// Future resolving to the [`StoreReceipt`] of a wrapped stream.
///
/// Obtained from [`MemoryStream::completion`]. Resolves after persistence
/// has finished, regardless of how the stream ended; it never returns an
/// error.
pub struct StoreCompletion {
    receiver: Option<oneshot::Receiver<StoreReceipt>>,
}

impl Future for StoreCompletion {
    type Output = StoreReceipt;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match this.receiver.as_mut() {
            Some(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(result) => {
                    this.receiver = None;
                    Poll::Ready(result.unwrap_or_else(|_| {
                        StoreReceipt::failed("persistence task ended without reporting")
                    }))
                }
                Poll::Pending => Poll::Pending,
            },
            None => Poll::Ready(StoreReceipt::failed("completion already consumed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_delta_openai_choice_shape() {
        let chunk = json!({
            "choices": [{"delta": {"content": "Hel"}, "index": 0}]
        });
        assert_eq!(json_delta(&chunk), Some("Hel".to_string()));
    }

    #[test]
    fn test_json_delta_top_level_delta_shape() {
        let chunk = json!({"delta": {"content": "lo"}});
        assert_eq!(json_delta(&chunk), Some("lo".to_string()));
    }

    #[test]
    fn test_json_delta_direct_content_shape() {
        let chunk = json!({"content": "plain"});
        assert_eq!(json_delta(&chunk), Some("plain".to_string()));
    }

    #[test]
    fn test_json_delta_prefers_choice_shape() {
        let chunk = json!({
            "choices": [{"delta": {"content": "from-choice"}}],
            "content": "from-direct"
        });
        assert_eq!(json_delta(&chunk), Some("from-choice".to_string()));
    }

    #[test]
    fn test_json_delta_ignores_textless_chunks() {
        assert_eq!(json_delta(&json!({"choices": [{"delta": {"role": "assistant"}}]})), None);
        assert_eq!(json_delta(&json!({"usage": {"total_tokens": 12}})), None);
        assert_eq!(json_delta(&json!({"content": 42})), None);
    }

    #[tokio::test]
    async fn test_completion_consumed_twice_fails_softly() {
        use crate::client::MemoryService;
        use crate::config::MemoryConfig;
        use crate::types::{Fact, Memory, Result};
        use async_trait::async_trait;
        use std::sync::Arc;

        struct Quiet;

        #[async_trait]
        impl MemoryService for Quiet {
            async fn search(&self, _: &str, _: &str, _: usize) -> Result<Vec<Fact>> {
                Ok(Vec::new())
            }
            async fn extract_from_conversation(
                &self,
                _: &str,
                _: &[ChatMessage],
                _: Option<serde_json::Value>,
            ) -> Result<Vec<Memory>> {
                Ok(Vec::new())
            }
            async fn store(
                &self,
                _: &str,
                _: &str,
                _: Option<serde_json::Value>,
            ) -> Result<Option<Memory>> {
                Ok(None)
            }
        }

        let middleware =
            MemoryMiddleware::with_service(MemoryConfig::new("key"), Arc::new(Quiet)).unwrap();
        let chunks: Vec<std::result::Result<serde_json::Value, std::io::Error>> = vec![];
        let mut stream = middleware.wrap_stream(
            futures::stream::iter(chunks),
            &[],
            StoreOptions::new(),
            json_delta,
        );

        let _first = stream.completion();
        let second = stream.completion().await;
        assert!(!second.success);
    }
}
