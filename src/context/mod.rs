//! Context assembly for memory-augmented prompts.
//!
//! This module provides the pure building blocks the middleware composes:
//! - Picking the retrieval query from a message list
//! - Formatting retrieved facts into a context block
//! - Injecting that block into a message list without mutating the original
//! - Assembling the conversation record sent for extraction
//!
//! Everything here is synchronous and side-effect free; the middleware owns
//! the I/O around it.

use crate::types::{ChatMessage, Fact, Role};

/// Estimates token count for a piece of text (rough approximation).
///
/// Uses a simple heuristic of ~4 characters per token for English text.
/// This is an approximation and may vary by tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Picks the retrieval query for a message list.
///
/// A non-empty override wins. Otherwise the content of the most recent
/// user-role message is used, scanning from the tail. Returns `None` when
/// neither yields anything, in which case retrieval is skipped entirely.
pub fn select_query<'a>(
    override_query: Option<&'a str>,
    messages: &'a [ChatMessage],
) -> Option<&'a str> {
    if let Some(query) = override_query {
        if !query.is_empty() {
            return Some(query);
        }
    }

    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .filter(|content| !content.is_empty())
}

/// Formats retrieved facts into a context block.
///
/// The block is the banner line followed by one `- fact` bullet per fact,
/// newline separated:
///
/// ```text
/// Relevant information from previous conversations:
/// - User's favorite color is blue
/// - User works as a mechanical engineer
/// ```
///
/// Facts are included in order until the estimated size of the block would
/// exceed `token_budget`. No facts (or none fitting) yields an empty string.
pub fn build_context_block(banner: &str, facts: &[Fact], token_budget: usize) -> String {
    if facts.is_empty() {
        return String::new();
    }

    let mut block = String::from(banner);
    let mut total_tokens = estimate_tokens(banner);
    let mut included = 0;

    for fact in facts {
        let line = format!("- {}", fact.text);
        let line_tokens = estimate_tokens(&line);
        if total_tokens + line_tokens > token_budget {
            break;
        }
        block.push('\n');
        block.push_str(&line);
        total_tokens += line_tokens;
        included += 1;
    }

    if included == 0 {
        return String::new();
    }

    block
}

/// Injects a context block into a copy of the message list.
///
/// When a system message exists, the block is appended to the first one
/// (blank line in between) and its position is preserved. Otherwise a new
/// system message carrying the block is prepended. An empty block returns
/// an unchanged copy. The input is never mutated.
pub fn inject_context(messages: &[ChatMessage], context: &str) -> Vec<ChatMessage> {
    let mut enhanced = messages.to_vec();
    if context.is_empty() {
        return enhanced;
    }

    if let Some(system) = enhanced.iter_mut().find(|m| m.role == Role::System) {
        system.content = format!("{}\n\n{}", system.content, context);
    } else {
        enhanced.insert(0, ChatMessage::system(context));
    }

    enhanced
}

/// Assembles the conversation record submitted for extraction.
///
/// Keeps the user and assistant turns of the input in order (system and
/// tool messages carry no conversational memory), then appends the final
/// assistant response unless it is blank.
pub fn conversation_record(messages: &[ChatMessage], response_text: &str) -> Vec<ChatMessage> {
    let mut record: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .cloned()
        .collect();

    if !response_text.trim().is_empty() {
        record.push(ChatMessage::assistant(response_text));
    }

    record
}
