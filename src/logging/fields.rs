//! Field extraction helpers for structured logging

use crate::types::ModelRequest;

/// Characters of prompt kept in a log preview.
pub const PROMPT_PREVIEW_CHARS: usize = 100;

/// Truncated prompt preview for debug logs, or `None` unless content
/// logging is enabled.
///
/// Truncation counts characters, not bytes, so multi-byte text is never
/// split mid-character.
///
/// ```
/// use arbiter::logging::truncate_prompt;
/// use arbiter::types::{ModelRequest, RequestType};
///
/// let request = ModelRequest::new("creative", "ws", "Hello, world!", RequestType::Chat);
/// assert_eq!(truncate_prompt(&request, false), None);
/// assert_eq!(truncate_prompt(&request, true).as_deref(), Some("Hello, world!"));
/// ```
pub fn truncate_prompt(request: &ModelRequest, enable_content_logging: bool) -> Option<String> {
    if !enable_content_logging || request.prompt.is_empty() {
        return None;
    }
    Some(truncate_chars(&request.prompt, PROMPT_PREVIEW_CHARS))
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &s[..byte_index]),
        None => s.to_string(),
    }
}
