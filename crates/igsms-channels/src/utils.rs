//! Shared utilities for channel implementations.

/// Split a long message into chunks of at most `max_chars` characters.
///
/// Counts characters rather than bytes (SMS gateways limit on characters)
/// and prefers splitting just after a newline when one falls inside the chunk.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let end = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest);
                break;
            }
        };
        let break_at = rest[..end].rfind('\n').map(|i| i + 1).unwrap_or(end);
        chunks.push(&rest[..break_at]);
        rest = &rest[break_at..];
    }

    chunks
}

/// Shorten `text` to at most `max_chars` characters, ending in `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
