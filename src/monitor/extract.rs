use sha1::{Digest, Sha1};

/// Characters of message text that feed the synthetic id.
const ID_PREFIX_CHARS: usize = 200;

/// The newest message found in the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestMessage {
    pub id: String,
    pub text: String,
}

/// Lowercase hex SHA-1 of the first 200 characters of `text`.
///
/// The thread exposes no stable message ids, so identical leading text is
/// treated as the same message.
pub fn synthetic_id(text: &str) -> String {
    let prefix: String = text.chars().take(ID_PREFIX_CHARS).collect();
    hex::encode(Sha1::digest(prefix.as_bytes()))
}

/// Pick the newest non-blank text. `texts` is in document order, so the
/// scan runs from the end.
pub fn latest_message(texts: &[String]) -> Option<LatestMessage> {
    texts.iter().rev().find_map(|raw| {
        let text = raw.trim();
        (!text.is_empty()).then(|| LatestMessage {
            id: synthetic_id(text),
            text: text.to_string(),
        })
    })
}
