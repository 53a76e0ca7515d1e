//! Conversation titles derived from the first user message.

use crate::conversation::ChatMessage;
use crate::messages::MessageRole;

/// Placeholder title of a conversation that has not been titled yet
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// Maximum number of characters taken from the first user message
pub const TITLE_MAX_CHARS: usize = 50;

/// Appended when the first user message was cut
pub const TITLE_TRUNCATION_MARKER: &str = "...";

/// Derive a conversation title.
///
/// Only a conversation still carrying [`NEW_CHAT_TITLE`] is re-titled, from
/// the trimmed content of its first user message. Any other title is
/// returned unchanged, which makes the function idempotent. A conversation a
/// user renamed to exactly "New Chat" is re-titled on its next commit.
#[must_use]
pub fn derive_title(current_title: &str, messages: &[ChatMessage]) -> String {
    if current_title != NEW_CHAT_TITLE {
        return current_title.to_string();
    }

    let Some(first_user) = messages.iter().find(|m| m.role == MessageRole::User) else {
        return current_title.to_string();
    };

    let content = first_user.content.trim();
    if content.is_empty() {
        return current_title.to_string();
    }

    if content.chars().count() > TITLE_MAX_CHARS {
        let head: String = content.chars().take(TITLE_MAX_CHARS).collect();
        format!("{head}{TITLE_TRUNCATION_MARKER}")
    } else {
        content.to_string()
    }
}
