//! Chat relay message construction

use crate::ws::protocol::ChatMessage;

/// Build the relayed form of a chat line, or `None` if it is blank.
///
/// The trimmed text is relayed as-is; there is no content filtering.
pub fn build_chat(sender_name: &str, raw: &str, timestamp: String) -> Option<ChatMessage> {
    let message = raw.trim();
    if message.is_empty() {
        return None;
    }

    Some(ChatMessage {
        player: sender_name.to_string(),
        message: message.to_string(),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let chat = build_chat("Player42", "  hello  ", "3:04:05 PM".to_string()).unwrap();
        assert_eq!(chat.player, "Player42");
        assert_eq!(chat.message, "hello");
        assert_eq!(chat.timestamp, "3:04:05 PM");
    }

    #[test]
    fn inner_content_is_untouched() {
        let chat = build_chat("Player1", "\t<b>hi</b>   there \n", "t".to_string()).unwrap();
        assert_eq!(chat.message, "<b>hi</b>   there");
    }

    #[test]
    fn blank_messages_are_dropped() {
        assert!(build_chat("Player1", "", "t".to_string()).is_none());
        assert!(build_chat("Player1", "   \t\n ", "t".to_string()).is_none());
    }
}
