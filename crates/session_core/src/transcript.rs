use std::sync::{PoisonError, RwLock};

use shared::domain::ChatMessage;

/// Append-only chat log. Entries are never edited or removed.
#[derive(Default)]
pub struct ChatTranscript {
    entries: RwLock<Vec<ChatMessage>>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` and returns its position.
    pub fn append(&self, message: ChatMessage) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(message);
        entries.len() - 1
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::ChatRole;

    use super::*;

    #[test]
    fn append_preserves_order_and_reports_position() {
        let transcript = ChatTranscript::new();
        assert_eq!(transcript.append(ChatMessage::user("q")), 0);
        assert_eq!(transcript.append(ChatMessage::agent("a")), 1);

        let snapshot = transcript.snapshot();
        assert_eq!(snapshot[0].role, ChatRole::User);
        assert_eq!(snapshot[1].content, "a");
    }
}
