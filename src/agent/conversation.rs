//! Append-only conversation log for one run.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// Ordered message log. Messages can be appended but never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation seeded with the task's starting reference as a user message.
    pub fn seeded(initial_reference: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(initial_reference)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::Role;

    #[test]
    fn test_seeded_conversation() {
        let conversation = Conversation::seeded("http://quiz.test/q1");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.last().map(|m| m.role), Some(Role::User));
    }

    #[test]
    fn test_earlier_snapshot_is_prefix() {
        let mut conversation = Conversation::seeded("start");
        let snapshot = conversation.messages().to_vec();

        conversation.push(Message::assistant("thinking"));
        conversation.extend(vec![Message::tool_result("a", "1"), Message::tool_result("b", "2")]);

        assert_eq!(conversation.len(), 4);
        assert_eq!(&conversation.messages()[..snapshot.len()], snapshot.as_slice());
    }
}
