use std::collections::VecDeque;

use crate::providers::ChatMessage;

/// Few-shot context sent ahead of every request.
///
/// The system message is pinned; everything after it lives in a deque capped
/// at `max_len - 1`, so the whole window never exceeds `max_len` messages and
/// the oldest messages go first.
#[derive(Debug, Clone)]
pub struct Conversation {
    system: ChatMessage,
    recent: VecDeque<ChatMessage>,
    max_len: usize,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>, max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            system: ChatMessage::system(system_prompt),
            recent: VecDeque::with_capacity(max_len),
            max_len,
        }
    }

    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.push(ChatMessage::user(user));
        self.push(ChatMessage::assistant(assistant));
    }

    fn push(&mut self, message: ChatMessage) {
        self.recent.push_back(message);
        while self.recent.len() > self.max_len - 1 {
            self.recent.pop_front();
        }
    }

    /// The current window followed by `prompt` as a new user message.
    pub fn request_messages(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = self.messages();
        messages.push(ChatMessage::user(prompt));
        messages
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        std::iter::once(&self.system)
            .chain(self.recent.iter())
            .cloned()
            .collect()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MessageRole;

    #[test]
    fn starts_with_only_the_system_message() {
        let conversation = Conversation::new("rules", 20);
        let messages = conversation.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, "rules");
    }

    #[test]
    fn request_messages_append_the_prompt() {
        let mut conversation = Conversation::new("rules", 20);
        conversation.push_exchange("q1", "a1");
        let messages = conversation.request_messages("q2");
        let roles = messages.iter().map(|message| message.role).collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert_eq!(messages[3].content, "q2");
        assert_eq!(conversation.messages().len(), 3);
    }

    #[test]
    fn overflow_keeps_system_and_most_recent_messages() {
        let mut conversation = Conversation::new("rules", 20);
        for index in 0..10 {
            conversation.push_exchange(format!("q{index}"), format!("a{index}"));
        }
        let messages = conversation.messages();
        assert_eq!(messages.len(), 20);
        assert_eq!(messages[0].content, "rules");
        // q0 was the oldest and is the only message dropped.
        assert_eq!(messages[1].content, "a0");
        assert_eq!(messages[19].content, "a9");
    }

    #[test]
    fn window_never_exceeds_maximum() {
        for max_len in 1..8 {
            let mut conversation = Conversation::new("rules", max_len);
            for index in 0..30 {
                conversation.push_exchange(format!("q{index}"), format!("a{index}"));
                let messages = conversation.messages();
                assert!(messages.len() <= max_len);
                assert_eq!(messages[0].role, MessageRole::System);
                assert_eq!(messages[0].content, "rules");
                if max_len > 1 {
                    assert_eq!(
                        messages.last().map(|message| message.content.as_str()),
                        Some(format!("a{index}").as_str())
                    );
                }
            }
        }
    }

    #[test]
    fn zero_maximum_is_treated_as_one() {
        let mut conversation = Conversation::new("rules", 0);
        conversation.push_exchange("q", "a");
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.max_len(), 1);
    }
}
