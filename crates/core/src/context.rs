//! Context builder trait: turns stored history into the messages of a request.

use crate::message::Message;

pub trait ContextBuilder: Send + Sync {
    /// Assemble the initial message list for a run: prompt material, then
    /// `history`, then `user_text` as the final user message.
    fn build_messages(&self, history: &[Message], summary: &str, user_text: &str) -> Vec<Message>;
}

/// Builder that emits only the history and the user message.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughContext;

impl ContextBuilder for PassthroughContext {
    fn build_messages(&self, history: &[Message], _summary: &str, user_text: &str) -> Vec<Message> {
        let mut messages = history.to_vec();
        messages.push(Message::user(user_text));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_appends_user_message() {
        let history = vec![Message::user("a"), Message::assistant("b")];
        let messages = PassthroughContext.build_messages(&history, "ignored", "c");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], Message::user("c"));
    }
}
