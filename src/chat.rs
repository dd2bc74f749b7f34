//! Type definitions for chat primitives
//!

use serde::{Deserialize, Serialize};

/// The author of a `Message`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Role {
    /// A `System` message is an authoritative message which is used to
    /// instruct the model. Usually, it appears as the first message
    /// in a dialog.
    System,

    /// A message authored by the user
    User,

    /// A message authored by the model
    Assistant,
}

/// A `Message` in a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Message {
    /// The author of the message
    pub role: Role,
    /// The contents of the message
    pub content: String,
}

impl Message {
    pub(crate) fn new(role: Role, content: String) -> Message {
        Message { role, content }
    }

    pub(crate) fn user(content: impl Into<String>) -> Message {
        Message::new(Role::User, content.into())
    }

    pub(crate) fn system(content: impl Into<String>) -> Message {
        Message::new(Role::System, content.into())
    }

    pub(crate) fn assistant(content: impl Into<String>) -> Message {
        Message::new(Role::Assistant, content.into())
    }

    /// An assistant message which has not received any content yet.
    pub(crate) fn is_placeholder(&self) -> bool {
        self.role == Role::Assistant && self.content.is_empty()
    }
}

/// An ordered conversation.
///
/// Callers only ever append to a transcript. The streaming session is the one
/// exception: it appends an empty assistant placeholder when a request is sent
/// and then replaces the placeholder's content as tokens arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub(crate) fn new() -> Transcript {
        Transcript::default()
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }

    /// Returns true if the conversation ends with a user prompt which has not
    /// been answered.
    pub(crate) fn awaiting_reply(&self) -> bool {
        matches!(
            self.last(),
            Some(Message { role: Role::User, content }) if !content.trim().is_empty()
        )
    }

    pub(crate) fn push_placeholder(&mut self) {
        debug_assert!(!matches!(self.last(), Some(m) if m.is_placeholder()));

        self.messages.push(Message::assistant(String::new()));
    }

    /// Overwrites the content of the trailing assistant message.
    pub(crate) fn replace_trailing(&mut self, content: &str) {
        match self.messages.last_mut() {
            Some(msg) if msg.role == Role::Assistant => {
                msg.content.clear();
                msg.content.push_str(content);
            }
            _ => debug_assert!(false, "no trailing assistant message to replace"),
        }
    }

    /// Drops the trailing assistant message if nothing was ever written to it.
    pub(crate) fn discard_placeholder(&mut self) -> bool {
        if matches!(self.last(), Some(m) if m.is_placeholder()) {
            self.messages.pop();
            return true;
        }

        false
    }
}
