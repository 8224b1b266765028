use crate::message::{Message, Role};

pub const DEFAULT_MAX_MESSAGES: usize = 20;

/// In-memory transcript storage with a bounded history.
///
/// The transcript advances only by appending; when the cap is exceeded the
/// oldest turns are evicted from the front. A system turn is pinned and
/// survives eviction so the model instructions never fall off the window.
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }
}

impl ConversationMemory {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages.max(1);
        self
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Prepend the system turn unless one is already present. The system
    /// turn is always first.
    pub fn ensure_system(&mut self, instruction: &str) {
        if !self.messages.iter().any(|m| m.role == Role::System) {
            self.messages.insert(0, Message::system(instruction));
        }
    }

    /// Evict oldest-first until the transcript fits the cap, skipping the
    /// pinned system turn.
    pub fn evict_to_cap(&mut self) {
        while self.messages.len() > self.max_messages {
            match self.messages.iter().position(|m| m.role != Role::System) {
                Some(idx) => {
                    self.messages.remove(idx);
                }
                None => break,
            }
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + '_ {
        self.messages.iter()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
