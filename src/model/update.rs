use crate::model::{Contact, Conversation, Message};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One normalized inbound event: a message attributed to a sender within a
/// conversation. This is the single shape both platform normalizers produce.
#[derive(Debug, Clone)]
pub struct Update {
    pub sender: Contact,
    pub conversation: Arc<Conversation>,
    pub message: Message,
    pub timestamp: DateTime<Utc>,
}

impl Update {
    /// Everyone in the conversation except the sender.
    pub fn recipients(&self) -> Vec<Contact> {
        self.conversation.recipients(&self.sender)
    }
}
