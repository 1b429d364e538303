use crate::model::{Contact, Message};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Canonical identity of a participant set: the sorted channel ids joined
/// with `'|'`. Two conversations are the same entity iff this key matches,
/// regardless of the order participants were observed in.
pub fn canonical_key(participants: &[Contact]) -> String {
    let mut ids: Vec<&str> = participants
        .iter()
        .map(|c| c.channel_id.as_str())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids.join("|")
}

/// One recorded turn. Kept separate from [`crate::model::Update`] so the log
/// does not hold a back-reference to its own conversation.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub sender: Contact,
    pub message: Message,
    pub timestamp: DateTime<Utc>,
}

/// A conversation between the assistant and one or more counterparties.
///
/// The participant set is fixed at creation. The turn log is append-only and
/// bounded by process lifetime; old messages cannot be refetched from either
/// platform, so losing it is acceptable.
#[derive(Debug)]
pub struct Conversation {
    id: String,
    participants: Vec<Contact>,
    log: Mutex<Vec<TurnRecord>>,
}

impl Conversation {
    fn new(mut participants: Vec<Contact>) -> Self {
        participants.sort();
        participants.dedup();
        let id = canonical_key(&participants);
        Self {
            id,
            participants,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Stable identity, also used as the generative-backend session key.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn participants(&self) -> &[Contact] {
        &self.participants
    }

    /// Everyone except `sender`.
    pub fn recipients(&self, sender: &Contact) -> Vec<Contact> {
        self.participants
            .iter()
            .filter(|p| *p != sender)
            .cloned()
            .collect()
    }

    pub fn record(&self, sender: Contact, message: Message, timestamp: DateTime<Utc>) {
        let mut log = self
            .log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        log.push(TurnRecord {
            sender,
            message,
            timestamp,
        });
    }

    pub fn turn_count(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

/// Arena-style table of conversations keyed by canonical participant set,
/// created lazily the first time a participant set is observed.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    inner: Mutex<HashMap<String, Arc<Conversation>>>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, participants: Vec<Contact>) -> Arc<Conversation> {
        let key = canonical_key(&participants);
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner
            .entry(key)
            .or_insert_with(|| {
                let conversation = Arc::new(Conversation::new(participants));
                debug!("new conversation registered: {}", conversation.id());
                conversation
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
