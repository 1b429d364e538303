use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One party in a conversation, identified by the opaque id the platform
/// assigned to it (a WhatsApp wa_id, a Telegram user id, a business phone
/// number id).
///
/// Identity is the `channel_id` alone; `display_name` is mutable profile
/// metadata and takes no part in equality, hashing or ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub channel_id: String,
    pub display_name: Option<String>,
}

impl Contact {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            display_name: None,
        }
    }

    pub fn named(channel_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Best name to address this contact by: the profile name when the
    /// platform gave us one, the raw channel id otherwise.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.channel_id,
        }
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.channel_id == other.channel_id
    }
}

impl Eq for Contact {}

impl Hash for Contact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.channel_id.hash(state);
    }
}

impl PartialOrd for Contact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Contact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.channel_id.cmp(&other.channel_id)
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
