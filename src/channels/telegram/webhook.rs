//! Normalizer for Telegram Bot API webhook updates.
//!
//! One delivery carries one update object: a `message` for regular text, a
//! `callback_query` when the user pressed an inline-keyboard button (our
//! platform-equivalent of an interactive-list answer). Other update kinds
//! (edits, channel posts, member changes) produce no updates.

use crate::errors::{ConciergeError, ConciergeResult};
use crate::model::{
    Contact, ContactDirectory, ConversationRegistry, ListReplyMessage, Message, TextMessage,
    Update,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

fn malformed(field: &str) -> ConciergeError {
    ConciergeError::MalformedPayload(format!("missing or invalid `{field}`"))
}

/// Register the `from` profile block with the directory and return the
/// stored contact.
async fn observe_sender(
    from: &Value,
    directory: &dyn ContactDirectory,
) -> ConciergeResult<Option<Contact>> {
    let sender_id = from
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("from.id"))?
        .to_string();
    if let Some(name) = from.get("first_name").and_then(Value::as_str) {
        directory.put(Contact::named(&sender_id, name)).await?;
    }
    Ok(directory.get(&sender_id).await?)
}

fn parse_date(message: &Value) -> ConciergeResult<DateTime<Utc>> {
    let secs = message
        .get("date")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("message.date"))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| malformed("message.date"))
}

/// Normalize one webhook update into our model.
pub async fn parse_update(
    payload: &Value,
    self_contact: &Contact,
    directory: &dyn ContactDirectory,
    registry: &ConversationRegistry,
) -> ConciergeResult<Vec<Update>> {
    if let Some(message) = payload.get("message") {
        let from = message.get("from").ok_or_else(|| malformed("message.from"))?;
        message
            .get("chat")
            .and_then(|c| c.get("id"))
            .ok_or_else(|| malformed("message.chat.id"))?;
        let timestamp = parse_date(message)?;

        let Some(sender) = observe_sender(from, directory).await? else {
            warn!("telegram message from unregistered sender, skipping");
            return Ok(Vec::new());
        };

        let Some(text) = message.get("text").and_then(Value::as_str) else {
            warn!("unsupported telegram message without text, skipping");
            return Ok(Vec::new());
        };

        let conversation = registry.get_or_create(vec![self_contact.clone(), sender.clone()]);
        return Ok(vec![Update {
            sender,
            conversation,
            message: Message::Text(TextMessage {
                text: text.to_string(),
                preview_links: true,
            }),
            timestamp,
        }]);
    }

    if let Some(query) = payload.get("callback_query") {
        let from = query.get("from").ok_or_else(|| malformed("callback_query.from"))?;
        let data = query
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("callback_query.data"))?;

        let Some(sender) = observe_sender(from, directory).await? else {
            warn!("telegram callback from unregistered sender, skipping");
            return Ok(Vec::new());
        };

        let conversation = registry.get_or_create(vec![self_contact.clone(), sender.clone()]);
        return Ok(vec![Update {
            sender,
            conversation,
            message: Message::ListReply(ListReplyMessage {
                chosen_row_id: data.to_string(),
            }),
            timestamp: Utc::now(),
        }]);
    }

    debug!("telegram update carries no message, skipping");
    Ok(Vec::new())
}
