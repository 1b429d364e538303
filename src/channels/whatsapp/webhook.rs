//! Normalizer for WhatsApp Business Cloud API webhook notifications.
//!
//! One HTTP delivery bundles `entry[] → changes[] → value`, where each value
//! carries the business metadata, the sender profiles and the messages. The
//! walk below validates the structure the same way the platform documents
//! it and emits updates in payload order.

use crate::errors::{ConciergeError, ConciergeResult};
use crate::model::{
    Contact, ContactDirectory, ConversationRegistry, ListReplyMessage, Message, TextMessage,
    Update,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

/// Object tag of a business-account notification.
pub const OBJECT_TAG: &str = "whatsapp_business_account";

fn malformed(field: &str) -> ConciergeError {
    ConciergeError::MalformedPayload(format!("missing or invalid `{field}`"))
}

/// Seconds-since-epoch timestamps arrive as strings; fall back to the
/// current instant when the field is absent or unparsable.
fn parse_timestamp(raw: Option<&Value>) -> DateTime<Utc> {
    raw.and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Parse one platform message object into the internal message model.
/// `None` means the type tag is outside the recognized set.
fn parse_message(msg: &Value) -> Option<Message> {
    match msg.get("type").and_then(Value::as_str) {
        Some("text") => {
            let body = msg
                .get("text")
                .and_then(|t| t.get("body"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(Message::Text(TextMessage {
                text: body.to_string(),
                preview_links: true,
            }))
        }
        Some("interactive") => {
            let reply_id = msg
                .get("interactive")
                .filter(|i| i.get("type").and_then(Value::as_str) == Some("list_reply"))
                .and_then(|i| i.get("list_reply"))
                .and_then(|r| r.get("id"))
                .and_then(Value::as_str)?;
            Some(Message::ListReply(ListReplyMessage {
                chosen_row_id: reply_id.to_string(),
            }))
        }
        _ => None,
    }
}

/// Normalize one webhook notification into updates.
///
/// Side effect: every contact profile block observed refreshes the injected
/// directory. Messages from senders the directory has never seen are skipped
/// with a logged anomaly; profile and message blocks can arrive out of order
/// across deliveries and crashing on the gap would lose the rest of the
/// batch.
pub async fn parse_notification(
    payload: &Value,
    self_contact: &Contact,
    directory: &dyn ContactDirectory,
    registry: &ConversationRegistry,
) -> ConciergeResult<Vec<Update>> {
    if payload.get("object").and_then(Value::as_str) != Some(OBJECT_TAG) {
        return Err(malformed("object"));
    }
    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("entry"))?;

    let mut updates = Vec::new();

    for entry in entries {
        // `entry.id` is the business account the webhook is subscribed to;
        // a webhook can be shared by several applications.
        let changes = entry
            .get("changes")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("entry.changes"))?;

        for change in changes {
            if change.get("field").and_then(Value::as_str) != Some("messages") {
                return Err(malformed("changes.field"));
            }
            let value = change.get("value").ok_or_else(|| malformed("changes.value"))?;
            if value.get("messaging_product").and_then(Value::as_str) != Some("whatsapp") {
                return Err(malformed("value.messaging_product"));
            }
            if value.get("metadata").is_none() {
                return Err(malformed("value.metadata"));
            }

            // Status/read-receipt deliveries carry no messages; they are
            // acknowledged and produce nothing.
            let messages = match value.get("messages").and_then(Value::as_array) {
                Some(messages) => messages,
                None if value.get("statuses").is_some() => {
                    debug!("whatsapp delivery contains only statuses, skipping");
                    continue;
                }
                None => return Err(malformed("value.messages")),
            };

            let contacts = value
                .get("contacts")
                .and_then(Value::as_array)
                .ok_or_else(|| malformed("value.contacts"))?;
            for contact in contacts {
                let wa_id = contact
                    .get("wa_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("contacts.wa_id"))?;
                let name = contact
                    .get("profile")
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("contacts.profile.name"))?;
                directory.put(Contact::named(wa_id, name)).await?;
            }

            for msg in messages {
                let sender_id = msg.get("from").and_then(Value::as_str).unwrap_or_default();
                let Some(sender) = directory.get(sender_id).await? else {
                    warn!(
                        "whatsapp message from unknown sender {}, skipping",
                        sender_id
                    );
                    continue;
                };
                let Some(message) = parse_message(msg) else {
                    warn!(
                        "unsupported whatsapp message type {:?}, skipping",
                        msg.get("type").and_then(|v| v.as_str()).unwrap_or("?")
                    );
                    continue;
                };

                let conversation =
                    registry.get_or_create(vec![self_contact.clone(), sender.clone()]);
                updates.push(Update {
                    sender,
                    conversation,
                    message,
                    timestamp: parse_timestamp(msg.get("timestamp")),
                });
            }
        }
    }

    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InMemoryContactDirectory;
    use serde_json::json;

    fn bot() -> Contact {
        Contact::named("333333333333333", "15555555555")
    }

    fn notification(messages: Value) -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "329941153545846",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {
                            "display_phone_number": "15555555555",
                            "phone_number_id": "333333333333333",
                        },
                        "contacts": [{
                            "profile": {"name": "Joseba Echevarría"},
                            "wa_id": "34611111111",
                        }],
                        "messages": messages,
                    },
                }],
            }],
        })
    }

    fn text_msg(body: &str) -> Value {
        json!({
            "from": "34611111111",
            "id": "wamid.HBgLMzQ2MTc5OTc0NjkVAgASGBYzRUIw",
            "timestamp": "1722857807",
            "text": {"body": body},
            "type": "text",
        })
    }

    #[tokio::test]
    async fn parses_text_messages_in_payload_order() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        let payload = notification(json!([text_msg("Hello!"), text_msg("World!")]));

        let updates = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].sender.label(), "Joseba Echevarría");
        match (&updates[0].message, &updates[1].message) {
            (Message::Text(a), Message::Text(b)) => {
                assert_eq!(a.text, "Hello!");
                assert_eq!(b.text, "World!");
            }
            other => panic!("unexpected messages: {other:?}"),
        }
        // Both messages share one conversation with the bot.
        assert!(std::sync::Arc::ptr_eq(
            &updates[0].conversation,
            &updates[1].conversation
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn reparsing_is_idempotent_given_directory_state() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        let payload = notification(json!([text_msg("Hola")]));

        let first = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap();
        let second = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].sender, second[0].sender);
        assert_eq!(first[0].message, second[0].message);
        assert_eq!(first[0].timestamp, second[0].timestamp);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn list_reply_becomes_slot_selection() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        let payload = notification(json!([{
            "from": "34611111111",
            "id": "wamid.x",
            "timestamp": "1722857807",
            "type": "interactive",
            "interactive": {
                "type": "list_reply",
                "list_reply": {"id": "2025-03-10 10:00", "title": "10:00"},
            },
        }]));

        let updates = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        match &updates[0].message {
            Message::ListReply(reply) => assert_eq!(reply.chosen_row_id, "2025-03-10 10:00"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_object_tag_is_malformed() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        let payload = json!({"object": "instagram", "entry": []});

        let err = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn missing_metadata_is_malformed() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        let payload = json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": {"messaging_product": "whatsapp", "messages": []},
                }],
            }],
        });

        let err = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn status_only_delivery_yields_no_updates() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        let payload = json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"phone_number_id": "333333333333333"},
                        "statuses": [{"id": "wamid.x", "status": "read"}],
                    },
                }],
            }],
        });

        let updates = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap();
        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn unsupported_message_type_is_skipped_not_fatal() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        let payload = notification(json!([
            {
                "from": "34611111111",
                "timestamp": "1722857807",
                "type": "sticker",
                "sticker": {"id": "123"},
            },
            text_msg("still here"),
        ]));

        let updates = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert!(matches!(&updates[0].message, Message::Text(t) if t.text == "still here"));
    }

    #[tokio::test]
    async fn unknown_sender_is_skipped() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        // Profile block names a different wa_id than the message sender.
        let mut payload = notification(json!([text_msg("hola")]));
        payload["entry"][0]["changes"][0]["value"]["messages"][0]["from"] =
            json!("34600000000");

        let updates = parse_notification(&payload, &bot(), &directory, &registry)
            .await
            .unwrap();
        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn directory_remembers_contacts_across_deliveries() {
        let directory = InMemoryContactDirectory::new();
        let registry = ConversationRegistry::new();
        parse_notification(&notification(json!([])), &bot(), &directory, &registry)
            .await
            .unwrap();

        // Second delivery has the message but no profile block for the
        // sender; the directory carries it over.
        let stored = directory.get("34611111111").await.unwrap().unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Joseba Echevarría"));
    }
}
