pub mod webhook;

use crate::config::TelegramConfig;
use crate::errors::{ConciergeError, ConciergeResult};
use crate::model::{Contact, ContactDirectory, ConversationRegistry, Message, Update};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use super::base::ChannelAdapter;

/// Bot API transport. The interactive list renders as an inline keyboard
/// (one button per row, the row id as callback data), which comes back to us
/// as a `callback_query`.
pub struct TelegramAdapter {
    config: TelegramConfig,
    self_contact: Contact,
    client: reqwest::Client,
    directory: Arc<dyn ContactDirectory>,
    registry: Arc<ConversationRegistry>,
}

impl TelegramAdapter {
    pub fn new(
        config: TelegramConfig,
        client: reqwest::Client,
        directory: Arc<dyn ContactDirectory>,
        registry: Arc<ConversationRegistry>,
    ) -> Self {
        let self_contact = Contact::named(config.bot_id.clone(), config.bot_name.clone());
        Self {
            config,
            self_contact,
            client,
            directory,
            registry,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.config.token, method)
    }

    async fn call(&self, method: &str, body: Value) -> ConciergeResult<()> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("telegram {method} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("telegram {} returned {}: {}", method, status, detail).into());
        }
        Ok(())
    }
}

/// Minimal markdown-to-HTML conversion for Telegram's HTML parse mode:
/// `*bold*`, `_italic_` and `` `code` `` over escaped text.
pub fn markdown_to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let re_bold = Regex::new(r"\*([^*\n]+)\*").unwrap();
    let re_italic = Regex::new(r"_([^_\n]+)_").unwrap();
    let re_code = Regex::new(r"`([^`\n]+)`").unwrap();

    let mut html = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    html = re_bold.replace_all(&html, "<b>$1</b>").to_string();
    html = re_italic.replace_all(&html, "<i>$1</i>").to_string();
    html = re_code.replace_all(&html, "<code>$1</code>").to_string();
    html
}

/// Build the `(method, body)` pair for one outbound message.
pub fn serialize_message(message: &Message, chat_id: &str) -> ConciergeResult<(String, Value)> {
    match message {
        Message::Text(text) => Ok((
            "sendMessage".into(),
            json!({
                "chat_id": chat_id,
                "text": markdown_to_html(&text.text),
                "parse_mode": "HTML",
                "disable_web_page_preview": !text.preview_links,
            }),
        )),
        Message::Location(location) => match &location.name {
            // A named location is a venue in Bot API terms.
            Some(name) => Ok((
                "sendVenue".into(),
                json!({
                    "chat_id": chat_id,
                    "latitude": location.latitude,
                    "longitude": location.longitude,
                    "title": name,
                    "address": location.address.clone().unwrap_or_default(),
                }),
            )),
            None => Ok((
                "sendLocation".into(),
                json!({
                    "chat_id": chat_id,
                    "latitude": location.latitude,
                    "longitude": location.longitude,
                }),
            )),
        },
        Message::InteractiveList(list) => {
            let mut text = String::new();
            if let Some(header) = &list.header {
                text.push_str(&format!("*{header}*\n\n"));
            }
            text.push_str(&list.body);
            if let Some(footer) = &list.footer {
                text.push_str(&format!("\n\n{footer}"));
            }
            let keyboard: Vec<Vec<Value>> = list
                .sections
                .iter()
                .flat_map(|section| section.rows.iter())
                .map(|row| {
                    let label = match &row.description {
                        Some(description) => format!("{} — {}", row.title, description),
                        None => row.title.clone(),
                    };
                    vec![json!({"text": label, "callback_data": row.id})]
                })
                .collect();
            Ok((
                "sendMessage".into(),
                json!({
                    "chat_id": chat_id,
                    "text": markdown_to_html(&text),
                    "parse_mode": "HTML",
                    "reply_markup": {"inline_keyboard": keyboard},
                }),
            ))
        }
        // Image goes through multipart, handled in send() directly.
        Message::Image(_) => Err(ConciergeError::UnsupportedMessage(
            "image messages are sent via multipart".into(),
        )),
        Message::ListReply(_) => Err(ConciergeError::UnsupportedMessage(
            "list_reply is inbound-only".into(),
        )),
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn self_contact(&self) -> &Contact {
        &self.self_contact
    }

    async fn parse_webhook(&self, payload: &Value) -> ConciergeResult<Vec<Update>> {
        webhook::parse_update(
            payload,
            &self.self_contact,
            self.directory.as_ref(),
            &self.registry,
        )
        .await
    }

    async fn send(&self, message: &Message, recipient: &Contact) -> ConciergeResult<()> {
        debug!(
            "telegram send: kind={}, to={}",
            message.kind(),
            recipient.channel_id
        );

        if let Message::Image(image) = message {
            // sendPhoto uploads and delivers in one multipart call; the
            // returned file id is Telegram's media handle, which we don't
            // need to keep because resends re-upload.
            let part = reqwest::multipart::Part::bytes(image.media.bytes.clone())
                .file_name(image.media.name.clone())
                .mime_str(&image.media.mime)
                .map_err(|e| {
                    ConciergeError::MediaUploadFailure(format!(
                        "bad mime {}: {e}",
                        image.media.mime
                    ))
                })?;
            let mut form = reqwest::multipart::Form::new()
                .text("chat_id", recipient.channel_id.clone())
                .part("photo", part);
            if let Some(caption) = &image.caption {
                form = form
                    .text("caption", markdown_to_html(caption))
                    .text("parse_mode", "HTML");
            }

            let response = self
                .client
                .post(self.api_url("sendPhoto"))
                .multipart(form)
                .send()
                .await
                .map_err(|e| ConciergeError::MediaUploadFailure(e.to_string()))?;
            if !response.status().is_success() {
                return Err(ConciergeError::MediaUploadFailure(format!(
                    "sendPhoto returned {}",
                    response.status()
                )));
            }
            return Ok(());
        }

        let (method, body) = serialize_message(message, &recipient.channel_id)?;
        self.call(&method, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InteractiveListMessage, ListRow, ListSection, LocationMessage};

    #[test]
    fn markdown_bold_and_escaping() {
        assert_eq!(
            markdown_to_html("*Your stay* starts <today>"),
            "<b>Your stay</b> starts &lt;today&gt;"
        );
        assert_eq!(markdown_to_html(""), "");
    }

    #[test]
    fn text_uses_send_message_with_html() {
        let (method, body) = serialize_message(&Message::text("hola *mundo*"), "6449557216").unwrap();
        assert_eq!(method, "sendMessage");
        assert_eq!(body["chat_id"], "6449557216");
        assert_eq!(body["text"], "hola <b>mundo</b>");
        assert_eq!(body["parse_mode"], "HTML");
        assert_eq!(body["disable_web_page_preview"], false);
    }

    #[test]
    fn named_location_becomes_a_venue() {
        let message = Message::Location(LocationMessage {
            latitude: 36.34,
            longitude: -6.16,
            name: Some("Costa Tartessos location".into()),
            address: Some("Playa de la Barrosa".into()),
        });
        let (method, body) = serialize_message(&message, "6449557216").unwrap();
        assert_eq!(method, "sendVenue");
        assert_eq!(body["title"], "Costa Tartessos location");
        assert_eq!(body["address"], "Playa de la Barrosa");
    }

    #[test]
    fn interactive_list_becomes_inline_keyboard() {
        let message = Message::InteractiveList(InteractiveListMessage {
            header: Some("Spa availability".into()),
            body: "Pick a time".into(),
            footer: None,
            button_label: "View slots".into(),
            sections: vec![ListSection {
                title: "2025-03-10".into(),
                rows: vec![
                    ListRow {
                        id: "2025-03-10 10:00".into(),
                        title: "10:00".into(),
                        description: None,
                    },
                    ListRow {
                        id: "2025-03-10 11:00".into(),
                        title: "11:00".into(),
                        description: None,
                    },
                ],
            }],
        });
        let (method, body) = serialize_message(&message, "6449557216").unwrap();
        assert_eq!(method, "sendMessage");
        let keyboard = body["reply_markup"]["inline_keyboard"].as_array().unwrap();
        assert_eq!(keyboard.len(), 2);
        assert_eq!(keyboard[0][0]["callback_data"], "2025-03-10 10:00");
        assert_eq!(keyboard[1][0]["text"], "11:00");
    }
}
