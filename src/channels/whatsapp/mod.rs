pub mod webhook;

use crate::config::WhatsAppConfig;
use crate::errors::{ConciergeError, ConciergeResult};
use crate::model::{Contact, ContactDirectory, ConversationRegistry, Message, Update};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::base::ChannelAdapter;

/// Business Cloud API transport: Graph API calls out, webhook notifications
/// in.
pub struct WhatsAppAdapter {
    config: WhatsAppConfig,
    self_contact: Contact,
    client: reqwest::Client,
    directory: Arc<dyn ContactDirectory>,
    registry: Arc<ConversationRegistry>,
}

impl WhatsAppAdapter {
    pub fn new(
        config: WhatsAppConfig,
        client: reqwest::Client,
        directory: Arc<dyn ContactDirectory>,
        registry: Arc<ConversationRegistry>,
    ) -> Self {
        let self_contact = Contact::named(
            config.phone_number_id.clone(),
            config.display_phone_number.clone(),
        );
        Self {
            config,
            self_contact,
            client,
            directory,
            registry,
        }
    }

    fn graph_url(&self, suffix: &str) -> String {
        format!(
            "https://graph.facebook.com/{}/{}/{}",
            self.config.graph_api_version, self.config.phone_number_id, suffix
        )
    }

    /// Upload media bytes, returning the platform handle a media message
    /// must carry before it can be sent.
    async fn upload_media(&self, bytes: &[u8], name: &str, mime: &str) -> ConciergeResult<String> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(name.to_string())
            .mime_str(mime)
            .map_err(|e| ConciergeError::MediaUploadFailure(format!("bad mime {mime}: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime.to_string())
            .part("file", part);

        let response = self
            .client
            .post(self.graph_url("media"))
            .bearer_auth(&self.config.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ConciergeError::MediaUploadFailure(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ConciergeError::MediaUploadFailure(format!(
                "upload returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ConciergeError::MediaUploadFailure(e.to_string()))?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ConciergeError::MediaUploadFailure("upload response missing media id".into())
            })
    }

    async fn post_message(&self, body: Value) -> ConciergeResult<()> {
        let response = self
            .client
            .post(self.graph_url("messages"))
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .context("whatsapp message send failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("whatsapp send returned {}: {}", status, detail).into());
        }
        Ok(())
    }
}

/// Serialize one message into the Graph API `messages` body. Image messages
/// must already carry their uploaded media handle.
pub fn serialize_message(message: &Message, to: &str) -> ConciergeResult<Value> {
    let mut body = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
    });

    match message {
        Message::Text(text) => {
            body["type"] = json!("text");
            body["text"] = json!({
                "preview_url": text.preview_links,
                "body": text.text,
            });
        }
        Message::Image(image) => {
            let handle = image.media.handle.as_deref().ok_or_else(|| {
                ConciergeError::MediaUploadFailure(format!(
                    "image {} has no media handle",
                    image.media.name
                ))
            })?;
            let mut payload = json!({"id": handle});
            if let Some(caption) = &image.caption {
                payload["caption"] = json!(caption);
            }
            body["type"] = json!("image");
            body["image"] = payload;
        }
        Message::Location(location) => {
            let mut payload = json!({
                "latitude": location.latitude,
                "longitude": location.longitude,
            });
            if let Some(name) = &location.name {
                payload["name"] = json!(name);
            }
            if let Some(address) = &location.address {
                payload["address"] = json!(address);
            }
            body["type"] = json!("location");
            body["location"] = payload;
        }
        Message::InteractiveList(list) => {
            let sections: Vec<Value> = list
                .sections
                .iter()
                .map(|section| {
                    json!({
                        "title": section.title,
                        "rows": section
                            .rows
                            .iter()
                            .map(|row| {
                                let mut value = json!({"id": row.id, "title": row.title});
                                if let Some(description) = &row.description {
                                    value["description"] = json!(description);
                                }
                                value
                            })
                            .collect::<Vec<Value>>(),
                    })
                })
                .collect();

            let mut interactive = json!({
                "type": "list",
                "body": {"text": list.body},
                "action": {"button": list.button_label, "sections": sections},
            });
            if let Some(header) = &list.header {
                interactive["header"] = json!({"type": "text", "text": header});
            }
            if let Some(footer) = &list.footer {
                interactive["footer"] = json!({"text": footer});
            }
            body["type"] = json!("interactive");
            body["interactive"] = interactive;
        }
        Message::ListReply(_) => {
            return Err(ConciergeError::UnsupportedMessage(
                "list_reply is inbound-only".into(),
            ));
        }
    }

    Ok(body)
}

#[async_trait]
impl ChannelAdapter for WhatsAppAdapter {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    fn self_contact(&self) -> &Contact {
        &self.self_contact
    }

    async fn parse_webhook(&self, payload: &Value) -> ConciergeResult<Vec<Update>> {
        webhook::parse_notification(
            payload,
            &self.self_contact,
            self.directory.as_ref(),
            &self.registry,
        )
        .await
    }

    async fn send(&self, message: &Message, recipient: &Contact) -> ConciergeResult<()> {
        debug!(
            "whatsapp send: kind={}, to={}",
            message.kind(),
            recipient.channel_id
        );

        // Two-step send for media: upload first, then reference the handle.
        // An image message is never partially sent without a valid handle.
        let prepared;
        let message = match message {
            Message::Image(image) if image.media.handle.is_none() => {
                let handle = self
                    .upload_media(&image.media.bytes, &image.media.name, &image.media.mime)
                    .await?;
                info!("whatsapp media uploaded: {} -> {}", image.media.name, handle);
                let mut image = image.clone();
                image.media.handle = Some(handle);
                prepared = Message::Image(image);
                &prepared
            }
            other => other,
        };

        let body = serialize_message(message, &recipient.channel_id)?;
        self.post_message(body).await
    }

    /// `hub.verify_token` handshake: echo the challenge when the token
    /// matches our configured secret.
    fn handle_subscription_challenge(&self, params: &HashMap<String, String>) -> Option<String> {
        let mode = params.get("hub.mode").map(String::as_str);
        let token = params.get("hub.verify_token").map(String::as_str);
        if mode == Some("subscribe") && token == Some(self.config.verify_token.as_str()) {
            params.get("hub.challenge").cloned()
        } else {
            warn!("whatsapp subscription challenge rejected (mode={:?})", mode);
            None
        }
    }
}
