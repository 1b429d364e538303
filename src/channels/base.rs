use crate::errors::ConciergeResult;
use crate::model::{Contact, Message, Update};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Platform transport for one messaging channel.
///
/// Each implementation owns both directions: normalizing a raw webhook
/// delivery into [`Update`]s and serializing a [`Message`] back into the
/// platform's wire format.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// The bot's own identity on this platform; participant in every
    /// conversation the adapter normalizes.
    fn self_contact(&self) -> &Contact;

    /// Normalize one raw webhook delivery into updates, in payload order.
    /// Deliveries carrying no messages (status receipts) yield an empty
    /// sequence; structural violations are `MalformedPayload`.
    async fn parse_webhook(&self, payload: &Value) -> ConciergeResult<Vec<Update>>;

    /// Send one message to a recipient. Media messages are uploaded first
    /// when the platform requires a handle; an upload failure aborts the
    /// send with `MediaUploadFailure`.
    async fn send(&self, message: &Message, recipient: &Contact) -> ConciergeResult<()>;

    /// Platform verification handshake: echo the challenge when the verify
    /// token matches. Channels without a handshake return `None`.
    fn handle_subscription_challenge(&self, _params: &HashMap<String, String>) -> Option<String> {
        None
    }
}
