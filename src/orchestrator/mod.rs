//! Reply orchestration: decides, per normalized update, whether to greet a
//! new conversation, book a spa slot, or hand the turn to the generative
//! backend, and renders the outcome back into a platform message.

pub mod greeting;

use crate::backend::{AssistantBackend, Fragment, FragmentStream, SpaAvailability};
use crate::bookings::GuestLedger;
use crate::channels::ChannelAdapter;
use crate::errors::{ConciergeError, ConciergeResult};
use crate::model::{
    Contact, ConversationRegistry, InteractiveListMessage, ListReplyMessage, ListRow, ListSection,
    Message, Update,
};
use crate::reservations::ReservationEngine;
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Object tag of the out-of-band "start a conversation" directive. Payloads
/// carrying it bypass platform parsing entirely.
pub const NEW_CONVERSATION_TAG: &str = "new_conversation_request";

/// Total backend attempts per turn. The backend may legitimately stream an
/// empty "thinking" placeholder mid-reasoning, so the first empty completion
/// is retried once before we give up.
const BACKEND_ATTEMPTS: u32 = 2;

const APOLOGY_NO_ANSWER: &str = "I'm sorry, I cannot find that information. \
    You can find out more about this in the hotel reception.";
const APOLOGY_SLOT_TAKEN: &str =
    "I'm sorry, that time slot has just been taken. Please choose another one.";
const APOLOGY_SLOT_INVALID: &str = "I'm sorry, that time slot is no longer offered. \
    Ask me about the spa availability to see the current times.";

/// The external "start conversation" directive, distinct from any inbound
/// platform message.
#[derive(Debug, Clone, Deserialize)]
pub struct NewConversationRequest {
    /// The bot's identity on the target platform.
    pub sender_id: String,
    pub recipient_id: String,
    pub recipient_name: String,
}

enum BackendReply {
    Completion(String),
    Availability(SpaAvailability),
}

pub struct Orchestrator {
    backend: Arc<dyn AssistantBackend>,
    reservations: Arc<ReservationEngine>,
    ledger: Arc<dyn GuestLedger>,
    registry: Arc<ConversationRegistry>,
    /// Per-conversation turn locks. Backend session state is stateful and
    /// ordering-sensitive, so turns sharing a session key never overlap;
    /// different conversations proceed concurrently.
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        reservations: Arc<ReservationEngine>,
        ledger: Arc<dyn GuestLedger>,
        registry: Arc<ConversationRegistry>,
    ) -> Self {
        Self {
            backend,
            reservations,
            ledger,
            registry,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn turn_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Process one inbound update end to end.
    pub async fn handle_update(
        &self,
        update: &Update,
        adapter: &dyn ChannelAdapter,
    ) -> ConciergeResult<()> {
        let lock = self.turn_lock(update.conversation.id()).await;
        let _turn = lock.lock().await;

        update.conversation.record(
            update.sender.clone(),
            update.message.clone(),
            update.timestamp,
        );

        match &update.message {
            Message::ListReply(reply) => self.handle_slot_selection(update, reply, adapter).await,
            Message::Text(text) => self.respond_with_backend(update, &text.text, adapter).await,
            other => {
                debug!("ignoring inbound {} update", other.kind());
                Ok(())
            }
        }
    }

    /// The out-of-band new-conversation path: reset the backend session,
    /// then greet with reservation context.
    pub async fn start_conversation(
        &self,
        request: &NewConversationRequest,
        adapter: &dyn ChannelAdapter,
    ) -> ConciergeResult<()> {
        let bot = Contact::new(request.sender_id.clone());
        let recipient = Contact::named(request.recipient_id.clone(), request.recipient_name.clone());
        let conversation = self.registry.get_or_create(vec![bot, recipient.clone()]);

        let lock = self.turn_lock(conversation.id()).await;
        let _turn = lock.lock().await;

        info!("starting conversation {} with {}", conversation.id(), recipient);
        self.backend
            .invalidate_session(conversation.id())
            .await
            .map_err(ConciergeError::Internal)?;

        let reservations = self
            .ledger
            .reservations_for(&recipient.channel_id, Some(&request.recipient_name));
        if reservations.is_empty() {
            let text = format!(
                "Thanks for getting in touch with me, {}. I cannot find any reservations \
                 for you; you can book a room in our website.",
                request.recipient_name
            );
            return adapter.send(&Message::text(text), &recipient).await;
        }

        greeting::send_reservation_greeting(adapter, &recipient, &request.recipient_name, &reservations)
            .await
    }

    /// An interactive-list answer is only ever a spa slot selection: the
    /// chosen row id is the slot, the sender is the booking owner.
    async fn handle_slot_selection(
        &self,
        update: &Update,
        reply: &ListReplyMessage,
        adapter: &dyn ChannelAdapter,
    ) -> ConciergeResult<()> {
        let slot = &reply.chosen_row_id;
        let owner = &update.sender.channel_id;

        match self.reservations.book(slot, owner).await {
            Ok(()) => {
                info!("spa slot {} booked for {}", slot, owner);
                let text = format!(
                    "Your spa session is booked for *{slot}*. We look forward to seeing you!"
                );
                adapter.send(&Message::text(text), &update.sender).await
            }
            Err(err) if err.is_user_facing() => {
                // Tell the user first, then re-raise so the caller can log.
                let apology = match &err {
                    ConciergeError::SlotAlreadyBooked(_) => APOLOGY_SLOT_TAKEN,
                    _ => APOLOGY_SLOT_INVALID,
                };
                warn!("booking {} for {} rejected: {}", slot, owner, err);
                adapter.send(&Message::text(apology), &update.sender).await?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Freeform text goes to the generative backend, with session attributes
    /// derived from the requester's current reservation.
    async fn respond_with_backend(
        &self,
        update: &Update,
        text: &str,
        adapter: &dyn ChannelAdapter,
    ) -> ConciergeResult<()> {
        let sender = &update.sender;
        let session_key = update.conversation.id();
        let attributes = self
            .ledger
            .session_attributes(&sender.channel_id, sender.label());

        for attempt in 1..=BACKEND_ATTEMPTS {
            let stream = match self.backend.invoke(session_key, text, &attributes).await {
                Ok(stream) => stream,
                Err(err) if attempt < BACKEND_ATTEMPTS => {
                    warn!("backend invocation failed (attempt {}): {}", attempt, err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            match Self::collect_reply(stream).await {
                Ok(BackendReply::Availability(availability)) => {
                    return adapter
                        .send(&render_spa_availability(&availability), sender)
                        .await;
                }
                Ok(BackendReply::Completion(completion)) => {
                    return adapter.send(&Message::text(completion), sender).await;
                }
                Err(ConciergeError::BackendEmptyResponse) => {
                    debug!(
                        "empty completion from backend (attempt {}/{})",
                        attempt, BACKEND_ATTEMPTS
                    );
                }
                Err(err) => return Err(err),
            }
        }

        info!("backend retries exhausted for {}, apologizing", session_key);
        adapter.send(&Message::text(APOLOGY_NO_ANSWER), sender).await
    }

    /// Drain the fragment stream into a reply. Consumption stops as soon as
    /// a spa-availability document is recognized; the rest of the stream is
    /// dropped unread.
    async fn collect_reply(mut stream: FragmentStream) -> ConciergeResult<BackendReply> {
        let mut completion = String::new();
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(Fragment::Text(text)) => completion.push_str(&text),
                Ok(Fragment::Document(doc)) => {
                    if let Some(availability) = SpaAvailability::from_document(&doc) {
                        return Ok(BackendReply::Availability(availability));
                    }
                    debug!(
                        "ignoring unrecognized backend document (response_type={:?})",
                        doc.get("response_type").and_then(serde_json::Value::as_str)
                    );
                }
                Err(err) => {
                    warn!("backend stream failed mid-turn: {}", err);
                    break;
                }
            }
        }
        if completion.is_empty() {
            return Err(ConciergeError::BackendEmptyResponse);
        }
        Ok(BackendReply::Completion(completion))
    }
}

/// Render an availability result: an interactive list of slots, or an
/// apology naming the date when the day is fully booked.
pub fn render_spa_availability(availability: &SpaAvailability) -> Message {
    if availability.available_slots.is_empty() {
        return Message::text(format!(
            "I'm sorry, there are no spa slots available on {}. \
             Would you like me to check another day?",
            availability.date
        ));
    }

    let queried_date = availability.date.to_string();
    let rows = availability
        .available_slots
        .iter()
        .map(|slot| {
            let (date, time) = slot.split_once(' ').unwrap_or((slot.as_str(), slot.as_str()));
            ListRow {
                id: slot.clone(),
                title: time.to_string(),
                // Rolled-over slots on later days carry their date.
                description: (date != queried_date).then(|| date.to_string()),
            }
        })
        .collect();

    Message::InteractiveList(InteractiveListMessage {
        header: Some("Spa availability".into()),
        body: format!(
            "These are the spa slots still open around {}. Pick the one that suits you best.",
            availability.date
        ),
        footer: None,
        button_label: "View slots".into(),
        sections: vec![ListSection {
            title: queried_date,
            rows,
        }],
    })
}
