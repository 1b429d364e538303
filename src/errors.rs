use thiserror::Error;

/// Typed error hierarchy for concierge.
///
/// Use at module boundaries (webhook parsing, booking, backend invocation,
/// channel sends). Internal/leaf functions can continue using
/// `anyhow::Result` — the `Internal` variant allows seamless conversion via
/// the `?` operator.
#[derive(Debug, Error)]
pub enum ConciergeError {
    /// A required structural field is missing from a webhook payload.
    /// Surfaced to the platform as a client error so it stops retrying.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// The message type tag is not one we parse. Soft failure: the delivery
    /// is accepted, the individual message is skipped.
    #[error("unsupported message type: {0}")]
    UnsupportedMessage(String),

    /// The requested slot is not currently offered for its date.
    #[error("invalid time slot: {0}")]
    InvalidSlot(String),

    /// Lost the booking race: the slot key already has an owner.
    #[error("time slot already booked: {0}")]
    SlotAlreadyBooked(String),

    /// The generative backend produced an empty completion. Triggers one
    /// retry; exhaustion becomes a user-facing apology, not a caller error.
    #[error("assistant backend returned an empty completion")]
    BackendEmptyResponse,

    /// Media upload failed; an image message is never sent without a valid
    /// media handle.
    #[error("media upload failed: {0}")]
    MediaUploadFailure(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using ConciergeError.
pub type ConciergeResult<T> = std::result::Result<T, ConciergeError>;

impl ConciergeError {
    /// Whether the failure is the caller's fault (reject, don't retry).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConciergeError::MalformedPayload(_) | ConciergeError::InvalidSlot(_)
        )
    }

    /// Whether the failure should be voiced to the chat user rather than
    /// treated as a system error.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ConciergeError::InvalidSlot(_) | ConciergeError::SlotAlreadyBooked(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payload_display() {
        let err = ConciergeError::MalformedPayload("missing entry list".into());
        assert_eq!(
            err.to_string(),
            "malformed webhook payload: missing entry list"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn slot_conflict_is_user_facing() {
        let err = ConciergeError::SlotAlreadyBooked("2025-03-10 10:00".into());
        assert!(err.is_user_facing());
        assert!(!err.is_client_error());
    }

    #[test]
    fn invalid_slot_is_both() {
        let err = ConciergeError::InvalidSlot("2025-03-10 23:00".into());
        assert!(err.is_user_facing());
        assert!(err.is_client_error());
    }

    #[test]
    fn internal_from_anyhow() {
        let err: ConciergeError = anyhow::anyhow!("store unavailable").into();
        assert!(matches!(err, ConciergeError::Internal(_)));
        assert!(!err.is_user_facing());
    }
}
