//! Request/response boundary for the reservation engine, shaped so it can be
//! served as an RPC endpoint (the generative flow calls it for availability)
//! or invoked directly in-process by the orchestrator.

use crate::errors::ConciergeError;
use crate::reservations::ReservationEngine;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReservationRequest {
    /// Open slots for a date (today when omitted), with day rollover.
    Availability { date: Option<NaiveDate> },
    /// Book one slot for an owner.
    Booking { time_slot: String, owner: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReservationResponse {
    Availability {
        date: NaiveDate,
        available_slots: Vec<String>,
    },
    Booked {
        time_slot: String,
    },
    InvalidSlot {
        time_slot: String,
    },
    SlotAlreadyBooked {
        time_slot: String,
    },
}

/// Dispatch one reservation request. Booking rejections come back as typed
/// responses; only system-level failures surface as errors.
pub async fn handle(
    engine: &ReservationEngine,
    request: ReservationRequest,
) -> Result<ReservationResponse, ConciergeError> {
    match request {
        ReservationRequest::Availability { date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let available_slots = engine.available_slots(date).await?;
            Ok(ReservationResponse::Availability {
                date,
                available_slots,
            })
        }
        ReservationRequest::Booking { time_slot, owner } => {
            match engine.book(&time_slot, &owner).await {
                Ok(()) => {
                    info!("reservation boundary: booked {} for {}", time_slot, owner);
                    Ok(ReservationResponse::Booked { time_slot })
                }
                Err(ConciergeError::InvalidSlot(_)) => {
                    Ok(ReservationResponse::InvalidSlot { time_slot })
                }
                Err(ConciergeError::SlotAlreadyBooked(_)) => {
                    Ok(ReservationResponse::SlotAlreadyBooked { time_slot })
                }
                Err(other) => Err(other),
            }
        }
    }
}
