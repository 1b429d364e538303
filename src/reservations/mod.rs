pub mod api;
pub mod store;

pub use store::{DayRecord, InMemorySlotStore, SlotStore};

use crate::errors::{ConciergeError, ConciergeResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// First bookable hour of the day (inclusive).
const DAY_START_HOUR: u32 = 9;
/// End of the daily window (exclusive): the last bookable start is 15:00.
const DAY_END_HOUR: u32 = 16;
/// A slot is no longer offered once its start is this close, in minutes.
const MIN_LEAD_MINUTES: i64 = 10;
/// Below this many open slots on a date, availability rolls into the next day.
const MIN_OPEN_SLOTS: usize = 3;
/// Defensive bound on the day rollover; the recursion in the observed
/// behavior has no explicit termination.
const MAX_LOOKAHEAD_DAYS: u32 = 14;

const SLOT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Canonical ordered slot sequence for `day`, as `"{day} HH:00"` ids.
///
/// Time-dependent: slots starting less than [`MIN_LEAD_MINUTES`] after `now`
/// are excluded, so the result is only valid for the instant it was computed
/// at.
pub fn generate_slots(day: NaiveDate, now: DateTime<Utc>) -> Vec<String> {
    let cutoff = now + Duration::minutes(MIN_LEAD_MINUTES);
    (DAY_START_HOUR..DAY_END_HOUR)
        .filter_map(|hour| {
            let start = day.and_hms_opt(hour, 0, 0)?.and_utc();
            (start >= cutoff).then(|| start.format(SLOT_FORMAT).to_string())
        })
        .collect()
}

/// Parse a slot id back into its start instant. Anything that does not
/// round-trip through the canonical format is an invalid slot.
pub fn parse_slot(slot: &str) -> ConciergeResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(slot, SLOT_FORMAT)
        .map_err(|_| ConciergeError::InvalidSlot(slot.to_string()))
}

/// Availability computation and conflict-free booking over a day-keyed slot
/// store. Holds no state of its own; every mutation goes through the store's
/// conditional-write primitive.
pub struct ReservationEngine {
    store: Arc<dyn SlotStore>,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self { store }
    }

    /// Open slots for `day`, extended with subsequent days while a date
    /// offers fewer than [`MIN_OPEN_SLOTS`], preserving day order.
    pub async fn available_slots(&self, day: NaiveDate) -> ConciergeResult<Vec<String>> {
        self.available_slots_at(day, Utc::now()).await
    }

    pub(crate) async fn available_slots_at(
        &self,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> ConciergeResult<Vec<String>> {
        let mut available = Vec::new();
        let mut date = day;
        for depth in 0..=MAX_LOOKAHEAD_DAYS {
            let day_open = self.open_slots_for(date, now).await?;
            let count = day_open.len();
            available.extend(day_open);
            if count >= MIN_OPEN_SLOTS {
                break;
            }
            if depth == MAX_LOOKAHEAD_DAYS {
                warn!(
                    "availability lookahead exhausted after {} days from {}",
                    MAX_LOOKAHEAD_DAYS, day
                );
                break;
            }
            date = date
                .succ_opt()
                .ok_or_else(|| ConciergeError::InvalidSlot(format!("no day after {date}")))?;
        }
        Ok(available)
    }

    /// Generated slots for one date minus the keys already booked.
    async fn open_slots_for(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> ConciergeResult<Vec<String>> {
        let offered = generate_slots(date, now);
        let record = self.store.day_record(date).await?;
        Ok(match record {
            Some(record) => offered
                .into_iter()
                .filter(|slot| !record.slots.contains_key(slot))
                .collect(),
            None => offered,
        })
    }

    /// Book `time_slot` for `owner`.
    ///
    /// The slot must be a member of the canonical offered sequence for its
    /// date at the moment of the call; otherwise `InvalidSlot`. Losing the
    /// conditional write to a concurrent booker is the distinct
    /// `SlotAlreadyBooked` failure, surfaced to the user rather than retried.
    pub async fn book(&self, time_slot: &str, owner: &str) -> ConciergeResult<()> {
        self.book_at(time_slot, owner, Utc::now()).await
    }

    pub(crate) async fn book_at(
        &self,
        time_slot: &str,
        owner: &str,
        now: DateTime<Utc>,
    ) -> ConciergeResult<()> {
        let start = parse_slot(time_slot)?;
        let date = start.date();
        if !generate_slots(date, now).iter().any(|s| s == time_slot) {
            return Err(ConciergeError::InvalidSlot(time_slot.to_string()));
        }

        let slot_end = (start + Duration::hours(1)).and_utc();
        let booked = self.store.try_book(date, time_slot, owner, slot_end).await?;
        if !booked {
            return Err(ConciergeError::SlotAlreadyBooked(time_slot.to_string()));
        }
        debug!("slot {} booked for {}", time_slot, owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    fn engine() -> ReservationEngine {
        ReservationEngine::new(Arc::new(InMemorySlotStore::new()))
    }

    #[test]
    fn full_day_before_opening() {
        let slots = generate_slots(day(), at(8, 49));
        assert_eq!(slots.len(), 7);
        assert_eq!(slots.first().unwrap(), "2025-03-10 09:00");
        assert_eq!(slots.last().unwrap(), "2025-03-10 15:00");
    }

    #[test]
    fn lead_time_boundary_is_inclusive() {
        // At exactly 08:50 the 09:00 slot is still 10 minutes out.
        let slots = generate_slots(day(), at(8, 50));
        assert_eq!(slots.len(), 7);
        // One second later it is inside the lead window.
        let slots = generate_slots(day(), at(8, 50) + Duration::seconds(1));
        assert_eq!(slots.len(), 6);
        assert_eq!(slots.first().unwrap(), "2025-03-10 10:00");
    }

    #[test]
    fn afternoon_consumes_most_of_the_day() {
        let slots = generate_slots(day(), at(14, 45));
        assert_eq!(slots, vec!["2025-03-10 15:00"]);
        // 14:55 puts even the last slot inside the lead window.
        assert!(generate_slots(day(), at(14, 55)).is_empty());
    }

    #[test]
    fn parse_rejects_off_format_ids() {
        assert!(parse_slot("2025-03-10 10:00").is_ok());
        assert!(parse_slot("2025-03-10T10:00").is_err());
        assert!(parse_slot("next tuesday").is_err());
    }

    #[tokio::test]
    async fn booking_removes_slot_from_availability() {
        let engine = engine();
        let now = at(7, 0);
        engine
            .book_at("2025-03-10 10:00", "34611111111", now)
            .await
            .unwrap();
        let available = engine.available_slots_at(day(), now).await.unwrap();
        assert!(!available.contains(&"2025-03-10 10:00".to_string()));
        assert_eq!(available.len(), 6);
    }

    #[tokio::test]
    async fn double_booking_is_a_conflict_not_an_invalid_slot() {
        let engine = engine();
        let now = at(7, 0);
        engine
            .book_at("2025-03-10 10:00", "34611111111", now)
            .await
            .unwrap();
        let err = engine
            .book_at("2025-03-10 10:00", "34622222222", now)
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::SlotAlreadyBooked(_)));
    }

    #[tokio::test]
    async fn out_of_window_slot_is_invalid() {
        let engine = engine();
        let err = engine
            .book_at("2025-03-10 23:00", "34611111111", at(7, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::InvalidSlot(_)));
    }

    #[tokio::test]
    async fn stale_slot_is_invalid_once_lead_time_passes() {
        let engine = engine();
        let err = engine
            .book_at("2025-03-10 09:00", "34611111111", at(8, 55))
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::InvalidSlot(_)));
    }

    #[tokio::test]
    async fn low_availability_rolls_into_next_day() {
        let engine = engine();
        let now = at(7, 0);
        // Book all but two slots on the first day.
        for slot in ["09:00", "10:00", "11:00", "12:00", "13:00"] {
            engine
                .book_at(&format!("2025-03-10 {slot}"), "owner", now)
                .await
                .unwrap();
        }
        let available = engine.available_slots_at(day(), now).await.unwrap();
        // 2 remaining on the 10th, then the full next day.
        assert_eq!(available.len(), 2 + 7);
        assert_eq!(available[0], "2025-03-10 14:00");
        assert_eq!(available[1], "2025-03-10 15:00");
        assert_eq!(available[2], "2025-03-11 09:00");
    }

    #[tokio::test]
    async fn rollover_chains_while_days_stay_scarce() {
        let engine = engine();
        let now = at(7, 0);
        for slot in ["09:00", "10:00", "11:00", "12:00", "13:00"] {
            engine
                .book_at(&format!("2025-03-10 {slot}"), "a", now)
                .await
                .unwrap();
            engine
                .book_at(&format!("2025-03-11 {slot}"), "b", now)
                .await
                .unwrap();
        }
        let available = engine.available_slots_at(day(), now).await.unwrap();
        // 2 + 2 scarce days, then the full 12th stops the chain.
        assert_eq!(available.len(), 2 + 2 + 7);
        assert_eq!(available[4], "2025-03-12 09:00");
    }

    #[tokio::test]
    async fn concurrent_bookings_have_exactly_one_winner() {
        let engine = Arc::new(engine());
        let now = at(7, 0);
        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .book_at("2025-03-10 11:00", &format!("owner-{i}"), now)
                    .await
            }));
        }
        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => winners += 1,
                Err(ConciergeError::SlotAlreadyBooked(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
    }
}
