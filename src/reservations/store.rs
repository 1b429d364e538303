use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Per-calendar-date aggregate of booked slots.
///
/// Created on the first booking for a date and mutated on each subsequent
/// one; never deleted here. `expiry` is advisory for storage reclamation by
/// the backing store and only ever moves forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    /// `slot id → booking owner`. Key uniqueness is the booking invariant.
    pub slots: HashMap<String, String>,
    pub expiry: DateTime<Utc>,
}

/// Day-keyed slot storage.
///
/// Correctness of concurrent booking rests entirely on `try_book` being an
/// atomic conditional write on the slot-map entry (the equivalent of a
/// DynamoDB `attribute_not_exists` condition): no in-process lock protects
/// callers, so any implementation must provide at least compare-and-set
/// semantics per slot key.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn day_record(&self, date: NaiveDate) -> Result<Option<DayRecord>>;

    /// Insert `slot → owner` only if the key is currently absent. Returns
    /// `false` when another owner already holds the slot. On success the
    /// day expiry is raised to `slot_end` if that extends it.
    async fn try_book(
        &self,
        date: NaiveDate,
        slot: &str,
        owner: &str,
        slot_end: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Process-local store. The single mutex makes the check-then-insert appear
/// atomic to all tasks in this process, which is what the engine's tests and
/// a single-instance deployment need.
#[derive(Debug, Default)]
pub struct InMemorySlotStore {
    days: Mutex<HashMap<NaiveDate, DayRecord>>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn day_record(&self, date: NaiveDate) -> Result<Option<DayRecord>> {
        Ok(self.days.lock().await.get(&date).cloned())
    }

    async fn try_book(
        &self,
        date: NaiveDate,
        slot: &str,
        owner: &str,
        slot_end: DateTime<Utc>,
    ) -> Result<bool> {
        let mut days = self.days.lock().await;
        let record = days.entry(date).or_insert_with(|| DayRecord {
            date,
            slots: HashMap::new(),
            expiry: slot_end,
        });
        if record.slots.contains_key(slot) {
            return Ok(false);
        }
        record.slots.insert(slot.to_string(), owner.to_string());
        record.expiry = record.expiry.max(slot_end);
        Ok(true)
    }
}
