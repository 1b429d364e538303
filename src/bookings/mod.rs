pub mod sample;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Loyalty program tiers, ordered so `tier >= Gold` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberTier {
    NonMember,
    White,
    Silver,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub name: String,
    pub surnames: Vec<String>,
    pub birth_date: NaiveDate,
    pub tier: MemberTier,
    /// Messaging identity of the guest, when they have registered one.
    pub channel_id: Option<String>,
}

impl Guest {
    pub fn is_minor(&self, today: NaiveDate) -> bool {
        // 18th birthday; Feb 29 birthdays roll to Mar 1 on non-leap years.
        let adult_on = NaiveDate::from_ymd_opt(
            self.birth_date.year() + 18,
            self.birth_date.month(),
            self.birth_date.day(),
        )
        .unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(self.birth_date.year() + 18, 3, 1)
                .expect("march 1st always exists")
        });
        adult_on > today
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub name: String,
    pub location: HotelLocation,
    pub stars: u8,
    pub url: Option<String>,
    /// Marketing shot sent with the greeting when available.
    #[serde(skip)]
    pub poster: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct Reservation {
    pub hotel: Arc<Hotel>,
    pub guests: Vec<Guest>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_number: u32,
}

impl Reservation {
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    pub fn adults(&self, today: NaiveDate) -> Vec<&Guest> {
        self.guests.iter().filter(|g| !g.is_minor(today)).collect()
    }

    pub fn minors(&self, today: NaiveDate) -> Vec<&Guest> {
        self.guests.iter().filter(|g| g.is_minor(today)).collect()
    }

    /// Whether any guest on the reservation is Gold tier or above.
    pub fn has_distinguished_member(&self) -> bool {
        self.guests.iter().any(|g| g.tier >= MemberTier::Gold)
    }

    /// The digital room key image for this reservation.
    pub fn digital_room_key(&self) -> Vec<u8> {
        sample::ROOM_KEY_PNG.to_vec()
    }
}

/// Lookup boundary for reservation data. The sample implementation ships
/// in-crate; a PMS-backed one can replace it behind this trait.
pub trait GuestLedger: Send + Sync {
    /// Reservations involving the guest registered under `channel_id`.
    /// When the id is unknown and a fallback name is given, a courtesy
    /// reservation is synthesized so the assistant always has context.
    fn reservations_for(&self, channel_id: &str, fallback_name: Option<&str>) -> Vec<Reservation>;

    /// Session attributes describing the requester's current reservation,
    /// handed to the generative backend on every freeform turn.
    fn session_attributes(&self, channel_id: &str, fallback_name: &str) -> HashMap<String, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn minor_check_uses_18th_birthday() {
        let guest = Guest {
            name: "Iker".into(),
            surnames: vec!["García".into()],
            birth_date: date(2019, 2, 28),
            tier: MemberTier::NonMember,
            channel_id: None,
        };
        assert!(guest.is_minor(date(2036, 6, 1)));
        assert!(!guest.is_minor(date(2037, 3, 1)));
    }

    #[test]
    fn tier_ordering() {
        assert!(MemberTier::Platinum >= MemberTier::Gold);
        assert!(MemberTier::Silver < MemberTier::Gold);
    }
}
