//! In-crate sample reservation data, standing in for the property management
//! system until one is wired up.

use crate::bookings::{Guest, GuestLedger, Hotel, HotelLocation, MemberTier, Reservation};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Minimal 1x1 PNG used as the sample digital room key asset.
pub const ROOM_KEY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub struct SampleLedger {
    hotel: Arc<Hotel>,
    reservations: Vec<Reservation>,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid sample date")
}

impl Default for SampleLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleLedger {
    pub fn new() -> Self {
        let hotel = Arc::new(Hotel {
            name: "Costa Tartessos Luxury Resort".into(),
            location: HotelLocation {
                latitude: 36.340_788_7,
                longitude: -6.160_966_1,
                address: Some("Playa de la Barrosa, Chiclana de la Frontera".into()),
            },
            stars: 5,
            url: Some("https://costatartessos.example".into()),
            poster: None,
        });

        let family = vec![
            Guest {
                name: "Joseba".into(),
                surnames: vec!["Echevarría".into(), "García".into()],
                birth_date: date(1984, 6, 2),
                tier: MemberTier::Gold,
                channel_id: Some("34611111111".into()),
            },
            Guest {
                name: "María".into(),
                surnames: vec!["García".into(), "Rodríguez".into()],
                birth_date: date(1985, 9, 15),
                tier: MemberTier::NonMember,
                channel_id: None,
            },
            Guest {
                name: "Iker".into(),
                surnames: vec!["García".into(), "Echevarría".into()],
                birth_date: date(2019, 2, 28),
                tier: MemberTier::NonMember,
                channel_id: None,
            },
        ];
        let couple = vec![
            Guest {
                name: "Antonio".into(),
                surnames: vec!["Campos".into(), "Rodríguez".into()],
                birth_date: date(1986, 9, 12),
                tier: MemberTier::Silver,
                channel_id: Some("34622222222".into()),
            },
            Guest {
                name: "Elena".into(),
                surnames: vec!["Díez".into(), "Vázquez".into()],
                birth_date: date(1986, 1, 21),
                tier: MemberTier::NonMember,
                channel_id: None,
            },
        ];

        let today = Utc::now().date_naive();
        let reservations = vec![
            Reservation {
                hotel: hotel.clone(),
                guests: family,
                start_date: today + chrono::Duration::days(2),
                end_date: today + chrono::Duration::days(9),
                room_number: 126,
            },
            Reservation {
                hotel: hotel.clone(),
                guests: couple,
                start_date: today,
                end_date: today + chrono::Duration::days(5),
                room_number: 307,
            },
        ];

        Self {
            hotel,
            reservations,
        }
    }

    fn courtesy_reservation(&self, channel_id: &str, name: &str) -> Reservation {
        let today = Utc::now().date_naive();
        Reservation {
            hotel: self.hotel.clone(),
            guests: vec![Guest {
                name: name.to_string(),
                surnames: Vec::new(),
                birth_date: date(1984, 6, 2),
                tier: MemberTier::Gold,
                channel_id: Some(channel_id.to_string()),
            }],
            start_date: today,
            end_date: today + chrono::Duration::days(7),
            room_number: 126,
        }
    }
}

impl GuestLedger for SampleLedger {
    fn reservations_for(&self, channel_id: &str, fallback_name: Option<&str>) -> Vec<Reservation> {
        let matches: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| {
                r.guests
                    .iter()
                    .any(|g| g.channel_id.as_deref() == Some(channel_id))
            })
            .cloned()
            .collect();
        if !matches.is_empty() {
            return matches;
        }
        match fallback_name {
            Some(name) => vec![self.courtesy_reservation(channel_id, name)],
            None => Vec::new(),
        }
    }

    fn session_attributes(&self, channel_id: &str, fallback_name: &str) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        attrs.insert("guest_name".to_string(), fallback_name.to_string());
        let reservations = self.reservations_for(channel_id, Some(fallback_name));
        if let Some(next) = reservations.iter().min_by_key(|r| r.start_date) {
            attrs.insert("hotel_name".to_string(), next.hotel.name.clone());
            attrs.insert("checkin_date".to_string(), next.start_date.to_string());
            attrs.insert("checkout_date".to_string(), next.end_date.to_string());
            attrs.insert("room_number".to_string(), next.room_number.to_string());
        }
        attrs
    }
}
