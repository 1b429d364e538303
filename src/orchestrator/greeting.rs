//! Greeting composition for the new-conversation path: reservation summary,
//! hotel location, and the room key for distinguished members.

use crate::bookings::Reservation;
use crate::channels::ChannelAdapter;
use crate::errors::ConciergeResult;
use crate::model::{Contact, ImageMessage, LocationMessage, MediaPayload, Message};
use chrono::{NaiveDate, Utc};

pub(crate) async fn send_reservation_greeting(
    adapter: &dyn ChannelAdapter,
    recipient: &Contact,
    recipient_name: &str,
    reservations: &[Reservation],
) -> ConciergeResult<()> {
    let today = Utc::now().date_naive();
    let Some(reservation) = reservations.iter().min_by_key(|r| r.start_date) else {
        return Ok(());
    };

    let summary = compose_summary(reservation, recipient_name, today);

    // Main message: poster with the summary as caption when the hotel has
    // one, plain text otherwise.
    match &reservation.hotel.poster {
        Some(poster) => {
            adapter
                .send(
                    &Message::Image(ImageMessage {
                        media: MediaPayload::new(poster.clone(), "poster.jpg", "image/jpeg"),
                        caption: Some(summary),
                    }),
                    recipient,
                )
                .await?;
        }
        None => {
            adapter.send(&Message::text(summary), recipient).await?;
        }
    }

    // The hotel location follows the main message.
    adapter
        .send(
            &Message::Location(LocationMessage {
                latitude: reservation.hotel.location.latitude,
                longitude: reservation.hotel.location.longitude,
                name: Some(format!("{} location", reservation.hotel.name)),
                address: reservation.hotel.location.address.clone(),
            }),
            recipient,
        )
        .await?;

    // Gold members and above also get their digital room key.
    if reservation.has_distinguished_member() {
        adapter
            .send(
                &Message::Image(ImageMessage {
                    media: MediaPayload::new(
                        reservation.digital_room_key(),
                        format!("Room {}.png", reservation.room_number),
                        "image/png",
                    ),
                    caption: Some(room_key_caption(reservation)),
                }),
                recipient,
            )
            .await?;
    }

    Ok(())
}

pub(crate) fn compose_summary(
    reservation: &Reservation,
    recipient_name: &str,
    today: NaiveDate,
) -> String {
    let hotel = &reservation.hotel.name;
    let mut msg = if reservation.start_date == today {
        format!("*Your stay in {hotel} starts today*\n\n")
    } else {
        format!(
            "*We'll be expecting you in {hotel} on {}*\n\n",
            reservation.start_date
        )
    };

    let adults = reservation.adults(today);
    let minors = reservation.minors(today);
    let adult_names: Vec<&str> = adults.iter().map(|g| g.name.as_str()).collect();
    let minor_names: Vec<&str> = minors.iter().map(|g| g.name.as_str()).collect();

    msg.push_str(&format!(
        "Here are the details of your reservation, {recipient_name}:\n"
    ));
    msg.push_str(&format!("  • {} nights\n", reservation.nights()));
    msg.push_str(&format!(
        "  • {} adult{} ({})\n",
        adults.len(),
        if adults.len() > 1 { "s" } else { "" },
        adult_names.join(", ")
    ));
    match minors.len() {
        0 => {}
        1 => msg.push_str(&format!("  • 1 minor ({})\n", minor_names.join(", "))),
        n => msg.push_str(&format!("  • {} minors ({})\n", n, minor_names.join(", "))),
    }

    msg
}

fn room_key_caption(reservation: &Reservation) -> String {
    format!(
        "Your room is number {}, you can use this digital key in your smartphone or \
         smartwatch to enter your room.\n\
         You can also get a physical key in the hotel reception.\n\
         Since you are a distinguished member of our fidelity program, our Director of \
         Guest Experience will meet you in the hotel lobby and solve any doubts you \
         might have.",
        reservation.room_number
    )
}
