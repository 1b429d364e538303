/// Closed set of message shapes the assistant can receive or send.
///
/// Channel adapters dispatch on this enum exhaustively, so adding a new kind
/// is a compile-time-checked change in every adapter rather than a runtime
/// type probe.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(TextMessage),
    Image(ImageMessage),
    Location(LocationMessage),
    InteractiveList(InteractiveListMessage),
    ListReply(ListReplyMessage),
}

impl Message {
    pub fn text(body: impl Into<String>) -> Self {
        Message::Text(TextMessage {
            text: body.into(),
            preview_links: true,
        })
    }

    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Text(_) => "text",
            Message::Image(_) => "image",
            Message::Location(_) => "location",
            Message::InteractiveList(_) => "interactive_list",
            Message::ListReply(_) => "list_reply",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextMessage {
    pub text: String,
    /// Whether the platform should render URL previews for links in the body.
    pub preview_links: bool,
}

/// Raw media plus the platform upload handle once it exists.
///
/// A media message is not transmittable until `handle` is populated; the
/// upload that populates it is the channel adapter's job, not the model's.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub name: String,
    pub mime: String,
    pub handle: Option<String>,
}

impl MediaPayload {
    pub fn new(bytes: Vec<u8>, name: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            name: name.into(),
            mime: mime.into(),
            handle: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMessage {
    pub media: MediaPayload,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationMessage {
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// A pick-one-row list. WhatsApp renders this natively; Telegram gets an
/// inline keyboard with one button per row.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveListMessage {
    pub header: Option<String>,
    pub body: String,
    pub footer: Option<String>,
    pub button_label: String,
    pub sections: Vec<ListSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

/// The user's answer to an interactive list: the id of the chosen row.
#[derive(Debug, Clone, PartialEq)]
pub struct ListReplyMessage {
    pub chosen_row_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags() {
        assert_eq!(Message::text("hola").kind(), "text");
        assert_eq!(
            Message::ListReply(ListReplyMessage {
                chosen_row_id: "2025-03-10 10:00".into()
            })
            .kind(),
            "list_reply"
        );
    }

    #[test]
    fn media_starts_without_handle() {
        let media = MediaPayload::new(vec![1, 2, 3], "poster.jpg", "image/jpeg");
        assert!(media.handle.is_none());
    }
}
