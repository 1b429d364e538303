pub mod contact;
pub mod conversation;
pub mod directory;
pub mod message;
pub mod update;

pub use contact::Contact;
pub use conversation::{Conversation, ConversationRegistry, canonical_key};
pub use directory::{ContactDirectory, InMemoryContactDirectory};
pub use message::{
    ImageMessage, InteractiveListMessage, ListReplyMessage, ListRow, ListSection, LocationMessage,
    MediaPayload, Message, TextMessage,
};
pub use update::Update;
