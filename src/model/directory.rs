use crate::model::Contact;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Pluggable `channel_id → contact` directory the normalizers read and write
/// while parsing. In-process it is a best-effort cache, safe to lose and
/// rebuild; a persistent implementation can be swapped in behind this trait.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn get(&self, channel_id: &str) -> Result<Option<Contact>>;

    /// Store or refresh a contact. The stored display name is overwritten on
    /// every observation (last write wins), never deleted.
    async fn put(&self, contact: Contact) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryContactDirectory {
    inner: RwLock<HashMap<String, Contact>>,
}

impl InMemoryContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactDirectory for InMemoryContactDirectory {
    async fn get(&self, channel_id: &str) -> Result<Option<Contact>> {
        Ok(self.inner.read().await.get(channel_id).cloned())
    }

    async fn put(&self, contact: Contact) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.get_mut(&contact.channel_id) {
            Some(existing) => {
                if contact.display_name.is_some() {
                    existing.display_name = contact.display_name;
                }
            }
            None => {
                inner.insert(contact.channel_id.clone(), contact);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let directory = InMemoryContactDirectory::new();
        directory
            .put(Contact::named("34611111111", "Joseba"))
            .await
            .unwrap();
        let found = directory.get("34611111111").await.unwrap().unwrap();
        assert_eq!(found.display_name.as_deref(), Some("Joseba"));
        assert!(directory.get("34699999999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reobservation_overwrites_display_name() {
        let directory = InMemoryContactDirectory::new();
        directory
            .put(Contact::named("34611111111", "Joseba Echevarría"))
            .await
            .unwrap();
        directory
            .put(Contact::named("34611111111", "Joseba García"))
            .await
            .unwrap();
        let found = directory.get("34611111111").await.unwrap().unwrap();
        assert_eq!(found.display_name.as_deref(), Some("Joseba García"));
    }

    #[tokio::test]
    async fn nameless_observation_keeps_existing_name() {
        let directory = InMemoryContactDirectory::new();
        directory
            .put(Contact::named("34611111111", "Joseba"))
            .await
            .unwrap();
        directory.put(Contact::new("34611111111")).await.unwrap();
        let found = directory.get("34611111111").await.unwrap().unwrap();
        assert_eq!(found.display_name.as_deref(), Some("Joseba"));
    }
}
