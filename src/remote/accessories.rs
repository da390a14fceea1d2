//! Accessory catalog, equip state and realtime fan-in.
//!
//! Equip state for the selected pet can change from two directions: the
//! explicit equip/unequip call made by this client, and pushes from the
//! backend's realtime channel (another device, a server-side reward, ...).
//! Both are funnelled into one reducer, [`apply_closet_event`], so there is a
//! single merge rule: upsert every record that belongs to the closet's pet and
//! ignore the rest.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::CareError;
use crate::model::{Accessory, PetAccessory};
use crate::remote::{TokenProvider, authorize, send_json};

#[derive(Debug, Serialize)]
struct EquipRequest<'a> {
    accessory_id: &'a str,
    pet_id: &'a str,
    equipped: bool,
}

/// Client for the accessory endpoints.
#[derive(Clone)]
pub struct AccessoryClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Option<TokenProvider>,
}

impl AccessoryClient {
    pub fn new(client: reqwest::Client, base_url: &str, tokens: Option<TokenProvider>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Create an unauthenticated client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Self {
        Self::new(reqwest::Client::new(), base_url, None)
    }

    /// List the accessory catalog.
    pub async fn list_accessories(&self) -> anyhow::Result<Vec<Accessory>> {
        let url = format!("{}/accessories", self.base_url);
        let request = authorize(self.client.get(&url), self.tokens.as_ref()).await?;
        send_json(request, self.tokens.as_ref()).await
    }

    /// List equip state for one pet.
    pub async fn list_equipped(&self, pet_id: &str) -> anyhow::Result<Vec<PetAccessory>> {
        let url = format!(
            "{}/pets/{}/accessories",
            self.base_url,
            urlencoding::encode(pet_id)
        );
        let request = authorize(self.client.get(&url), self.tokens.as_ref()).await?;
        send_json(request, self.tokens.as_ref()).await
    }

    /// Equip or unequip an accessory.
    pub async fn set_equipped(
        &self,
        accessory_id: &str,
        pet_id: &str,
        equipped: bool,
    ) -> anyhow::Result<PetAccessory> {
        let url = format!("{}/accessories/equip", self.base_url);
        let body = EquipRequest {
            accessory_id,
            pet_id,
            equipped,
        };
        let request = authorize(self.client.post(&url).json(&body), self.tokens.as_ref()).await?;
        send_json(request, self.tokens.as_ref()).await
    }
}

/// Something that changed equip state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosetEvent {
    /// The server's answer to an explicit equip/unequip call.
    ExplicitEquipResult(PetAccessory),
    /// An updated equip-state list delivered by the realtime channel.
    RealtimePush(Vec<PetAccessory>),
}

/// Merge an event into an equip map for `pet_id`.
///
/// Returns how many entries were written.
pub fn apply_closet_event(
    equipped: &mut BTreeMap<String, bool>,
    pet_id: &str,
    event: ClosetEvent,
) -> usize {
    let records = match event {
        ClosetEvent::ExplicitEquipResult(record) => vec![record],
        ClosetEvent::RealtimePush(records) => records,
    };

    let mut written = 0;
    for record in records {
        if record.pet_id != pet_id {
            continue;
        }
        equipped.insert(record.accessory_id, record.equipped);
        written += 1;
    }
    written
}

/// Equip state of one pet's accessories.
#[derive(Clone)]
pub struct Closet {
    pet_id: String,
    client: AccessoryClient,
    equipped: Arc<Mutex<BTreeMap<String, bool>>>,
}

impl Closet {
    pub fn new(client: AccessoryClient, pet_id: &str) -> Self {
        Self {
            pet_id: pet_id.to_string(),
            client,
            equipped: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn pet_id(&self) -> &str {
        &self.pet_id
    }

    fn map(&self) -> MutexGuard<'_, BTreeMap<String, bool>> {
        self.equipped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply an event from either source.
    pub fn apply(&self, event: ClosetEvent) -> usize {
        apply_closet_event(&mut self.map(), &self.pet_id, event)
    }

    /// Ids of currently equipped accessories, sorted.
    pub fn equipped_ids(&self) -> Vec<String> {
        self.map()
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_equipped(&self, accessory_id: &str) -> bool {
        self.map().get(accessory_id).copied().unwrap_or(false)
    }

    /// Load the pet's equip state from the server.
    pub async fn load(&self) -> Result<(), CareError> {
        let records = self
            .client
            .list_equipped(&self.pet_id)
            .await
            .map_err(CareError::remote)?;
        self.apply(ClosetEvent::RealtimePush(records));
        Ok(())
    }

    /// List the accessory catalog.
    pub async fn catalog(&self) -> Result<Vec<Accessory>, CareError> {
        self.client
            .list_accessories()
            .await
            .map_err(CareError::remote)
    }

    /// Equip or unequip, then merge the server's answer.
    #[instrument(skip(self), fields(pet_id = %self.pet_id))]
    pub async fn set_equipped(
        &self,
        accessory_id: &str,
        equipped: bool,
    ) -> Result<PetAccessory, CareError> {
        let record = self
            .client
            .set_equipped(accessory_id, &self.pet_id, equipped)
            .await
            .map_err(CareError::remote)?;

        self.apply(ClosetEvent::ExplicitEquipResult(record.clone()));
        info!(accessory_id, equipped = record.equipped, "Accessory updated");
        Ok(record)
    }

    /// Fan realtime pushes into this closet until the sender side closes.
    pub fn attach_realtime(&self, mut pushes: mpsc::Receiver<Vec<PetAccessory>>) -> JoinHandle<()> {
        let closet = self.clone();
        tokio::spawn(async move {
            while let Some(records) = pushes.recv().await {
                let written = closet.apply(ClosetEvent::RealtimePush(records));
                debug!(pet_id = %closet.pet_id, written, "Applied realtime accessory push");
            }
            debug!(pet_id = %closet.pet_id, "Realtime accessory feed closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(accessory_id: &str, pet_id: &str, equipped: bool) -> PetAccessory {
        PetAccessory {
            accessory_id: accessory_id.to_string(),
            pet_id: pet_id.to_string(),
            equipped,
        }
    }

    #[test]
    fn test_explicit_and_push_use_same_rule() {
        let mut explicit = BTreeMap::new();
        let mut pushed = BTreeMap::new();

        apply_closet_event(
            &mut explicit,
            "pet-1",
            ClosetEvent::ExplicitEquipResult(record("hat", "pet-1", true)),
        );
        apply_closet_event(
            &mut pushed,
            "pet-1",
            ClosetEvent::RealtimePush(vec![record("hat", "pet-1", true)]),
        );

        assert_eq!(explicit, pushed);
    }

    #[test]
    fn test_other_pets_are_ignored() {
        let mut equipped = BTreeMap::new();

        let written = apply_closet_event(
            &mut equipped,
            "pet-1",
            ClosetEvent::RealtimePush(vec![
                record("hat", "pet-1", true),
                record("scarf", "pet-2", true),
            ]),
        );

        assert_eq!(written, 1);
        assert!(!equipped.contains_key("scarf"));
    }

    #[test]
    fn test_later_event_wins() {
        let mut equipped = BTreeMap::new();

        apply_closet_event(
            &mut equipped,
            "pet-1",
            ClosetEvent::ExplicitEquipResult(record("hat", "pet-1", true)),
        );
        apply_closet_event(
            &mut equipped,
            "pet-1",
            ClosetEvent::RealtimePush(vec![record("hat", "pet-1", false)]),
        );

        assert_eq!(equipped.get("hat"), Some(&false));
    }

    #[tokio::test]
    async fn test_realtime_fan_in() {
        let closet = Closet::new(AccessoryClient::with_base_url("http://127.0.0.1:9"), "pet-1");
        let (tx, rx) = mpsc::channel(4);
        let handle = closet.attach_realtime(rx);

        tx.send(vec![record("hat", "pet-1", true), record("bow", "pet-1", false)])
            .await
            .unwrap();
        tx.send(vec![record("bow", "pet-1", true)]).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(closet.equipped_ids(), vec!["bow".to_string(), "hat".to_string()]);
        assert!(closet.is_equipped("hat"));
    }
}
