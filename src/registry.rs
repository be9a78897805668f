use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{NotifyError, Result};
use crate::scheme::{Registration, Registrations};
use crate::store::RegistrationStore;

/// Registrations shared by the sender and the registration endpoint.
///
/// Mutations are staged on a copy of the map and only swapped in once the
/// copy has been written to the store, so a failed save leaves the
/// in-memory registry exactly as it was. The lock is held across the save,
/// which serializes concurrent mutations of the same id.
pub struct Registry {
    registrations: Mutex<Registrations>,
    store: Arc<dyn RegistrationStore>,
}

impl Registry {
    pub fn new(registrations: Registrations, store: Arc<dyn RegistrationStore>) -> Self {
        Self {
            registrations: Mutex::new(registrations),
            store,
        }
    }

    /// Builds the registry from whatever the store currently holds.
    pub fn load(store: Arc<dyn RegistrationStore>) -> anyhow::Result<Self> {
        let registrations = store.load()?;
        log::info!("loaded {} push registrations", registrations.len());
        Ok(Self::new(registrations, store))
    }

    pub async fn get(&self, id: &str) -> Option<Registration> {
        self.registrations.lock().await.get(id).cloned()
    }

    pub async fn snapshot(&self) -> Registrations {
        self.registrations.lock().await.clone()
    }

    /// Resolves notification targets to channel URLs. `None` or an empty list
    /// selects every registration; unknown ids map to `None`.
    pub async fn channels_for(&self, targets: Option<&[String]>) -> Vec<(String, Option<String>)> {
        let regs = self.registrations.lock().await;
        match targets {
            Some(targets) if !targets.is_empty() => targets
                .iter()
                .map(|t| (t.clone(), regs.get(t).map(|r| r.channel.clone())))
                .collect(),
            _ => regs
                .iter()
                .map(|(id, r)| (id.clone(), Some(r.channel.clone())))
                .collect(),
        }
    }

    /// Inserts or replaces the registration stored under its id.
    pub async fn upsert(&self, registration: Registration) -> Result<()> {
        let mut regs = self.registrations.lock().await;

        let mut next = regs.clone();
        next.insert(registration.id.clone(), registration);

        *regs = self.persist(next).await?;
        Ok(())
    }

    /// Removes the registration whose embedded id matches `channel_id`.
    /// Returns `Ok(None)` when nothing matched.
    pub async fn remove_by_channel_id(&self, channel_id: &str) -> Result<Option<Registration>> {
        let mut regs = self.registrations.lock().await;

        let found = regs
            .iter()
            .find(|(_, r)| r.id == channel_id)
            .map(|(key, _)| key.clone());
        let key = match found {
            Some(key) => key,
            None => return Ok(None),
        };

        let mut next = regs.clone();
        let removed = next.remove(&key);

        *regs = self.persist(next).await?;
        Ok(removed)
    }

    /// Writes `next` on the blocking pool and hands it back once it is durable.
    async fn persist(&self, next: Registrations) -> Result<Registrations> {
        let store = self.store.clone();
        let (next, saved) = tokio::task::spawn_blocking(move || {
            let saved = store.save(&next);
            (next, saved)
        })
        .await
        .map_err(|e| NotifyError::Persistence(format!("save job failed: {}", e)))?;

        saved
            .map(|()| next)
            .map_err(|e| NotifyError::Persistence(format!("{:#}", e)))
    }
}
