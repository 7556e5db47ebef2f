use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    models::{NewPresenceEvent, Occupant, PreferenceUpdate, PresenceEvent},
    OccupantStore, PresenceLog, StoreError, MAX_EVENT_LIMIT,
};

/// Events kept in memory; older ones are dropped. Matches the most a listing
/// can ask for.
const EVENT_CAPACITY: usize = MAX_EVENT_LIMIT as usize;

/// In-process personnel store and presence log.
///
/// Used when no `DATABASE_URL` is configured, and by tests. Can be switched
/// into an "unavailable" state to simulate a store outage.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    occupants: Vec<Occupant>,
    events: VecDeque<PresenceEvent>,
    unavailable: bool,
}

impl Inner {
    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store switched off".into()))
        } else {
            Ok(())
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_occupants(occupants: impl IntoIterator<Item = Occupant>) -> Self {
        let store = Self::new();
        for occupant in occupants {
            store.insert(occupant).await;
        }
        store
    }

    /// Insert or replace (by `employee_id`) an occupant record.
    pub async fn insert(&self, occupant: Occupant) {
        let mut inner = self.inner.write().await;
        inner.occupants.retain(|o| o.employee_id != occupant.employee_id);
        inner.occupants.push(occupant);
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }

    /// Retained events, in insertion order.
    pub async fn events(&self) -> Vec<PresenceEvent> {
        self.inner.read().await.events.iter().cloned().collect()
    }
}

#[async_trait]
impl OccupantStore for MemoryStore {
    async fn find_by_tags(&self, tags: &[String]) -> Result<Vec<Occupant>, StoreError> {
        let inner = self.inner.read().await;
        inner.check()?;
        Ok(inner
            .occupants
            .iter()
            .filter(|o| o.presence_tag.as_ref().is_some_and(|t| tags.contains(t)))
            .cloned()
            .collect())
    }

    async fn find_by_tag(&self, tag: &str) -> Result<Option<Occupant>, StoreError> {
        let inner = self.inner.read().await;
        inner.check()?;
        Ok(inner
            .occupants
            .iter()
            .find(|o| o.presence_tag.as_deref() == Some(tag))
            .cloned())
    }

    async fn find_by_employee_id(&self, employee_id: i64) -> Result<Option<Occupant>, StoreError> {
        let inner = self.inner.read().await;
        inner.check()?;
        Ok(inner
            .occupants
            .iter()
            .find(|o| o.employee_id == employee_id)
            .cloned())
    }

    async fn update_preferences(
        &self,
        employee_id: i64,
        update: PreferenceUpdate,
    ) -> Result<Option<Occupant>, StoreError> {
        let mut inner = self.inner.write().await;
        inner.check()?;
        let Some(occupant) = inner
            .occupants
            .iter_mut()
            .find(|o| o.employee_id == employee_id)
        else {
            return Ok(None);
        };

        occupant.preferred_temperature = Some(update.temperature);
        occupant.preferred_luminosity = Some(update.luminosity);
        if let Some(tag) = update.presence_tag {
            occupant.presence_tag = Some(tag);
        }
        Ok(Some(occupant.clone()))
    }
}

#[async_trait]
impl PresenceLog for MemoryStore {
    async fn append(&self, event: NewPresenceEvent) -> Result<PresenceEvent, StoreError> {
        let mut inner = self.inner.write().await;
        inner.check()?;
        let event = PresenceEvent::from_new(Uuid::new_v4(), event);
        inner.events.push_back(event.clone());
        while inner.events.len() > EVENT_CAPACITY {
            inner.events.pop_front();
        }
        Ok(event)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<PresenceEvent>, StoreError> {
        let inner = self.inner.read().await;
        inner.check()?;
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut events: Vec<PresenceEvent> = inner.events.iter().cloned().collect();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(limit);
        Ok(events)
    }
}
