use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::db::{
    models::{Direction, NewPresenceEvent, PresenceEvent},
    with_timeout, OccupantStore, PresenceLog, StoreError,
};

/// Tags that appeared and disappeared between two consecutive readings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagTransitions {
    pub entries: Vec<String>,
    pub exits: Vec<String>,
}

impl TagTransitions {
    pub fn between(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> Self {
        Self {
            entries: current.difference(previous).cloned().collect(),
            exits: previous.difference(current).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.exits.is_empty()
    }
}

/// Writes entry/exit events for presence tag transitions.
///
/// Best effort: a failed lookup falls back to an anonymous event and a
/// failed write is logged and skipped, one tag at a time.
#[derive(Clone)]
pub struct PresenceLogger {
    occupants: Arc<dyn OccupantStore>,
    log: Arc<dyn PresenceLog>,
    timeout: Duration,
}

impl PresenceLogger {
    pub fn new(
        occupants: Arc<dyn OccupantStore>,
        log: Arc<dyn PresenceLog>,
        timeout: Duration,
    ) -> Self {
        Self { occupants, log, timeout }
    }

    /// Returns the number of events actually written.
    pub async fn record(&self, transitions: &TagTransitions, at: DateTime<Utc>) -> usize {
        let pending = transitions
            .entries
            .iter()
            .map(|tag| (tag, Direction::Entry))
            .chain(transitions.exits.iter().map(|tag| (tag, Direction::Exit)));

        let mut written = 0;
        for (tag, direction) in pending {
            match self.record_one(tag, direction, at).await {
                Ok(event) => {
                    info!(
                        tag = %event.tag_id,
                        direction = %event.direction,
                        employee_id = ?event.employee_id,
                        "Presence transition logged"
                    );
                    written += 1;
                }
                Err(e) => {
                    warn!(tag = %tag, direction = %direction, error = %e, "Failed to log presence transition");
                }
            }
        }
        written
    }

    async fn record_one(
        &self,
        tag: &str,
        direction: Direction,
        at: DateTime<Utc>,
    ) -> Result<PresenceEvent, StoreError> {
        let occupant = match with_timeout(self.timeout, self.occupants.find_by_tag(tag)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(tag = %tag, error = %e, "Occupant lookup failed; logging anonymous event");
                None
            }
        };

        let event = NewPresenceEvent {
            occupant_id: occupant.as_ref().map(|o| o.id),
            employee_id: occupant.as_ref().map(|o| o.employee_id),
            full_name: occupant.as_ref().map(|o| o.full_name()),
            tag_id: tag.to_owned(),
            direction,
            occurred_at: at,
        };

        with_timeout(self.timeout, self.log.append(event)).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::db::{
        models::{Occupant, PreferenceUpdate},
        MemoryStore,
    };

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn occupant(employee_id: i64, tag: &str) -> Occupant {
        Occupant {
            id: employee_id * 10,
            employee_id,
            first_name: "Rui".into(),
            last_name: "Lima".into(),
            preferred_temperature: None,
            preferred_luminosity: None,
            presence_tag: Some(tag.into()),
        }
    }

    /// Occupant lookups always fail.
    struct BrokenOccupants;

    #[async_trait]
    impl OccupantStore for BrokenOccupants {
        async fn find_by_tags(&self, _: &[String]) -> Result<Vec<Occupant>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn find_by_tag(&self, _: &str) -> Result<Option<Occupant>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn find_by_employee_id(&self, _: i64) -> Result<Option<Occupant>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn update_preferences(
            &self,
            _: i64,
            _: PreferenceUpdate,
        ) -> Result<Option<Occupant>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    /// Rejects writes for one specific tag.
    struct RejectingLog {
        inner: MemoryStore,
        reject: &'static str,
    }

    #[async_trait]
    impl PresenceLog for RejectingLog {
        async fn append(&self, event: NewPresenceEvent) -> Result<PresenceEvent, StoreError> {
            if event.tag_id == self.reject {
                return Err(StoreError::Unavailable("rejected".into()));
            }
            self.inner.append(event).await
        }
        async fn recent(&self, limit: i64) -> Result<Vec<PresenceEvent>, StoreError> {
            self.inner.recent(limit).await
        }
    }

    #[test]
    fn diff_reports_entries_and_exits_only() {
        let t = TagTransitions::between(&tags(&["X", "Y"]), &tags(&["Y", "Z"]));
        assert_eq!(t.entries, vec!["Z".to_string()]);
        assert_eq!(t.exits, vec!["X".to_string()]);
    }

    #[test]
    fn identical_sets_have_no_transitions() {
        let t = TagTransitions::between(&tags(&["A"]), &tags(&["A"]));
        assert!(t.is_empty());
    }

    #[test]
    fn first_reading_is_all_entries() {
        let t = TagTransitions::between(&BTreeSet::new(), &tags(&["A", "B"]));
        assert_eq!(t.entries.len(), 2);
        assert!(t.exits.is_empty());
    }

    #[tokio::test]
    async fn records_one_event_per_transition() {
        let store = MemoryStore::with_occupants([occupant(7, "Z")]).await;
        let logger = PresenceLogger::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Duration::from_secs(1),
        );

        let t = TagTransitions::between(&tags(&["X", "Y"]), &tags(&["Y", "Z"]));
        let written = logger.record(&t, Utc::now()).await;
        assert_eq!(written, 2);

        let events = store.events().await;
        assert_eq!(events.len(), 2);

        let entry = events.iter().find(|e| e.tag_id == "Z").unwrap();
        assert_eq!(entry.direction, Direction::Entry);
        assert_eq!(entry.employee_id, Some(7));
        assert_eq!(entry.occupant_id, Some(70));
        assert_eq!(entry.full_name.as_deref(), Some("Rui Lima"));

        let exit = events.iter().find(|e| e.tag_id == "X").unwrap();
        assert_eq!(exit.direction, Direction::Exit);
        assert_eq!(exit.employee_id, None);
        assert_eq!(exit.full_name, None);

        assert!(events.iter().all(|e| e.tag_id != "Y"));
    }

    #[tokio::test]
    async fn lookup_failure_still_logs_anonymous_event() {
        let log = MemoryStore::new();
        let logger = PresenceLogger::new(
            Arc::new(BrokenOccupants),
            Arc::new(log.clone()),
            Duration::from_secs(1),
        );

        let t = TagTransitions::between(&BTreeSet::new(), &tags(&["A"]));
        assert_eq!(logger.record(&t, Utc::now()).await, 1);

        let events = log.events().await;
        assert_eq!(events[0].tag_id, "A");
        assert_eq!(events[0].occupant_id, None);
    }

    #[tokio::test]
    async fn write_failure_skips_only_that_tag() {
        let inner = MemoryStore::new();
        let logger = PresenceLogger::new(
            Arc::new(inner.clone()),
            Arc::new(RejectingLog { inner: inner.clone(), reject: "B" }),
            Duration::from_secs(1),
        );

        let t = TagTransitions::between(&BTreeSet::new(), &tags(&["A", "B", "C"]));
        assert_eq!(logger.record(&t, Utc::now()).await, 2);

        let logged: Vec<_> = inner.events().await.into_iter().map(|e| e.tag_id).collect();
        assert_eq!(logged, vec!["A".to_string(), "C".to_string()]);
    }

    #[tokio::test]
    async fn unavailable_log_writes_nothing() {
        let store = MemoryStore::new();
        store.set_unavailable(true).await;
        let logger = PresenceLogger::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Duration::from_secs(1),
        );

        let t = TagTransitions::between(&tags(&["A"]), &tags(&["B"]));
        assert_eq!(logger.record(&t, Utc::now()).await, 0);
    }
}
