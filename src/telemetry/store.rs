use std::{
    collections::{BTreeSet, VecDeque},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::{EnvironmentReading, HISTORY_CAPACITY};
use crate::lighting::snap;

/// Latest reading plus a bounded FIFO of recent readings.
///
/// Wrapped in `Arc` so it can be cheaply cloned into every handler. Both the
/// current reading and the history sit behind one lock so that an append and
/// the eviction it triggers happen atomically.
#[derive(Clone, Default)]
pub struct TelemetryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    current: Option<EnvironmentReading>,
    history: VecDeque<EnvironmentReading>,
}

impl Inner {
    fn view_at(&self, now: DateTime<Utc>) -> CurrentView {
        match &self.current {
            Some(r) if r.is_fresh_at(now) => CurrentView {
                temperature: Some(r.temperature),
                humidity: Some(r.humidity),
                luminosity: Some(r.luminosity),
                occupant_count: Some(r.occupant_count),
                fresh: true,
                captured_at: Some(r.captured_at),
            },
            Some(r) => CurrentView {
                captured_at: Some(r.captured_at),
                ..CurrentView::default()
            },
            None => CurrentView::default(),
        }
    }

    fn tags(&self) -> BTreeSet<String> {
        self.current
            .as_ref()
            .map(|r| r.presence_tags.clone())
            .unwrap_or_default()
    }

    fn averages(&self) -> HistoricalAverages {
        let samples = self.history.len();
        if samples == 0 {
            return HistoricalAverages::default();
        }

        let n = samples as f64;
        let temperature = self.history.iter().map(|r| r.temperature).sum::<f64>() / n;
        let luminosity = self.history.iter().map(|r| r.luminosity as f64).sum::<f64>() / n;

        HistoricalAverages {
            temperature: Some(temperature),
            luminosity: Some(snap(luminosity)),
            samples,
        }
    }
}

/// Current environment values, nulled when the stored reading is stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CurrentView {
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    pub luminosity: Option<i64>,
    pub occupant_count: Option<i64>,
    /// `true` if the last reading is younger than the freshness window.
    pub fresh: bool,
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct HistoricalAverages {
    /// Arithmetic mean temperature over the stored history.
    pub temperature: Option<f64>,
    /// Mean raw luminosity over the stored history, snapped to a light level.
    pub luminosity: Option<u8>,
    pub samples: usize,
}

/// Everything the ambient view needs from the telemetry store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub current: CurrentView,
    pub history: HistoricalAverages,
    pub tags: BTreeSet<String>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current reading and append it to the history, evicting the
    /// oldest entry once capacity is exceeded.
    ///
    /// Returns the presence tags of the reading being replaced (empty on the
    /// first ingestion) so callers can diff against them.
    pub async fn ingest(&self, reading: EnvironmentReading) -> BTreeSet<String> {
        let mut inner = self.inner.write().await;

        inner.history.push_back(reading.clone());
        while inner.history.len() > HISTORY_CAPACITY {
            inner.history.pop_front();
        }

        inner
            .current
            .replace(reading)
            .map(|previous| previous.presence_tags)
            .unwrap_or_default()
    }

    pub async fn current_view(&self) -> CurrentView {
        self.current_view_at(Utc::now()).await
    }

    pub async fn current_view_at(&self, now: DateTime<Utc>) -> CurrentView {
        self.inner.read().await.view_at(now)
    }

    /// Presence tags of the stored reading, regardless of its freshness.
    pub async fn current_tags(&self) -> BTreeSet<String> {
        self.inner.read().await.tags()
    }

    /// Recomputed from scratch on each call; the history is tiny.
    pub async fn historical_averages(&self) -> HistoricalAverages {
        self.inner.read().await.averages()
    }

    /// Current view, history averages and presence tags taken under one read
    /// guard, so all three describe the same ingested reading.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> TelemetrySnapshot {
        let inner = self.inner.read().await;
        TelemetrySnapshot {
            current: inner.view_at(now),
            history: inner.averages(),
            tags: inner.tags(),
        }
    }

    #[cfg(test)]
    async fn history_temperatures(&self) -> Vec<f64> {
        self.inner
            .read()
            .await
            .history
            .iter()
            .map(|r| r.temperature)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn reading(temperature: f64, luminosity: i64, tags: &[&str]) -> EnvironmentReading {
        reading_at(temperature, luminosity, tags, Utc::now())
    }

    fn reading_at(
        temperature: f64,
        luminosity: i64,
        tags: &[&str],
        captured_at: DateTime<Utc>,
    ) -> EnvironmentReading {
        EnvironmentReading {
            temperature,
            humidity: 55.0,
            luminosity,
            occupant_count: tags.len() as i64,
            presence_tags: tags.iter().map(|t| t.to_string()).collect(),
            captured_at,
        }
    }

    #[tokio::test]
    async fn empty_store_reports_nothing() {
        let store = TelemetryStore::new();

        let view = store.current_view().await;
        assert!(!view.fresh);
        assert_eq!(view, CurrentView::default());

        let avg = store.historical_averages().await;
        assert_eq!(avg.temperature, None);
        assert_eq!(avg.luminosity, None);
        assert_eq!(avg.samples, 0);

        assert!(store.current_tags().await.is_empty());
    }

    #[tokio::test]
    async fn ingest_replaces_current_reading() {
        let store = TelemetryStore::new();
        store.ingest(reading(20.0, 10, &[])).await;
        store.ingest(reading(23.5, 40, &[])).await;

        let view = store.current_view().await;
        assert!(view.fresh);
        assert_eq!(view.temperature, Some(23.5));
        assert_eq!(view.luminosity, Some(40));
        assert_eq!(view.humidity, Some(55.0));
    }

    #[tokio::test]
    async fn history_evicts_oldest_first() {
        let store = TelemetryStore::new();
        for i in 0..11 {
            store.ingest(reading(i as f64, 0, &[])).await;
        }

        let temps = store.history_temperatures().await;
        assert_eq!(temps.len(), HISTORY_CAPACITY);
        assert_eq!(temps.first(), Some(&1.0));
        assert_eq!(temps.last(), Some(&10.0));
        assert_eq!(store.historical_averages().await.samples, HISTORY_CAPACITY);
    }

    #[tokio::test]
    async fn ingest_returns_previous_tags() {
        let store = TelemetryStore::new();
        let first = store.ingest(reading(20.0, 0, &["x", "y"])).await;
        assert!(first.is_empty());

        let second = store.ingest(reading(20.0, 0, &["y", "z"])).await;
        assert_eq!(
            second,
            ["x", "y"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert_eq!(
            store.current_tags().await,
            ["y", "z"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
    }

    #[tokio::test]
    async fn stale_reading_is_nulled() {
        let store = TelemetryStore::new();
        let now = Utc::now();
        store
            .ingest(reading_at(21.0, 30, &["a"], now - Duration::seconds(61)))
            .await;

        let view = store.current_view_at(now).await;
        assert!(!view.fresh);
        assert_eq!(view.temperature, None);
        assert_eq!(view.humidity, None);
        assert_eq!(view.luminosity, None);
        assert_eq!(view.occupant_count, None);
        assert!(view.captured_at.is_some());

        // Presence tags survive staleness.
        assert_eq!(store.current_tags().await.len(), 1);
    }

    #[tokio::test]
    async fn recent_reading_is_fresh() {
        let store = TelemetryStore::new();
        let now = Utc::now();
        store
            .ingest(reading_at(21.0, 30, &[], now - Duration::seconds(59)))
            .await;

        let view = store.current_view_at(now).await;
        assert!(view.fresh);
        assert_eq!(view.temperature, Some(21.0));
        assert_eq!(view.occupant_count, Some(0));
    }

    #[tokio::test]
    async fn averages_are_means_with_snapped_luminosity() {
        let store = TelemetryStore::new();
        store.ingest(reading(20.0, 40, &[])).await;
        store.ingest(reading(21.0, 60, &[])).await;
        store.ingest(reading(22.5, 80, &[])).await;

        let avg = store.historical_averages().await;
        assert!((avg.temperature.unwrap() - 63.5 / 3.0).abs() < 1e-9);
        // mean luminosity 60 → nearest level 50
        assert_eq!(avg.luminosity, Some(50));
        assert_eq!(avg.samples, 3);
    }

    #[tokio::test]
    async fn history_temperature_mean_is_not_rounded() {
        let store = TelemetryStore::new();
        store.ingest(reading(20.04, 0, &[])).await;
        store.ingest(reading(20.0, 0, &[])).await;

        let avg = store.historical_averages().await;
        assert!((avg.temperature.unwrap() - 20.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn snapshot_reflects_a_single_reading() {
        let store = TelemetryStore::new();
        let now = Utc::now();
        store.ingest(reading_at(21.0, 30, &["a"], now)).await;
        store.ingest(reading_at(23.0, 70, &["b", "c"], now)).await;

        let snapshot = store.snapshot_at(now).await;
        assert_eq!(snapshot.current, store.current_view_at(now).await);
        assert_eq!(snapshot.current.temperature, Some(23.0));
        assert_eq!(snapshot.current.occupant_count, Some(2));
        assert_eq!(
            snapshot.tags,
            ["b", "c"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert_eq!(snapshot.history.samples, 2);
        assert_eq!(snapshot.history.temperature, Some(22.0));
    }

    #[tokio::test]
    async fn snapshot_of_empty_store_is_default() {
        let store = TelemetryStore::new();
        assert_eq!(store.snapshot_at(Utc::now()).await, TelemetrySnapshot::default());
    }
}
