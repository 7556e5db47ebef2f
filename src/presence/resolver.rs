use std::{collections::BTreeSet, sync::Arc, time::Duration};

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use super::round_one_decimal;
use crate::{
    db::{models::Occupant, with_timeout, OccupantStore, StoreError},
    lighting::snap,
};

/// Temperature used when nobody present has a usable preference (°C).
pub const DEFAULT_TEMPERATURE: f64 = 25.0;

/// Luminosity used when nobody present has a usable preference (%).
pub const DEFAULT_LUMINOSITY: f64 = 50.0;

/// Name shown for tags that do not belong to any known employee.
const UNKNOWN_NAME: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PresentOccupant {
    pub tag: String,
    /// `false` for tags that did not resolve to an employee.
    pub known: bool,
    pub employee_id: Option<i64>,
    pub name: String,
    /// Degrees Celsius, as stored (may be outside the accepted range)
    pub preferred_temperature: Option<f64>,
    /// Percentage, as stored (may be outside the accepted range)
    pub preferred_luminosity: Option<i32>,
}

impl PresentOccupant {
    fn known(tag: &str, occupant: &Occupant) -> Self {
        Self {
            tag: tag.to_owned(),
            known: true,
            employee_id: Some(occupant.employee_id),
            name: occupant.full_name(),
            preferred_temperature: occupant.preferred_temperature,
            preferred_luminosity: occupant.preferred_luminosity,
        }
    }

    fn unknown(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            known: false,
            employee_id: None,
            name: UNKNOWN_NAME.to_owned(),
            preferred_temperature: None,
            preferred_luminosity: None,
        }
    }
}

/// Aggregate preferences of the people present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct PreferenceAverages {
    /// Degrees Celsius, one decimal
    pub temperature: f64,
    /// Percentage, one decimal
    pub luminosity: f64,
    /// `luminosity` snapped to the level actually driving the lights
    pub luminosity_snapped: u8,
}

impl Default for PreferenceAverages {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            luminosity: DEFAULT_LUMINOSITY,
            luminosity_snapped: snap(DEFAULT_LUMINOSITY),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PresenceSummary {
    pub present: Vec<PresentOccupant>,
    pub averages: PreferenceAverages,
}

/// Average the valid preferences of `occupants`.
///
/// Temperature and luminosity are filtered independently: an occupant with a
/// valid temperature but an out-of-range luminosity still counts towards the
/// temperature average. Missing or out-of-range values are skipped, never
/// clamped.
pub fn aggregate(occupants: &[Occupant]) -> PreferenceAverages {
    let temperature = mean(occupants.iter().filter_map(Occupant::valid_temperature))
        .map(round_one_decimal);
    let luminosity = mean(
        occupants
            .iter()
            .filter_map(Occupant::valid_luminosity)
            .map(f64::from),
    )
    .map(round_one_decimal);

    PreferenceAverages {
        temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
        luminosity: luminosity.unwrap_or(DEFAULT_LUMINOSITY),
        luminosity_snapped: luminosity.map(snap).unwrap_or(snap(DEFAULT_LUMINOSITY)),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Resolves presence tags to occupants and their aggregate preferences.
#[derive(Clone)]
pub struct PresenceResolver {
    occupants: Arc<dyn OccupantStore>,
    timeout: Duration,
}

impl PresenceResolver {
    pub fn new(occupants: Arc<dyn OccupantStore>, timeout: Duration) -> Self {
        Self { occupants, timeout }
    }

    /// One entry per tag (in tag order) plus the averages over the tags that
    /// resolved. Unknown tags are listed but never affect the averages.
    pub async fn resolve_present(
        &self,
        tags: &BTreeSet<String>,
    ) -> Result<PresenceSummary, StoreError> {
        if tags.is_empty() {
            return Ok(PresenceSummary::default());
        }

        let wanted: Vec<String> = tags.iter().cloned().collect();
        let occupants = with_timeout(self.timeout, self.occupants.find_by_tags(&wanted)).await?;

        let mut matched = Vec::with_capacity(occupants.len());
        let present = tags
            .iter()
            .map(|tag| {
                match occupants
                    .iter()
                    .find(|o| o.presence_tag.as_deref() == Some(tag.as_str()))
                {
                    Some(occupant) => {
                        matched.push(occupant.clone());
                        PresentOccupant::known(tag, occupant)
                    }
                    None => PresentOccupant::unknown(tag),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            tags = tags.len(),
            resolved = matched.len(),
            "Resolved presence tags"
        );

        Ok(PresenceSummary {
            present,
            averages: aggregate(&matched),
        })
    }
}
