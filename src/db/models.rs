use std::{fmt, ops::RangeInclusive};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Preferred temperatures outside this range (°C) are ignored by aggregation.
pub const PREFERRED_TEMPERATURE_RANGE: RangeInclusive<f64> = 16.0..=32.0;

/// Preferred luminosities outside this range (%) are ignored by aggregation.
pub const PREFERRED_LUMINOSITY_RANGE: RangeInclusive<i32> = 0..=100;

/// An employee record as far as the environment controller cares.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Occupant {
    pub id: i64,
    /// Employee registration number, unique across the company.
    pub employee_id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Degrees Celsius
    pub preferred_temperature: Option<f64>,
    /// Percentage
    pub preferred_luminosity: Option<i32>,
    pub presence_tag: Option<String>,
}

impl Occupant {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Preferred temperature, if set and inside the accepted range.
    pub fn valid_temperature(&self) -> Option<f64> {
        self.preferred_temperature
            .filter(|t| PREFERRED_TEMPERATURE_RANGE.contains(t))
    }

    /// Preferred luminosity, if set and inside the accepted range.
    pub fn valid_luminosity(&self) -> Option<i32> {
        self.preferred_luminosity
            .filter(|l| PREFERRED_LUMINOSITY_RANGE.contains(l))
    }
}

/// New preference values for one employee.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceUpdate {
    pub temperature: f64,
    pub luminosity: i32,
    /// Reassigns the presence tag when set; keeps the current one otherwise.
    pub presence_tag: Option<String>,
}

/// Mirrors the `presence_direction` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "presence_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entry,
    Exit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        })
    }
}

/// Presence event ready to be appended to the log.
///
/// `occupant_id`, `employee_id` and `full_name` are `None` for tags that
/// did not resolve to a known employee.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPresenceEvent {
    pub occupant_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub full_name: Option<String>,
    pub tag_id: String,
    pub direction: Direction,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub id: Uuid,
    pub occupant_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub full_name: Option<String>,
    pub tag_id: String,
    pub direction: Direction,
    pub occurred_at: DateTime<Utc>,
}

impl PresenceEvent {
    pub fn from_new(id: Uuid, event: NewPresenceEvent) -> Self {
        Self {
            id,
            occupant_id: event.occupant_id,
            employee_id: event.employee_id,
            full_name: event.full_name,
            tag_id: event.tag_id,
            direction: event.direction,
            occurred_at: event.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupant(temp: Option<f64>, lumi: Option<i32>) -> Occupant {
        Occupant {
            id: 1,
            employee_id: 1001,
            first_name: "Ana".into(),
            last_name: "Souza".into(),
            preferred_temperature: temp,
            preferred_luminosity: lumi,
            presence_tag: Some("tag-a".into()),
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        assert_eq!(occupant(Some(16.0), None).valid_temperature(), Some(16.0));
        assert_eq!(occupant(Some(32.0), None).valid_temperature(), Some(32.0));
        assert_eq!(occupant(None, Some(0)).valid_luminosity(), Some(0));
        assert_eq!(occupant(None, Some(100)).valid_luminosity(), Some(100));
    }

    #[test]
    fn out_of_range_values_are_excluded_not_clamped() {
        assert_eq!(occupant(Some(15.9), None).valid_temperature(), None);
        assert_eq!(occupant(Some(40.0), None).valid_temperature(), None);
        assert_eq!(occupant(None, Some(-1)).valid_luminosity(), None);
        assert_eq!(occupant(None, Some(750)).valid_luminosity(), None);
    }

    #[test]
    fn absent_values_are_excluded() {
        let o = occupant(None, None);
        assert_eq!(o.valid_temperature(), None);
        assert_eq!(o.valid_luminosity(), None);
    }

    #[test]
    fn full_name_joins_first_and_last() {
        assert_eq!(occupant(None, None).full_name(), "Ana Souza");
    }
}
