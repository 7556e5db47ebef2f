use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    climate::{ClimateReport, ClimateState},
    db::{
        models::{
            Direction, Occupant, PreferenceUpdate, PresenceEvent, PREFERRED_LUMINOSITY_RANGE,
            PREFERRED_TEMPERATURE_RANGE,
        },
        MAX_EVENT_LIMIT,
    },
    presence::{PreferenceAverages, PresentOccupant},
    telemetry::{EnvironmentReading, HistoricalAverages, MalformedTelemetry},
};

// ---------------------------------------------------------------------------
// Telemetry ingestion (device → server)
// ---------------------------------------------------------------------------

/// Compact telemetry body posted by the ESP32 every few seconds.
///
/// `t`, `h`, `l` and `p` are required; a body missing any of them is
/// rejected without touching state.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TelemetryPayload {
    /// Temperature, °C
    pub t: Option<f64>,
    /// Relative humidity, %
    pub h: Option<f64>,
    /// Raw luminosity as read by the sensor
    pub l: Option<f64>,
    /// Number of people detected
    pub p: Option<f64>,
    /// Presence tags currently in range. Absent means nobody.
    pub tags: Option<Vec<String>>,
    /// Air-conditioner state, when the controller has one attached
    pub c: Option<ClimatePayload>,
}

#[derive(Debug)]
pub struct ParsedTelemetry {
    pub reading: EnvironmentReading,
    pub climate: Option<ClimateReport>,
}

impl TelemetryPayload {
    pub fn parse(self, captured_at: DateTime<Utc>) -> Result<ParsedTelemetry, MalformedTelemetry> {
        let temperature = self.t.ok_or(MalformedTelemetry::MissingField("t"))?;
        let humidity = self.h.ok_or(MalformedTelemetry::MissingField("h"))?;
        let luminosity = self.l.ok_or(MalformedTelemetry::MissingField("l"))?;
        let occupant_count = self.p.ok_or(MalformedTelemetry::MissingField("p"))?;

        let presence_tags: BTreeSet<String> = self
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(ParsedTelemetry {
            reading: EnvironmentReading {
                temperature,
                humidity,
                luminosity: luminosity.round() as i64,
                occupant_count: occupant_count.round() as i64,
                presence_tags,
                captured_at,
            },
            climate: self.c.map(Into::into),
        })
    }
}

/// Boolean as sent by the firmware: either a JSON bool or 0/1.
///
/// Bool must come before Integer so serde tries it first.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DeviceFlag {
    Bool(bool),
    Integer(i64),
}

impl From<DeviceFlag> for bool {
    fn from(flag: DeviceFlag) -> Self {
        match flag {
            DeviceFlag::Bool(v) => v,
            DeviceFlag::Integer(v) => v != 0,
        }
    }
}

/// Air-conditioner sub-object of the telemetry body.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClimatePayload {
    /// Powered on
    pub l: Option<DeviceFlag>,
    /// Humidifying
    pub u: Option<DeviceFlag>,
    /// Fan speed
    pub v: Option<i64>,
    /// Last non-zero fan speed
    pub uv: Option<i64>,
    /// Timer, minutes
    pub t: Option<i64>,
    /// Vertical louver swinging
    pub av: Option<DeviceFlag>,
    /// Horizontal louver swinging
    pub ah: Option<DeviceFlag>,
    /// Manual mode as seen by the device
    pub mmc: Option<DeviceFlag>,
}

impl From<ClimatePayload> for ClimateReport {
    fn from(c: ClimatePayload) -> Self {
        Self {
            powered_on: c.l.map(Into::into),
            humidifying: c.u.map(Into::into),
            fan_speed: c.v,
            last_fan_speed: c.uv,
            timer_minutes: c.t,
            vertical_louver: c.av.map(Into::into),
            horizontal_louver: c.ah.map(Into::into),
            manual_mode: c.mmc.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Ambient view (client ← server)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct AmbientResponse {
    /// Degrees Celsius; `null` when the last reading is stale
    pub temperature: Option<f64>,
    /// Relative humidity percentage; `null` when stale
    pub humidity: Option<f64>,
    /// Raw luminosity; `null` when stale
    pub luminosity: Option<i64>,
    pub occupant_count: Option<i64>,
    /// `true` if the last reading is younger than 60 s
    pub fresh: bool,
    pub captured_at: Option<DateTime<Utc>>,
    pub history: HistoricalAverages,
    pub present: Vec<PresentOccupant>,
    pub preferences: PreferenceAverages,
    /// `"auto"` or the manual level the lights are held at
    pub lighting_override: String,
    pub lighting_manual: bool,
    pub climate: ClimateState,
    pub climate_fresh: bool,
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TagsQuery {
    /// Comma-separated presence tags, e.g. `?tags=04A1,04B2`
    pub tags: Option<String>,
}

impl TagsQuery {
    pub fn tag_set(&self) -> BTreeSet<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmployeePreferencesDto {
    pub employee_id: i64,
    pub name: String,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Percentage
    pub luminosity: Option<i32>,
    pub presence_tag: Option<String>,
}

impl From<Occupant> for EmployeePreferencesDto {
    fn from(o: Occupant) -> Self {
        Self {
            employee_id: o.employee_id,
            name: o.full_name(),
            temperature: o.preferred_temperature,
            luminosity: o.preferred_luminosity,
            presence_tag: o.presence_tag,
        }
    }
}

/// Request body for `POST /esp32/employees/{employee_id}/preferences`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePreferencesRequest {
    /// Degrees Celsius, 16 to 32
    pub temperature: Option<f64>,
    /// Percentage, 0 to 100
    pub luminosity: Option<i32>,
    /// Reassign the employee's presence tag
    pub presence_tag: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidPreferences {
    #[error("temperature and luminosity are required")]
    Missing,
    #[error("temperature must be between 16 and 32 °C (got {0})")]
    Temperature(f64),
    #[error("luminosity must be between 0 and 100 % (got {0})")]
    Luminosity(i32),
}

impl UpdatePreferencesRequest {
    pub fn validate(self) -> Result<PreferenceUpdate, InvalidPreferences> {
        let (Some(temperature), Some(luminosity)) = (self.temperature, self.luminosity) else {
            return Err(InvalidPreferences::Missing);
        };
        if !PREFERRED_TEMPERATURE_RANGE.contains(&temperature) {
            return Err(InvalidPreferences::Temperature(temperature));
        }
        if !PREFERRED_LUMINOSITY_RANGE.contains(&luminosity) {
            return Err(InvalidPreferences::Luminosity(luminosity));
        }
        Ok(PreferenceUpdate {
            temperature,
            luminosity,
            presence_tag: self
                .presence_tag
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty()),
        })
    }
}

// ---------------------------------------------------------------------------
// Lighting and climate commands
// ---------------------------------------------------------------------------

/// Request body for `POST /esp32/lighting`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LightingRequest {
    /// `"auto"` or one of 0, 25, 50, 75, 100
    #[schema(value_type = String, example = "auto")]
    pub mode: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LightingResponse {
    pub mode: String,
    pub manual: bool,
}

/// Request body for `POST /esp32/climate/command`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ClimateCommandRequest {
    /// `"manual"`, `"auto"` or a device-specific command such as `"power_on"`
    pub command: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClimateCommandResponse {
    pub command: String,
    pub manual_mode: bool,
}

// ---------------------------------------------------------------------------
// Presence history
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Number of events to return (default 100, max 500)
    pub limit: Option<i64>,
}

pub const DEFAULT_EVENT_LIMIT: i64 = 100;

impl EventsQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_EVENT_LIMIT)
            .clamp(1, MAX_EVENT_LIMIT)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PresenceEventDto {
    pub id: Uuid,
    pub tag_id: String,
    pub direction: Direction,
    pub employee_id: Option<i64>,
    /// `"unknown"` for tags that did not resolve to an employee
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<PresenceEvent> for PresenceEventDto {
    fn from(e: PresenceEvent) -> Self {
        Self {
            id: e.id,
            tag_id: e.tag_id,
            direction: e.direction,
            employee_id: e.employee_id,
            name: e.full_name.unwrap_or_else(|| "unknown".to_owned()),
            occurred_at: e.occurred_at,
        }
    }
}
