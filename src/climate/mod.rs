use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::telemetry::is_fresh;

/// What a device poll receives when no command is waiting.
pub const NO_COMMAND: &str = "none";

/// Origin recorded for state mirrored from the embedded controller.
pub const DEVICE_ORIGIN: &str = "esp32";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Last known state of the air-conditioning unit as reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ClimateState {
    pub powered_on: bool,
    pub humidifying: bool,
    pub fan_speed: i64,
    /// Fan speed to restore when the unit is powered back on.
    pub last_fan_speed: i64,
    pub timer_minutes: i64,
    pub vertical_louver: bool,
    pub horizontal_louver: bool,
    /// `None` until the device has reported at least once.
    pub last_updated_at: Option<DateTime<Utc>>,
    pub manual_mode: bool,
    pub origin: String,
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            powered_on: false,
            humidifying: false,
            fan_speed: 0,
            last_fan_speed: 1,
            timer_minutes: 0,
            vertical_louver: false,
            horizontal_louver: false,
            last_updated_at: None,
            manual_mode: false,
            origin: DEVICE_ORIGIN.to_owned(),
        }
    }
}

/// Device-reported state. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimateReport {
    pub powered_on: Option<bool>,
    pub humidifying: Option<bool>,
    pub fan_speed: Option<i64>,
    pub last_fan_speed: Option<i64>,
    pub timer_minutes: Option<i64>,
    pub vertical_louver: Option<bool>,
    pub horizontal_louver: Option<bool>,
    /// Only overwrites the mode flag when the device chooses to send it.
    pub manual_mode: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ClimateView {
    pub state: ClimateState,
    /// `true` if the device reported within the freshness window.
    pub fresh: bool,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
#[error("climate command must be a non-empty string")]
pub struct EmptyCommand;

/// A one-shot command waiting for the device.
///
/// `manual` and `auto` switch the control mode; any other value is passed
/// through to the device verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClimateCommand(String);

impl ClimateCommand {
    pub fn parse(raw: &str) -> Result<Self, EmptyCommand> {
        let raw = raw.trim();
        if raw.is_empty() {
            Err(EmptyCommand)
        } else {
            Ok(Self(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Control mode in force once this command has been issued. Setpoint
    /// commands only make sense outside automatic control, so they force
    /// manual mode on.
    fn resulting_manual_mode(&self) -> bool {
        self.0 != "auto"
    }
}

impl fmt::Display for ClimateCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ClimateUnit
// ---------------------------------------------------------------------------

/// Mirror of the climate unit plus a single-slot mailbox for commands.
///
/// State and mailbox have separate locks. Issuing a command takes both, state
/// first; consuming takes only the mailbox.
#[derive(Clone, Default)]
pub struct ClimateUnit {
    state: Arc<RwLock<ClimateState>>,
    pending: Arc<Mutex<Option<ClimateCommand>>>,
}

impl ClimateUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn report_device_state(&self, report: ClimateReport) {
        self.report_device_state_at(report, Utc::now()).await
    }

    /// Overwrite the mirrored state with what the device reported. Missing
    /// numbers fall back to 0, a missing last fan speed keeps the previous
    /// one, and missing flags fall back to `false`.
    pub async fn report_device_state_at(&self, report: ClimateReport, now: DateTime<Utc>) {
        let mut state = self.state.write().await;

        state.powered_on = report.powered_on.unwrap_or(false);
        state.humidifying = report.humidifying.unwrap_or(false);
        state.fan_speed = report.fan_speed.unwrap_or(0);
        state.last_fan_speed = report.last_fan_speed.unwrap_or(state.last_fan_speed);
        state.timer_minutes = report.timer_minutes.unwrap_or(0);
        state.vertical_louver = report.vertical_louver.unwrap_or(false);
        state.horizontal_louver = report.horizontal_louver.unwrap_or(false);
        state.last_updated_at = Some(now);
        if let Some(manual) = report.manual_mode {
            state.manual_mode = manual;
        }

        debug!(
            powered_on = state.powered_on,
            fan_speed = state.fan_speed,
            manual_mode = state.manual_mode,
            "Climate state reported by device"
        );
    }

    /// Store `command` for the device's next poll, replacing any command it
    /// has not picked up yet. Returns the resulting manual-mode flag.
    pub async fn issue_command(&self, command: ClimateCommand) -> bool {
        let mut state = self.state.write().await;
        let mut pending = self.pending.lock().await;

        state.manual_mode = command.resulting_manual_mode();
        if let Some(previous) = pending.replace(command.clone()) {
            warn!(dropped = %previous, replaced_by = %command, "Undelivered climate command overwritten");
        }

        info!(command = %command, manual_mode = state.manual_mode, "Climate command issued");
        state.manual_mode
    }

    /// Hand the pending command to the device and clear the slot. Returns
    /// [`NO_COMMAND`] when nothing is waiting.
    pub async fn consume_command(&self) -> String {
        match self.pending.lock().await.take() {
            Some(command) => {
                info!(command = %command, "Climate command delivered to device");
                command.0
            }
            None => NO_COMMAND.to_owned(),
        }
    }

    pub async fn view(&self) -> ClimateView {
        self.view_at(Utc::now()).await
    }

    pub async fn view_at(&self, now: DateTime<Utc>) -> ClimateView {
        let state = self.state.read().await.clone();
        let fresh = state.last_updated_at.is_some_and(|at| is_fresh(at, now));
        ClimateView { state, fresh }
    }
}
