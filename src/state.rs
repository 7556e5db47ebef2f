use std::{sync::Arc, time::Duration};

use crate::{
    climate::ClimateUnit,
    db::{OccupantStore, PresenceLog},
    lighting::LightingControl,
    presence::{PresenceLogger, PresenceResolver},
    telemetry::TelemetryStore,
};

/// Everything the HTTP handlers share. Built once at startup; each piece of
/// mutable state carries its own lock so unrelated requests never contend.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: TelemetryStore,
    pub climate: ClimateUnit,
    pub lighting: LightingControl,
    pub resolver: PresenceResolver,
    pub presence_logger: PresenceLogger,
    pub occupants: Arc<dyn OccupantStore>,
    pub presence_log: Arc<dyn PresenceLog>,
    pub store_timeout: Duration,
}

impl AppState {
    pub fn new(
        occupants: Arc<dyn OccupantStore>,
        presence_log: Arc<dyn PresenceLog>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            telemetry: TelemetryStore::new(),
            climate: ClimateUnit::new(),
            lighting: LightingControl::new(),
            resolver: PresenceResolver::new(occupants.clone(), store_timeout),
            presence_logger: PresenceLogger::new(
                occupants.clone(),
                presence_log.clone(),
                store_timeout,
            ),
            occupants,
            presence_log,
            store_timeout,
        }
    }
}
