use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::Utc;
use tracing::{info, warn};
use utoipa::OpenApi;

use super::{
    dto::{
        AmbientResponse, ClimateCommandRequest, ClimateCommandResponse, ClimatePayload,
        DeviceFlag, EmployeePreferencesDto, EventsQuery, IngestResponse, LightingRequest,
        LightingResponse, PresenceEventDto, TagsQuery, TelemetryPayload,
        UpdatePreferencesRequest,
    },
    errors::ApiError,
};
use crate::{
    climate::{ClimateCommand, ClimateState, ClimateView, EmptyCommand},
    db::{models::Direction, with_timeout},
    lighting::LightingOverride,
    presence::{PreferenceAverages, PresenceSummary, PresentOccupant, TagTransitions},
    state::AppState,
    telemetry::{HistoricalAverages, TelemetrySnapshot},
};

// ---------------------------------------------------------------------------
// Device endpoints: telemetry
// ---------------------------------------------------------------------------

/// Ingest one telemetry snapshot from the ESP32.
///
/// Updates the current reading and history, logs presence transitions
/// (best effort) and mirrors the climate sub-payload when present.
#[utoipa::path(
    post,
    path = "/esp32/environment",
    request_body = TelemetryPayload,
    responses(
        (status = 200, description = "Reading stored", body = IngestResponse),
        (status = 400, description = "Malformed telemetry; nothing stored"),
    ),
    tag = "device"
)]
pub async fn ingest_environment(
    State(state): State<AppState>,
    payload: Result<Json<TelemetryPayload>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(payload) = payload?;
    let now = Utc::now();
    let parsed = payload.parse(now)?;

    let current_tags = parsed.reading.presence_tags.clone();
    info!(
        temperature = parsed.reading.temperature,
        humidity = parsed.reading.humidity,
        luminosity = parsed.reading.luminosity,
        occupants = parsed.reading.occupant_count,
        tags = current_tags.len(),
        "Telemetry received"
    );

    let previous_tags = state.telemetry.ingest(parsed.reading).await;

    let transitions = TagTransitions::between(&previous_tags, &current_tags);
    if !transitions.is_empty() {
        state.presence_logger.record(&transitions, now).await;
    }

    if let Some(report) = parsed.climate {
        state.climate.report_device_state_at(report, now).await;
    }

    Ok(Json(IngestResponse { success: true }))
}

// ---------------------------------------------------------------------------
// Client endpoints: ambient view and preferences
// ---------------------------------------------------------------------------

/// Current environment, history averages, who is present and what they
/// prefer, plus lighting and climate state.
#[utoipa::path(
    get,
    path = "/esp32/environment",
    responses(
        (status = 200, description = "Aggregated ambient view", body = AmbientResponse),
    ),
    tag = "ambient"
)]
pub async fn get_environment(State(state): State<AppState>) -> Json<AmbientResponse> {
    let now = Utc::now();
    let TelemetrySnapshot {
        current,
        history,
        tags,
    } = state.telemetry.snapshot_at(now).await;

    // The ambient view stays available while the personnel store is down.
    let presence = match state.resolver.resolve_present(&tags).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, tags = tags.len(), "Presence resolution failed; using defaults");
            PresenceSummary::default()
        }
    };

    let lighting = state.lighting.get().await;
    let climate = state.climate.view_at(now).await;

    Json(AmbientResponse {
        temperature: current.temperature,
        humidity: current.humidity,
        luminosity: current.luminosity,
        occupant_count: current.occupant_count,
        fresh: current.fresh,
        captured_at: current.captured_at,
        history,
        present: presence.present,
        preferences: presence.averages,
        lighting_override: lighting.to_string(),
        lighting_manual: lighting.is_manual(),
        climate: climate.state,
        climate_fresh: climate.fresh,
    })
}

/// Resolve an arbitrary set of presence tags to occupants and their
/// aggregate preferences.
#[utoipa::path(
    get,
    path = "/esp32/preferences",
    params(TagsQuery),
    responses(
        (status = 200, description = "Resolved occupants and averages", body = PresenceSummary),
        (status = 500, description = "Personnel store unavailable"),
    ),
    tag = "ambient"
)]
pub async fn get_preferences(
    State(state): State<AppState>,
    query: Result<Query<TagsQuery>, QueryRejection>,
) -> Result<Json<PresenceSummary>, ApiError> {
    let Query(query) = query?;
    let summary = state.resolver.resolve_present(&query.tag_set()).await?;
    Ok(Json(summary))
}

/// Preferences of the employee holding a presence tag.
#[utoipa::path(
    get,
    path = "/esp32/tags/{tag}",
    params(("tag" = String, Path, description = "Presence tag identifier")),
    responses(
        (status = 200, description = "Employee preferences", body = EmployeePreferencesDto),
        (status = 404, description = "No employee holds this tag"),
        (status = 500, description = "Personnel store unavailable"),
    ),
    tag = "employees"
)]
pub async fn get_tag_preferences(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<EmployeePreferencesDto>, ApiError> {
    let occupant = with_timeout(state.store_timeout, state.occupants.find_by_tag(&tag))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no employee holds tag {tag:?}")))?;
    Ok(Json(occupant.into()))
}

/// Preferences of one employee by registration number.
#[utoipa::path(
    get,
    path = "/esp32/employees/{employee_id}",
    params(("employee_id" = i64, Path, description = "Employee registration number")),
    responses(
        (status = 200, description = "Employee preferences", body = EmployeePreferencesDto),
        (status = 400, description = "Employee id is not a number"),
        (status = 404, description = "Unknown employee"),
        (status = 500, description = "Personnel store unavailable"),
    ),
    tag = "employees"
)]
pub async fn get_employee_preferences(
    State(state): State<AppState>,
    employee_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<EmployeePreferencesDto>, ApiError> {
    let Path(employee_id) = employee_id?;
    let occupant = with_timeout(
        state.store_timeout,
        state.occupants.find_by_employee_id(employee_id),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("employee {employee_id} not found")))?;
    Ok(Json(occupant.into()))
}

/// Update one employee's preferred temperature and luminosity.
#[utoipa::path(
    post,
    path = "/esp32/employees/{employee_id}/preferences",
    params(("employee_id" = i64, Path, description = "Employee registration number")),
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Updated preferences", body = EmployeePreferencesDto),
        (status = 400, description = "Non-numeric id, or missing or out-of-range values"),
        (status = 404, description = "Unknown employee"),
        (status = 500, description = "Personnel store unavailable"),
    ),
    tag = "employees"
)]
pub async fn update_employee_preferences(
    State(state): State<AppState>,
    employee_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdatePreferencesRequest>, JsonRejection>,
) -> Result<Json<EmployeePreferencesDto>, ApiError> {
    let Path(employee_id) = employee_id?;
    let Json(body) = body?;
    let update = body.validate()?;

    let occupant = with_timeout(
        state.store_timeout,
        state.occupants.update_preferences(employee_id, update),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("employee {employee_id} not found")))?;

    info!(
        employee_id,
        temperature = ?occupant.preferred_temperature,
        luminosity = ?occupant.preferred_luminosity,
        "Employee preferences updated"
    );
    Ok(Json(occupant.into()))
}

// ---------------------------------------------------------------------------
// Lighting override
// ---------------------------------------------------------------------------

/// Set the manual lighting override, or hand control back with `"auto"`.
#[utoipa::path(
    post,
    path = "/esp32/lighting",
    request_body = LightingRequest,
    responses(
        (status = 200, description = "Override stored", body = LightingResponse),
        (status = 400, description = "Level not in {auto, 0, 25, 50, 75, 100}"),
    ),
    tag = "lighting"
)]
pub async fn set_lighting(
    State(state): State<AppState>,
    body: Result<Json<LightingRequest>, JsonRejection>,
) -> Result<Json<LightingResponse>, ApiError> {
    let Json(body) = body?;
    let mode = LightingOverride::try_from(&body.mode)?;
    state.lighting.set(mode).await;
    Ok(Json(LightingResponse {
        mode: mode.to_string(),
        manual: mode.is_manual(),
    }))
}

/// Device poll: the current override as plain text (`auto` or a level).
#[utoipa::path(
    get,
    path = "/esp32/lighting",
    responses(
        (status = 200, description = "Current override", body = String, content_type = "text/plain"),
    ),
    tag = "device"
)]
pub async fn poll_lighting(State(state): State<AppState>) -> String {
    state.lighting.get().await.to_string()
}

// ---------------------------------------------------------------------------
// Climate unit
// ---------------------------------------------------------------------------

/// Queue a one-shot command for the climate unit.
///
/// `manual`/`auto` toggle the control mode; any other command also switches
/// to manual. An undelivered command is overwritten.
#[utoipa::path(
    post,
    path = "/esp32/climate/command",
    request_body = ClimateCommandRequest,
    responses(
        (status = 200, description = "Command queued", body = ClimateCommandResponse),
        (status = 400, description = "Missing or empty command"),
    ),
    tag = "climate"
)]
pub async fn issue_climate_command(
    State(state): State<AppState>,
    body: Result<Json<ClimateCommandRequest>, JsonRejection>,
) -> Result<Json<ClimateCommandResponse>, ApiError> {
    let Json(body) = body?;
    let command = ClimateCommand::parse(body.command.as_deref().ok_or(EmptyCommand)?)?;
    let manual_mode = state.climate.issue_command(command.clone()).await;
    Ok(Json(ClimateCommandResponse {
        command: command.to_string(),
        manual_mode,
    }))
}

/// Device poll: take the pending command, or `none`. Each command is
/// delivered once.
#[utoipa::path(
    get,
    path = "/esp32/climate/command",
    responses(
        (status = 200, description = "Pending command or `none`", body = String, content_type = "text/plain"),
    ),
    tag = "device"
)]
pub async fn consume_climate_command(State(state): State<AppState>) -> String {
    state.climate.consume_command().await
}

/// Mirrored climate unit state and whether it is current.
#[utoipa::path(
    get,
    path = "/esp32/climate",
    responses(
        (status = 200, description = "Climate unit state", body = ClimateView),
    ),
    tag = "climate"
)]
pub async fn get_climate(State(state): State<AppState>) -> Json<ClimateView> {
    Json(state.climate.view().await)
}

// ---------------------------------------------------------------------------
// Presence history
// ---------------------------------------------------------------------------

/// Most recent presence transitions, newest first.
#[utoipa::path(
    get,
    path = "/presence/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "Presence events", body = Vec<PresenceEventDto>),
        (status = 500, description = "Presence log unavailable"),
    ),
    tag = "presence"
)]
pub async fn get_presence_events(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<Vec<PresenceEventDto>>, ApiError> {
    let Query(query) = query?;
    let events = with_timeout(
        state.store_timeout,
        state.presence_log.recent(query.limit()),
    )
    .await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        ingest_environment,
        get_environment,
        get_preferences,
        get_tag_preferences,
        get_employee_preferences,
        update_employee_preferences,
        set_lighting,
        poll_lighting,
        issue_climate_command,
        consume_climate_command,
        get_climate,
        get_presence_events,
        health,
    ),
    components(schemas(
        TelemetryPayload,
        ClimatePayload,
        DeviceFlag,
        IngestResponse,
        AmbientResponse,
        HistoricalAverages,
        PresenceSummary,
        PresentOccupant,
        PreferenceAverages,
        EmployeePreferencesDto,
        UpdatePreferencesRequest,
        LightingRequest,
        LightingResponse,
        ClimateCommandRequest,
        ClimateCommandResponse,
        ClimateState,
        ClimateView,
        PresenceEventDto,
        Direction,
    )),
    tags(
        (name = "device",    description = "Endpoints polled or posted to by the ESP32"),
        (name = "ambient",   description = "Aggregated environment and preference views"),
        (name = "employees", description = "Per-employee preference lookup and update"),
        (name = "lighting",  description = "Manual lighting override"),
        (name = "climate",   description = "Air-conditioner state and commands"),
        (name = "presence",  description = "Presence entry/exit history"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Ambient Control API",
        version = "0.1.0",
        description = "REST API for office environment telemetry, presence and climate control"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
