use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    models::{NewPresenceEvent, Occupant, PreferenceUpdate, PresenceEvent},
    OccupantStore, PresenceLog, StoreError,
};

const OCCUPANT_COLUMNS: &str = "id, employee_id, first_name, last_name, \
     preferred_temperature, preferred_luminosity, presence_tag";

/// Postgres-backed personnel store and presence log.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OccupantStore for PgStore {
    async fn find_by_tags(&self, tags: &[String]) -> Result<Vec<Occupant>, StoreError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Occupant>(&format!(
            "SELECT {OCCUPANT_COLUMNS} FROM employees WHERE presence_tag = ANY($1)"
        ))
        .bind(tags)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_by_tag(&self, tag: &str) -> Result<Option<Occupant>, StoreError> {
        let row = sqlx::query_as::<_, Occupant>(&format!(
            "SELECT {OCCUPANT_COLUMNS} FROM employees WHERE presence_tag = $1"
        ))
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_employee_id(&self, employee_id: i64) -> Result<Option<Occupant>, StoreError> {
        let row = sqlx::query_as::<_, Occupant>(&format!(
            "SELECT {OCCUPANT_COLUMNS} FROM employees WHERE employee_id = $1"
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_preferences(
        &self,
        employee_id: i64,
        update: PreferenceUpdate,
    ) -> Result<Option<Occupant>, StoreError> {
        let row = sqlx::query_as::<_, Occupant>(&format!(
            r#"
            UPDATE employees
               SET preferred_temperature = $2,
                   preferred_luminosity  = $3,
                   presence_tag          = COALESCE($4, presence_tag)
             WHERE employee_id = $1
            RETURNING {OCCUPANT_COLUMNS}
            "#
        ))
        .bind(employee_id)
        .bind(update.temperature)
        .bind(update.luminosity)
        .bind(update.presence_tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl PresenceLog for PgStore {
    async fn append(&self, event: NewPresenceEvent) -> Result<PresenceEvent, StoreError> {
        let row = sqlx::query_as::<_, PresenceEvent>(
            r#"
            INSERT INTO presence_events
                (id, occupant_id, employee_id, full_name, tag_id, direction, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, occupant_id, employee_id, full_name, tag_id, direction, occurred_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.occupant_id)
        .bind(event.employee_id)
        .bind(event.full_name)
        .bind(event.tag_id)
        .bind(event.direction)
        .bind(event.occurred_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<PresenceEvent>, StoreError> {
        let rows = sqlx::query_as::<_, PresenceEvent>(
            r#"
            SELECT id, occupant_id, employee_id, full_name, tag_id, direction, occurred_at
            FROM presence_events
            ORDER BY occurred_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
