use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::{
  BarrierInstance, BarrierState, BarrierStore, NewBarrierInstance, Participant, StoreConfig,
  StoreError,
};

/// A barrier instance as stored in the database.
#[derive(Debug, FromRow)]
struct BarrierRow {
  id: String,
  app_id: String,
  name: String,
  pipeline_execution_id: String,
  participants: Json<BTreeSet<Participant>>,
  arrived: Json<BTreeSet<Participant>>,
  expected_count: i64,
  arrived_count: i64,
  state: BarrierState,
  version: i64,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<BarrierRow> for BarrierInstance {
  fn from(row: BarrierRow) -> Self {
    Self {
      id: row.id,
      app_id: row.app_id,
      name: row.name,
      pipeline_execution_id: row.pipeline_execution_id,
      participants: row.participants.0,
      arrived: row.arrived.0,
      expected_count: row.expected_count as u32,
      arrived_count: row.arrived_count as u32,
      state: row.state,
      version: row.version,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

const SELECT_COLUMNS: &str = r#"
  SELECT id, app_id, name, pipeline_execution_id, participants, arrived,
         expected_count, arrived_count, state, version, created_at, updated_at
  FROM barrier_instances
"#;

/// Map a unique-index violation to [`StoreError::Duplicate`].
fn insert_error(err: sqlx::Error, instance: &BarrierInstance) -> StoreError {
  match &err {
    sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate {
      pipeline_execution_id: instance.pipeline_execution_id.clone(),
      name: instance.name.clone(),
    },
    _ => StoreError::Database(err),
  }
}

/// SQLite-based store implementation.
///
/// Arrivals use optimistic concurrency: the row's `version` column acts as the
/// compare-and-swap token, so several processes sharing the database file can
/// update the same barrier safely.
pub struct SqliteStore {
  pool: SqlitePool,
  config: StoreConfig,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self::with_config(pool, StoreConfig::default())
  }

  pub fn with_config(pool: SqlitePool, config: StoreConfig) -> Self {
    Self { pool, config }
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }

  async fn insert(
    conn: &mut SqliteConnection,
    instance: &BarrierInstance,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO barrier_instances (id, app_id, name, pipeline_execution_id, participants, arrived,
                                           expected_count, arrived_count, state, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&instance.id)
    .bind(&instance.app_id)
    .bind(&instance.name)
    .bind(&instance.pipeline_execution_id)
    .bind(Json(&instance.participants))
    .bind(Json(&instance.arrived))
    .bind(instance.expected_count as i64)
    .bind(instance.arrived_count as i64)
    .bind(instance.state)
    .bind(instance.version)
    .bind(instance.created_at)
    .bind(instance.updated_at)
    .execute(conn)
    .await
    .map_err(|e| insert_error(e, instance))?;

    Ok(())
  }

  async fn fetch_optional(&self, id: &str) -> Result<Option<BarrierInstance>, StoreError> {
    let row: Option<BarrierRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;

    Ok(row.map(BarrierInstance::from))
  }
}

#[async_trait]
impl BarrierStore for SqliteStore {
  async fn create(&self, new: NewBarrierInstance) -> Result<BarrierInstance, StoreError> {
    let instance = BarrierInstance::new(new);
    let mut conn = self.pool.acquire().await?;
    Self::insert(&mut *conn, &instance).await?;
    Ok(instance)
  }

  async fn create_all(
    &self,
    new: Vec<NewBarrierInstance>,
  ) -> Result<Vec<BarrierInstance>, StoreError> {
    let instances: Vec<BarrierInstance> = new.into_iter().map(BarrierInstance::new).collect();

    // Dropping the transaction on error rolls everything back.
    let mut tx = self.pool.begin().await?;
    for instance in &instances {
      Self::insert(&mut *tx, instance).await?;
    }
    tx.commit().await?;

    Ok(instances)
  }

  async fn get(&self, id: &str) -> Result<BarrierInstance, StoreError> {
    self
      .fetch_optional(id)
      .await?
      .ok_or_else(|| StoreError::NotFound(format!("barrier instance {}", id)))
  }

  async fn find_by_name(
    &self,
    pipeline_execution_id: &str,
    name: &str,
  ) -> Result<BarrierInstance, StoreError> {
    let row: Option<BarrierRow> = sqlx::query_as(&format!(
      "{} WHERE pipeline_execution_id = ? AND name = ?",
      SELECT_COLUMNS
    ))
    .bind(pipeline_execution_id)
    .bind(name)
    .fetch_optional(&self.pool)
    .await?;

    row.map(BarrierInstance::from).ok_or_else(|| {
      StoreError::NotFound(format!(
        "barrier '{}' in pipeline execution {}",
        name, pipeline_execution_id
      ))
    })
  }

  async fn list_for_execution(
    &self,
    pipeline_execution_id: &str,
  ) -> Result<Vec<BarrierInstance>, StoreError> {
    let rows: Vec<BarrierRow> = sqlx::query_as(&format!(
      "{} WHERE pipeline_execution_id = ? ORDER BY name ASC",
      SELECT_COLUMNS
    ))
    .bind(pipeline_execution_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(BarrierInstance::from).collect())
  }

  async fn save(&self, instance: &BarrierInstance) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO barrier_instances (id, app_id, name, pipeline_execution_id, participants, arrived,
                                           expected_count, arrived_count, state, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                app_id = excluded.app_id,
                name = excluded.name,
                pipeline_execution_id = excluded.pipeline_execution_id,
                participants = excluded.participants,
                arrived = excluded.arrived,
                expected_count = excluded.expected_count,
                arrived_count = excluded.arrived_count,
                state = excluded.state,
                version = barrier_instances.version + 1,
                updated_at = excluded.updated_at
            "#,
    )
    .bind(&instance.id)
    .bind(&instance.app_id)
    .bind(&instance.name)
    .bind(&instance.pipeline_execution_id)
    .bind(Json(&instance.participants))
    .bind(Json(&instance.arrived))
    .bind(instance.expected_count as i64)
    .bind(instance.arrived_count as i64)
    .bind(instance.state)
    .bind(instance.version)
    .bind(instance.created_at)
    .bind(instance.updated_at)
    .execute(&self.pool)
    .await
    .map_err(|e| insert_error(e, instance))?;

    Ok(())
  }

  async fn register_arrival(
    &self,
    id: &str,
    workflow_id: &str,
    pipeline_state_id: &str,
  ) -> Result<BarrierInstance, StoreError> {
    let participant = Participant::new(workflow_id, pipeline_state_id);
    let attempts = self.config.max_cas_attempts.max(1);

    for attempt in 1..=attempts {
      let mut instance = self.get(id).await?;
      let expected_version = instance.version;

      if !instance.record_arrival(&participant)? {
        return Ok(instance);
      }

      let result = sqlx::query(
        r#"
            UPDATE barrier_instances
            SET arrived = ?, arrived_count = ?, state = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
      )
      .bind(Json(&instance.arrived))
      .bind(instance.arrived_count as i64)
      .bind(instance.state)
      .bind(instance.updated_at)
      .bind(id)
      .bind(expected_version)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 1 {
        instance.version = expected_version + 1;
        debug!(
          barrier_id = %id,
          workflow_id,
          pipeline_state_id,
          arrived_count = instance.arrived_count,
          attempt,
          "arrival recorded"
        );
        return Ok(instance);
      }

      warn!(
        barrier_id = %id,
        workflow_id,
        attempt,
        "concurrent update on barrier, retrying arrival"
      );
    }

    Err(StoreError::Conflict {
      id: id.to_string(),
      attempts,
    })
  }
}
