//! Cadence Store
//!
//! This crate provides the storage trait and implementations for barrier
//! instances. Data is persisted to SQLite, or kept in memory for tests and
//! single-process setups.
//!
//! The [`BarrierStore`] trait defines operations for:
//! - Creating barrier instances, one at a time or as an atomic batch
//! - Looking instances up by id or by `(pipeline_execution_id, name)`
//! - Registering participant arrivals as a single atomic update

mod config;
mod memory;
mod sqlite;
mod types;

pub use config::StoreConfig;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{BarrierInstance, BarrierState, NewBarrierInstance, Participant};

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// An instance with the same name already exists for the pipeline execution.
  #[error("barrier '{name}' already exists for pipeline execution '{pipeline_execution_id}'")]
  Duplicate {
    pipeline_execution_id: String,
    name: String,
  },

  /// The arriving workflow is not a participant of the barrier.
  #[error(
    "workflow '{workflow_id}' at pipeline state '{pipeline_state_id}' is not a participant of barrier '{id}'"
  )]
  NotParticipant {
    id: String,
    workflow_id: String,
    pipeline_state_id: String,
  },

  /// Concurrent writers kept winning the compare-and-swap.
  #[error("barrier '{id}' update conflicted {attempts} times")]
  Conflict { id: String, attempts: u32 },

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying the schema failed.
  #[error("migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for barrier instances.
#[async_trait]
pub trait BarrierStore: Send + Sync {
  /// Create a new barrier instance.
  ///
  /// Fails with [`StoreError::Duplicate`] if an instance with the same
  /// `(pipeline_execution_id, name)` exists.
  async fn create(&self, new: NewBarrierInstance) -> Result<BarrierInstance, StoreError>;

  /// Create several instances; either all of them are created or none is.
  async fn create_all(
    &self,
    new: Vec<NewBarrierInstance>,
  ) -> Result<Vec<BarrierInstance>, StoreError>;

  /// Get a barrier instance by ID.
  async fn get(&self, id: &str) -> Result<BarrierInstance, StoreError>;

  /// Get a barrier instance by its name within a pipeline execution.
  async fn find_by_name(
    &self,
    pipeline_execution_id: &str,
    name: &str,
  ) -> Result<BarrierInstance, StoreError>;

  /// List the instances of a pipeline execution, ordered by name.
  async fn list_for_execution(
    &self,
    pipeline_execution_id: &str,
  ) -> Result<Vec<BarrierInstance>, StoreError>;

  /// Insert or overwrite an instance as-is. Bypasses all validation.
  async fn save(&self, instance: &BarrierInstance) -> Result<(), StoreError>;

  /// Atomically record the arrival of a participant.
  ///
  /// Repeated arrivals of the same participant leave the instance unchanged.
  async fn register_arrival(
    &self,
    id: &str,
    workflow_id: &str,
    pipeline_state_id: &str,
  ) -> Result<BarrierInstance, StoreError>;
}
