use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Saturation state of a barrier instance.
///
/// `Saturated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum BarrierState {
  Standing,
  Saturated,
}

/// A workflow running at a specific pipeline state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Participant {
  pub workflow_id: String,
  pub pipeline_state_id: String,
}

impl Participant {
  pub fn new(workflow_id: impl Into<String>, pipeline_state_id: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      pipeline_state_id: pipeline_state_id.into(),
    }
  }
}

/// Input to [`crate::BarrierStore::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBarrierInstance {
  pub app_id: String,
  pub pipeline_execution_id: String,
  pub name: String,
  pub participants: BTreeSet<Participant>,
}

/// The durable synchronization record of one barrier in one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierInstance {
  pub id: String,
  pub app_id: String,
  /// The barrier identifier.
  pub name: String,
  pub pipeline_execution_id: String,
  pub participants: BTreeSet<Participant>,
  /// Participants that have registered their arrival.
  pub arrived: BTreeSet<Participant>,
  pub expected_count: u32,
  pub arrived_count: u32,
  pub state: BarrierState,
  /// Bumped on every write; used as the compare-and-swap token.
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl BarrierInstance {
  /// Build a fresh, standing instance with a generated id.
  pub fn new(new: NewBarrierInstance) -> Self {
    let now = Utc::now();
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      app_id: new.app_id,
      name: new.name,
      pipeline_execution_id: new.pipeline_execution_id,
      expected_count: new.participants.len() as u32,
      participants: new.participants,
      arrived: BTreeSet::new(),
      arrived_count: 0,
      state: BarrierState::Standing,
      version: 0,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn is_saturated(&self) -> bool {
    self.state == BarrierState::Saturated
  }

  /// Record `participant` as arrived.
  ///
  /// Returns `Ok(false)` when the participant had already arrived, in which case
  /// the instance is left untouched.
  pub fn record_arrival(&mut self, participant: &Participant) -> Result<bool, StoreError> {
    if !self.participants.contains(participant) {
      return Err(StoreError::NotParticipant {
        id: self.id.clone(),
        workflow_id: participant.workflow_id.clone(),
        pipeline_state_id: participant.pipeline_state_id.clone(),
      });
    }
    if !self.arrived.insert(participant.clone()) {
      return Ok(false);
    }

    self.arrived_count = self.arrived.len() as u32;
    if self.arrived_count == self.expected_count {
      self.state = BarrierState::Saturated;
    }
    self.updated_at = Utc::now();
    Ok(true)
  }
}
