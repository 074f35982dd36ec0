//! Barrier errors.

use std::time::Duration;

use cadence_store::StoreError;
use cadence_workflow::WorkflowError;

/// Errors that can occur while discovering, creating or passing barriers.
#[derive(Debug, thiserror::Error)]
pub enum BarrierError {
  /// A barrier step is malformed (missing or blank identifier).
  #[error("invalid barrier step '{step_id}' in workflow '{workflow_id}': {reason}")]
  Configuration {
    workflow_id: String,
    step_id: String,
    reason: String,
  },

  /// Two workflow definitions share a workflow id.
  #[error("workflow '{workflow_id}' is defined more than once")]
  DuplicateWorkflow { workflow_id: String },

  /// A workflow would pass the same barrier more than once.
  #[error(
    "barriers not running concurrently: workflow '{workflow_id}' declares barrier '{identifier}' {occurrences} times"
  )]
  NotRunningConcurrently {
    identifier: String,
    workflow_id: String,
    occurrences: usize,
  },

  /// The referenced barrier instance (or workflow) does not exist.
  #[error("not found: {0}")]
  NotFound(String),

  /// A barrier with this name already exists for the pipeline execution.
  #[error("barrier '{name}' already exists for pipeline execution '{pipeline_execution_id}'")]
  DuplicateInstance {
    pipeline_execution_id: String,
    name: String,
  },

  /// The arriving workflow did not declare the barrier.
  #[error(
    "workflow '{workflow_id}' at pipeline state '{pipeline_state_id}' is not a participant of barrier '{id}'"
  )]
  NotParticipant {
    id: String,
    workflow_id: String,
    pipeline_state_id: String,
  },

  /// The barrier did not saturate within the wait budget.
  #[error("barrier '{id}' not saturated after {elapsed:?}")]
  Timeout { id: String, elapsed: Duration },

  /// Storage failure unrelated to the input.
  #[error("barrier store failure")]
  Store(#[source] StoreError),
}

impl BarrierError {
  /// Attribute a step graph conversion error to `workflow_id`.
  pub fn from_workflow(workflow_id: &str, err: WorkflowError) -> Self {
    let WorkflowError::InvalidBarrier { step_id, reason } = err;
    BarrierError::Configuration {
      workflow_id: workflow_id.to_string(),
      step_id,
      reason,
    }
  }
}

impl From<StoreError> for BarrierError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::NotFound(what) => BarrierError::NotFound(what),
      StoreError::Duplicate {
        pipeline_execution_id,
        name,
      } => BarrierError::DuplicateInstance {
        pipeline_execution_id,
        name,
      },
      StoreError::NotParticipant {
        id,
        workflow_id,
        pipeline_state_id,
      } => BarrierError::NotParticipant {
        id,
        workflow_id,
        pipeline_state_id,
      },
      other => BarrierError::Store(other),
    }
  }
}
