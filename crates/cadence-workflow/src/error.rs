use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("invalid barrier step '{step_id}': {reason}")]
  InvalidBarrier { step_id: String, reason: String },
}
