use serde::{Deserialize, Serialize};

use crate::step::StepDef;

/// A named, ordered list of steps inside a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStepDef {
  pub phase_step_id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub steps: Vec<StepDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDef {
  pub phase_id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub phase_steps: Vec<PhaseStepDef>,
}

/// A workflow definition as authored by users.
///
/// Deployment pre-steps run before the first phase and post-steps after the
/// last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub workflow_id: String,
  pub app_id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pre_deployment_steps: Option<PhaseStepDef>,
  #[serde(default)]
  pub phases: Vec<PhaseDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post_deployment_steps: Option<PhaseStepDef>,
}
