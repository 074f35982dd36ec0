use cadence_config::{PhaseDef, PhaseStepDef, WorkflowDef};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::step::Step;

/// Phase id given to the folded deployment pre-steps.
pub const PRE_DEPLOYMENT_PHASE_ID: &str = "pre-deployment";

/// Phase id given to the folded deployment post-steps.
pub const POST_DEPLOYMENT_PHASE_ID: &str = "post-deployment";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStep {
  pub phase_step_id: String,
  pub name: String,
  pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
  pub phase_id: String,
  pub name: String,
  pub phase_steps: Vec<PhaseStep>,
}

/// A workflow's typed step graph, ready for barrier analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub app_id: String,
  pub name: String,
  pub phases: Vec<Phase>,
}

impl PhaseStep {
  pub fn new(phase_step_id: impl Into<String>) -> Self {
    let phase_step_id = phase_step_id.into();
    Self {
      name: phase_step_id.clone(),
      phase_step_id,
      steps: Vec::new(),
    }
  }

  pub fn with_step(mut self, step: Step) -> Self {
    self.steps.push(step);
    self
  }
}

impl Phase {
  pub fn new(phase_id: impl Into<String>) -> Self {
    let phase_id = phase_id.into();
    Self {
      name: phase_id.clone(),
      phase_id,
      phase_steps: Vec::new(),
    }
  }

  pub fn with_phase_step(mut self, phase_step: PhaseStep) -> Self {
    self.phase_steps.push(phase_step);
    self
  }
}

impl Workflow {
  pub fn new(
    workflow_id: impl Into<String>,
    app_id: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      app_id: app_id.into(),
      name: name.into(),
      phases: Vec::new(),
    }
  }

  pub fn with_phase(mut self, phase: Phase) -> Self {
    self.phases.push(phase);
    self
  }

  /// Whether there is anything to orchestrate.
  pub fn has_orchestration(&self) -> bool {
    !self.phases.is_empty()
  }

  /// Iterate over every step in declared order, together with its enclosing
  /// phase and phase step.
  pub fn steps(&self) -> impl Iterator<Item = (&Phase, &PhaseStep, &Step)> {
    self.phases.iter().flat_map(|phase| {
      phase.phase_steps.iter().flat_map(move |phase_step| {
        phase_step
          .steps
          .iter()
          .map(move |step| (phase, phase_step, step))
      })
    })
  }
}

fn convert_phase_step(def: PhaseStepDef) -> Result<PhaseStep, WorkflowError> {
  let steps = def
    .steps
    .into_iter()
    .map(Step::try_from)
    .collect::<Result<Vec<_>, _>>()?;

  Ok(PhaseStep {
    phase_step_id: def.phase_step_id,
    name: def.name,
    steps,
  })
}

fn convert_phase(def: PhaseDef) -> Result<Phase, WorkflowError> {
  let phase_steps = def
    .phase_steps
    .into_iter()
    .map(convert_phase_step)
    .collect::<Result<Vec<_>, _>>()?;

  Ok(Phase {
    phase_id: def.phase_id,
    name: def.name,
    phase_steps,
  })
}

/// Wrap deployment pre/post steps in a synthetic single-step phase.
fn deployment_phase(phase_id: &str, def: PhaseStepDef) -> Result<Phase, WorkflowError> {
  Ok(Phase {
    phase_id: phase_id.to_string(),
    name: def.name.clone(),
    phase_steps: vec![convert_phase_step(def)?],
  })
}

impl TryFrom<WorkflowDef> for Workflow {
  type Error = WorkflowError;

  fn try_from(def: WorkflowDef) -> Result<Self, Self::Error> {
    let mut phases = Vec::with_capacity(def.phases.len() + 2);

    if let Some(pre) = def.pre_deployment_steps {
      phases.push(deployment_phase(PRE_DEPLOYMENT_PHASE_ID, pre)?);
    }
    for phase_def in def.phases {
      phases.push(convert_phase(phase_def)?);
    }
    if let Some(post) = def.post_deployment_steps {
      phases.push(deployment_phase(POST_DEPLOYMENT_PHASE_ID, post)?);
    }

    Ok(Workflow {
      workflow_id: def.workflow_id,
      app_id: def.app_id,
      name: def.name,
      phases,
    })
  }
}
