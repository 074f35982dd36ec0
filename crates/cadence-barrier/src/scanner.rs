//! Extraction of barrier declarations from a workflow's step graph.

use cadence_workflow::Workflow;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BarrierError;

/// Where a barrier step sits in its workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierLocation {
  pub phase_id: String,
  pub phase_step_id: String,
  pub step_id: String,
}

/// One barrier step found in a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierDeclaration {
  pub identifier: String,
  pub workflow_id: String,
  pub pipeline_state_id: String,
  pub location: BarrierLocation,
}

/// Collect the barrier declarations of `workflow` in declared order: phases,
/// then phase steps, then steps.
///
/// A barrier step with a blank identifier fails the whole scan.
pub fn scan(
  workflow_id: &str,
  pipeline_state_id: &str,
  workflow: &Workflow,
) -> Result<Vec<BarrierDeclaration>, BarrierError> {
  let mut declarations = Vec::new();

  for (phase, phase_step, step) in workflow.steps() {
    let Some(identifier) = step.barrier_identifier() else {
      continue;
    };

    if identifier.trim().is_empty() {
      return Err(BarrierError::Configuration {
        workflow_id: workflow_id.to_string(),
        step_id: step.step_id.clone(),
        reason: "blank 'identifier' property".to_string(),
      });
    }

    debug!(
      workflow_id,
      pipeline_state_id,
      barrier = identifier,
      step_id = %step.step_id,
      "barrier declaration found"
    );

    declarations.push(BarrierDeclaration {
      identifier: identifier.to_string(),
      workflow_id: workflow_id.to_string(),
      pipeline_state_id: pipeline_state_id.to_string(),
      location: BarrierLocation {
        phase_id: phase.phase_id.clone(),
        phase_step_id: phase_step.phase_step_id.clone(),
        step_id: step.step_id.clone(),
      },
    });
  }

  Ok(declarations)
}

#[cfg(test)]
mod tests {
  use cadence_workflow::{Phase, PhaseStep, Step};

  use super::*;

  #[test]
  fn test_scan_preserves_declared_order() {
    let workflow = Workflow::new("wf", "app", "Workflow")
      .with_phase(
        Phase::new("phase1")
          .with_phase_step(
            PhaseStep::new("setup")
              .with_step(Step::other("s1", "SHELL_SCRIPT"))
              .with_step(Step::barrier("s2", "provisioned")),
          )
          .with_phase_step(PhaseStep::new("deploy").with_step(Step::barrier("s3", "deployed"))),
      )
      .with_phase(
        Phase::new("phase2").with_phase_step(PhaseStep::new("verify").with_step(Step::barrier(
          "s4",
          "verified",
        ))),
      );

    let declarations = scan("wf", "ps", &workflow).unwrap();

    let identifiers: Vec<&str> = declarations.iter().map(|d| d.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["provisioned", "deployed", "verified"]);
    assert_eq!(
      declarations[1].location,
      BarrierLocation {
        phase_id: "phase1".to_string(),
        phase_step_id: "deploy".to_string(),
        step_id: "s3".to_string(),
      }
    );
    assert!(declarations.iter().all(|d| d.pipeline_state_id == "ps"));
  }

  #[test]
  fn test_scan_keeps_repeated_identifiers() {
    let workflow = Workflow::new("wf", "app", "Workflow").with_phase(
      Phase::new("phase1")
        .with_phase_step(PhaseStep::new("a").with_step(Step::barrier("s1", "deploy")))
        .with_phase_step(PhaseStep::new("b").with_step(Step::barrier("s2", "deploy"))),
    );

    let declarations = scan("wf", "ps", &workflow).unwrap();
    assert_eq!(declarations.len(), 2);
  }

  #[test]
  fn test_scan_workflow_without_barriers() {
    let workflow = Workflow::new("wf", "app", "Workflow").with_phase(
      Phase::new("phase1").with_phase_step(PhaseStep::new("a").with_step(Step::other("s1", "HTTP"))),
    );

    assert!(scan("wf", "ps", &workflow).unwrap().is_empty());
  }

  #[test]
  fn test_scan_rejects_blank_identifier() {
    let workflow = Workflow::new("wf", "app", "Workflow").with_phase(
      Phase::new("phase1").with_phase_step(PhaseStep::new("a").with_step(Step::barrier("s1", " "))),
    );

    let result = scan("wf", "ps", &workflow);
    assert!(matches!(
      result,
      Err(BarrierError::Configuration { step_id, .. }) if step_id == "s1"
    ));
  }
}
