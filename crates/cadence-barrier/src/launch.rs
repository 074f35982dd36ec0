//! Grouping of pipeline stages into batches of concurrently launched workflows.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use cadence_config::{PipelineDef, WorkflowDef};
use cadence_workflow::Workflow;
use tracing::debug;

use crate::coordinator::OrchestrationWorkflowInfo;
use crate::error::BarrierError;

/// Convert workflow definitions into typed step graphs keyed by workflow id.
///
/// Two definitions sharing a workflow id are rejected.
pub fn load_workflows(
  defs: impl IntoIterator<Item = WorkflowDef>,
) -> Result<HashMap<String, Workflow>, BarrierError> {
  let mut workflows = HashMap::new();
  for def in defs {
    let workflow_id = def.workflow_id.clone();
    let workflow =
      Workflow::try_from(def).map_err(|e| BarrierError::from_workflow(&workflow_id, e))?;

    match workflows.entry(workflow_id) {
      Entry::Occupied(entry) => {
        return Err(BarrierError::DuplicateWorkflow {
          workflow_id: entry.key().clone(),
        });
      }
      Entry::Vacant(entry) => {
        entry.insert(workflow);
      }
    }
  }
  Ok(workflows)
}

/// Split the stages of `pipeline` into launch batches.
///
/// A stage that is not marked parallel closes the running batch and opens a new
/// one; a parallel stage joins the batch of the stage before it. Stages that do
/// not run a workflow, and workflows with nothing to orchestrate, contribute
/// nothing. Empty batches are omitted.
pub fn concurrent_batches(
  pipeline: &PipelineDef,
  workflows: &HashMap<String, Workflow>,
) -> Result<Vec<Vec<OrchestrationWorkflowInfo>>, BarrierError> {
  let mut batches = Vec::new();
  let mut current: Vec<OrchestrationWorkflowInfo> = Vec::new();

  for stage in &pipeline.stages {
    if !stage.parallel && !current.is_empty() {
      batches.push(std::mem::take(&mut current));
    }

    let Some(workflow_id) = stage.element.workflow_id() else {
      continue;
    };
    let workflow = workflows
      .get(workflow_id)
      .ok_or_else(|| BarrierError::NotFound(format!("workflow {}", workflow_id)))?;

    if !workflow.has_orchestration() {
      debug!(workflow_id, stage_id = %stage.stage_id, "workflow has no orchestration, skipped");
      continue;
    }

    current.push(OrchestrationWorkflowInfo {
      workflow_id: workflow_id.to_string(),
      pipeline_state_id: stage.element.element_id.clone(),
      workflow: workflow.clone(),
    });
  }

  if !current.is_empty() {
    batches.push(current);
  }

  Ok(batches)
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use cadence_config::{PipelineStageDef, StageElementDef};
  use cadence_workflow::{Phase, PhaseStep, Step};

  use super::*;
  use crate::coordinator::plan;

  fn make_stage(id: &str, parallel: bool, workflow_id: Option<&str>) -> PipelineStageDef {
    let mut properties = HashMap::new();
    let element_type = match workflow_id {
      Some(wf) => {
        properties.insert("workflowId".to_string(), serde_json::json!(wf));
        "ENV_STATE"
      }
      None => "APPROVAL",
    };
    PipelineStageDef {
      stage_id: id.to_string(),
      name: id.to_string(),
      parallel,
      element: StageElementDef {
        element_id: format!("{}-state", id),
        name: id.to_string(),
        element_type: element_type.to_string(),
        properties,
      },
    }
  }

  fn make_pipeline(stages: Vec<PipelineStageDef>) -> PipelineDef {
    PipelineDef {
      pipeline_id: "pipeline".to_string(),
      app_id: "app".to_string(),
      name: "Pipeline".to_string(),
      stages,
    }
  }

  fn make_workflows(ids: &[&str]) -> HashMap<String, Workflow> {
    ids
      .iter()
      .map(|id| {
        let workflow = Workflow::new(*id, "app", *id).with_phase(
          Phase::new("phase").with_phase_step(PhaseStep::new("ps").with_step(Step::barrier(
            format!("{}-barrier", id),
            "deploy",
          ))),
        );
        (id.to_string(), workflow)
      })
      .collect()
  }

  fn batch_ids(batches: &[Vec<OrchestrationWorkflowInfo>]) -> Vec<Vec<&str>> {
    batches
      .iter()
      .map(|b| b.iter().map(|i| i.pipeline_state_id.as_str()).collect())
      .collect()
  }

  #[test]
  fn test_parallel_stages_share_a_batch() {
    let pipeline = make_pipeline(vec![
      make_stage("s1", false, Some("wf1")),
      make_stage("s2", true, Some("wf2")),
      make_stage("s3", false, Some("wf3")),
      make_stage("s4", true, Some("wf1")),
    ]);
    let workflows = make_workflows(&["wf1", "wf2", "wf3"]);

    let batches = concurrent_batches(&pipeline, &workflows).unwrap();
    assert_eq!(
      batch_ids(&batches),
      vec![vec!["s1-state", "s2-state"], vec!["s3-state", "s4-state"]]
    );
  }

  #[test]
  fn test_leading_parallel_stage_and_non_workflow_stages() {
    let pipeline = make_pipeline(vec![
      make_stage("s1", true, Some("wf1")),
      make_stage("approval", false, None),
      make_stage("s2", true, Some("wf2")),
    ]);
    let workflows = make_workflows(&["wf1", "wf2"]);

    let batches = concurrent_batches(&pipeline, &workflows).unwrap();
    assert_eq!(batch_ids(&batches), vec![vec!["s1-state"], vec!["s2-state"]]);
  }

  #[test]
  fn test_workflow_without_orchestration_is_skipped() {
    let pipeline = make_pipeline(vec![
      make_stage("s1", false, Some("empty")),
      make_stage("s2", true, Some("wf1")),
    ]);
    let mut workflows = make_workflows(&["wf1"]);
    workflows.insert("empty".to_string(), Workflow::new("empty", "app", "Empty"));

    let batches = concurrent_batches(&pipeline, &workflows).unwrap();
    assert_eq!(batch_ids(&batches), vec![vec!["s2-state"]]);
  }

  #[test]
  fn test_unknown_workflow_is_not_found() {
    let pipeline = make_pipeline(vec![make_stage("s1", false, Some("ghost"))]);

    let result = concurrent_batches(&pipeline, &HashMap::new());
    assert!(matches!(result, Err(BarrierError::NotFound(_))));
  }

  #[test]
  fn test_load_workflows_reports_configuration_error() {
    let def: WorkflowDef = serde_json::from_value(serde_json::json!({
      "workflow_id": "wf1",
      "app_id": "app",
      "name": "Broken",
      "phases": [{
        "phase_id": "p1",
        "phase_steps": [{
          "phase_step_id": "ps1",
          "steps": [{ "step_id": "s1", "type": "BARRIER" }]
        }]
      }]
    }))
    .unwrap();

    let result = load_workflows(vec![def]);
    assert!(matches!(
      result,
      Err(BarrierError::Configuration { workflow_id, step_id, .. })
        if workflow_id == "wf1" && step_id == "s1"
    ));
  }

  fn make_workflow_def(workflow_id: &str, name: &str, steps: serde_json::Value) -> WorkflowDef {
    serde_json::from_value(serde_json::json!({
      "workflow_id": workflow_id,
      "app_id": "app",
      "name": name,
      "phases": [{
        "phase_id": "p1",
        "phase_steps": [{ "phase_step_id": "ps1", "steps": steps }]
      }]
    }))
    .unwrap()
  }

  #[test]
  fn test_repeated_barrier_with_shared_step_id_is_not_concurrent() {
    let barrier = serde_json::json!({
      "step_id": "s1",
      "type": "BARRIER",
      "properties": { "identifier": "deploy" }
    });
    let def = make_workflow_def("wf1", "Twice", serde_json::json!([barrier, barrier]));

    let workflows = load_workflows(vec![def]).unwrap();
    let pipeline = make_pipeline(vec![make_stage("s1", false, Some("wf1"))]);
    let batches = concurrent_batches(&pipeline, &workflows).unwrap();

    let result = plan(&batches[0]);
    assert!(matches!(
      result,
      Err(BarrierError::NotRunningConcurrently { identifier, occurrences: 2, .. })
        if identifier == "deploy"
    ));
  }

  #[test]
  fn test_load_workflows_rejects_duplicate_workflow_id() {
    let http = serde_json::json!([{ "step_id": "s1", "type": "HTTP" }]);
    let defs = vec![
      make_workflow_def("wf1", "second", http.clone()),
      make_workflow_def("wf1", "first", http),
    ];

    let result = load_workflows(defs);
    assert!(matches!(
      result,
      Err(BarrierError::DuplicateWorkflow { workflow_id }) if workflow_id == "wf1"
    ));
  }
}
