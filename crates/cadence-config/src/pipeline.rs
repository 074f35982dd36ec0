use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Element type of a pipeline stage that runs a workflow.
pub const ENV_STATE_TYPE: &str = "ENV_STATE";

/// Property of an `ENV_STATE` element naming the workflow it runs.
pub const WORKFLOW_ID_PROPERTY: &str = "workflowId";

/// The element executed by a stage.
///
/// `element_id` doubles as the pipeline state id of the workflow it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageElementDef {
  pub element_id: String,
  #[serde(default)]
  pub name: String,
  #[serde(rename = "type")]
  pub element_type: String,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub properties: HashMap<String, serde_json::Value>,
}

impl StageElementDef {
  /// The workflow run by this element, if it is an `ENV_STATE` element.
  pub fn workflow_id(&self) -> Option<&str> {
    if self.element_type != ENV_STATE_TYPE {
      return None;
    }
    self
      .properties
      .get(WORKFLOW_ID_PROPERTY)
      .and_then(|v| v.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStageDef {
  pub stage_id: String,
  #[serde(default)]
  pub name: String,
  /// Runs alongside the stage before it instead of after it.
  #[serde(default)]
  pub parallel: bool,
  pub element: StageElementDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
  pub pipeline_id: String,
  pub app_id: String,
  pub name: String,
  #[serde(default)]
  pub stages: Vec<PipelineStageDef>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deserialize_pipeline() {
    let json = r#"{
      "pipeline_id": "p1",
      "app_id": "app",
      "name": "Release",
      "stages": [
        {
          "stage_id": "st1",
          "element": {
            "element_id": "ps1",
            "type": "ENV_STATE",
            "properties": { "workflowId": "wf1" }
          }
        },
        {
          "stage_id": "st2",
          "parallel": true,
          "element": { "element_id": "ps2", "type": "APPROVAL" }
        }
      ]
    }"#;

    let pipeline: PipelineDef = serde_json::from_str(json).unwrap();
    assert_eq!(pipeline.stages.len(), 2);
    assert!(!pipeline.stages[0].parallel);
    assert_eq!(pipeline.stages[0].element.workflow_id(), Some("wf1"));
    assert!(pipeline.stages[1].parallel);
    assert_eq!(pipeline.stages[1].element.workflow_id(), None);
  }
}
