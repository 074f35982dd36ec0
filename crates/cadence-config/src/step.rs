use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Type tag of the barrier step.
pub const BARRIER_STEP_TYPE: &str = "BARRIER";

/// Property holding the barrier identifier on a barrier step.
pub const BARRIER_IDENTIFIER_PROPERTY: &str = "identifier";

/// A single step as persisted in a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  pub step_id: String,
  #[serde(default)]
  pub name: String,
  /// Step type tag, e.g. "BARRIER", "SHELL_SCRIPT", "HTTP".
  #[serde(rename = "type")]
  pub step_type: String,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub properties: HashMap<String, serde_json::Value>,
}

impl StepDef {
  /// Whether this step is a barrier declaration.
  pub fn is_barrier(&self) -> bool {
    self.step_type == BARRIER_STEP_TYPE
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deserialize_barrier_step() {
    let json = r#"{
      "step_id": "s1",
      "name": "Wait for db",
      "type": "BARRIER",
      "properties": { "identifier": "deploy" }
    }"#;

    let step: StepDef = serde_json::from_str(json).unwrap();
    assert!(step.is_barrier());
    assert_eq!(
      step.properties.get(BARRIER_IDENTIFIER_PROPERTY),
      Some(&serde_json::json!("deploy"))
    );
  }

  #[test]
  fn test_deserialize_step_defaults() {
    let json = r#"{ "step_id": "s1", "type": "HTTP" }"#;

    let step: StepDef = serde_json::from_str(json).unwrap();
    assert!(!step.is_barrier());
    assert!(step.properties.is_empty());
    assert_eq!(step.name, "");
  }
}
