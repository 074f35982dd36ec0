use std::collections::HashMap;

use cadence_config::{BARRIER_IDENTIFIER_PROPERTY, StepDef};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// A typed step in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub step_id: String,
  pub name: String,
  pub kind: StepKind,
}

/// The kind of a step.
///
/// Only barriers are interpreted; everything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepKind {
  Barrier {
    identifier: String,
  },
  Other {
    step_type: String,
    properties: HashMap<String, serde_json::Value>,
  },
}

impl Step {
  pub fn barrier(step_id: impl Into<String>, identifier: impl Into<String>) -> Self {
    let step_id = step_id.into();
    Self {
      name: step_id.clone(),
      step_id,
      kind: StepKind::Barrier {
        identifier: identifier.into(),
      },
    }
  }

  pub fn other(step_id: impl Into<String>, step_type: impl Into<String>) -> Self {
    let step_id = step_id.into();
    Self {
      name: step_id.clone(),
      step_id,
      kind: StepKind::Other {
        step_type: step_type.into(),
        properties: HashMap::new(),
      },
    }
  }

  /// The barrier identifier, if this is a barrier step.
  pub fn barrier_identifier(&self) -> Option<&str> {
    match &self.kind {
      StepKind::Barrier { identifier } => Some(identifier),
      StepKind::Other { .. } => None,
    }
  }
}

impl TryFrom<StepDef> for Step {
  type Error = WorkflowError;

  fn try_from(def: StepDef) -> Result<Self, Self::Error> {
    if !def.is_barrier() {
      return Ok(Step {
        step_id: def.step_id,
        name: def.name,
        kind: StepKind::Other {
          step_type: def.step_type,
          properties: def.properties,
        },
      });
    }

    let identifier = match def.properties.get(BARRIER_IDENTIFIER_PROPERTY) {
      None => {
        return Err(WorkflowError::InvalidBarrier {
          step_id: def.step_id,
          reason: format!("missing '{}' property", BARRIER_IDENTIFIER_PROPERTY),
        });
      }
      Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.clone(),
      Some(serde_json::Value::String(_)) => {
        return Err(WorkflowError::InvalidBarrier {
          step_id: def.step_id,
          reason: format!("blank '{}' property", BARRIER_IDENTIFIER_PROPERTY),
        });
      }
      Some(other) => {
        return Err(WorkflowError::InvalidBarrier {
          step_id: def.step_id,
          reason: format!(
            "'{}' property must be a string, got {}",
            BARRIER_IDENTIFIER_PROPERTY, other
          ),
        });
      }
    };

    Ok(Step {
      step_id: def.step_id,
      name: def.name,
      kind: StepKind::Barrier { identifier },
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn make_step_def(step_type: &str, identifier: Option<serde_json::Value>) -> StepDef {
    let mut properties = HashMap::new();
    if let Some(value) = identifier {
      properties.insert(BARRIER_IDENTIFIER_PROPERTY.to_string(), value);
    }
    StepDef {
      step_id: "s1".to_string(),
      name: "Step".to_string(),
      step_type: step_type.to_string(),
      properties,
    }
  }

  #[test]
  fn test_barrier_step_converts() {
    let step = Step::try_from(make_step_def("BARRIER", Some("deploy".into()))).unwrap();
    assert_eq!(step.barrier_identifier(), Some("deploy"));
  }

  #[test]
  fn test_other_step_keeps_type_and_properties() {
    let step = Step::try_from(make_step_def("SHELL_SCRIPT", Some("x".into()))).unwrap();
    match step.kind {
      StepKind::Other {
        step_type,
        properties,
      } => {
        assert_eq!(step_type, "SHELL_SCRIPT");
        assert_eq!(properties.len(), 1);
      }
      _ => panic!("expected other step"),
    }
  }

  #[test]
  fn test_barrier_without_identifier_fails() {
    let result = Step::try_from(make_step_def("BARRIER", None));
    assert!(matches!(result, Err(WorkflowError::InvalidBarrier { .. })));
  }

  #[test]
  fn test_barrier_with_blank_identifier_fails() {
    let result = Step::try_from(make_step_def("BARRIER", Some("   ".into())));
    assert!(matches!(result, Err(WorkflowError::InvalidBarrier { .. })));
  }

  #[test]
  fn test_barrier_with_non_string_identifier_fails() {
    let result = Step::try_from(make_step_def("BARRIER", Some(serde_json::json!(42))));
    assert!(matches!(result, Err(WorkflowError::InvalidBarrier { .. })));
  }
}
