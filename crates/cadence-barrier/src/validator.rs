//! Cross-workflow consistency checks for barrier declarations.
//!
//! Validation is two passes over the declarations of one launch batch:
//!
//! 1. Within each participant, count declarations per identifier. Any count
//!    above one fails the batch.
//! 2. Across participants, group by identifier. Identifiers declared by at
//!    least two participants become barriers; the rest are dropped.

use std::collections::{BTreeSet, HashMap};

use cadence_store::Participant;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BarrierError;
use crate::scanner::BarrierDeclaration;

/// An identifier that passed validation, with the participants that must
/// arrive before it saturates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedBarrier {
  pub identifier: String,
  pub participants: BTreeSet<Participant>,
}

impl ValidatedBarrier {
  pub fn expected_count(&self) -> usize {
    self.participants.len()
  }
}

/// Validate the declarations of every participant in a launch batch.
///
/// Returns accepted barriers in the order their identifier was first
/// encountered.
pub fn validate(
  per_participant: &[(Participant, Vec<BarrierDeclaration>)],
) -> Result<Vec<ValidatedBarrier>, BarrierError> {
  // A participant listed more than once passes each of its barriers once per
  // entry, so its declarations are merged before counting.
  let mut merged: Vec<(&Participant, Vec<&BarrierDeclaration>)> = Vec::new();
  let mut index: HashMap<&Participant, usize> = HashMap::new();
  for (participant, declarations) in per_participant {
    let slot = *index.entry(participant).or_insert_with(|| {
      merged.push((participant, Vec::new()));
      merged.len() - 1
    });
    merged[slot].1.extend(declarations);
  }

  // Pass 1: a participant may pass a named barrier at most once.
  for (participant, declarations) in &merged {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for declaration in declarations {
      *counts.entry(declaration.identifier.as_str()).or_default() += 1;
    }

    if let Some(repeated) = declarations
      .iter()
      .find(|d| counts[d.identifier.as_str()] > 1)
    {
      return Err(BarrierError::NotRunningConcurrently {
        identifier: repeated.identifier.clone(),
        workflow_id: participant.workflow_id.clone(),
        occurrences: counts[repeated.identifier.as_str()],
      });
    }
  }

  // Pass 2: group participants by identifier.
  let mut order: Vec<&str> = Vec::new();
  let mut grouped: HashMap<&str, BTreeSet<Participant>> = HashMap::new();
  for (participant, declarations) in &merged {
    for declaration in declarations {
      let identifier = declaration.identifier.as_str();
      let participants = grouped.entry(identifier).or_insert_with(|| {
        order.push(identifier);
        BTreeSet::new()
      });
      participants.insert((*participant).clone());
    }
  }

  let mut accepted = Vec::new();
  for identifier in order {
    let Some(participants) = grouped.remove(identifier) else {
      continue;
    };
    if participants.len() < 2 {
      debug!(
        barrier = identifier,
        participants = participants.len(),
        "identifier has no concurrent partner, not a barrier"
      );
      continue;
    }
    accepted.push(ValidatedBarrier {
      identifier: identifier.to_string(),
      participants,
    });
  }

  Ok(accepted)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::scanner::BarrierLocation;

  fn declarations(
    workflow: &str,
    state: &str,
    identifiers: &[&str],
  ) -> (Participant, Vec<BarrierDeclaration>) {
    let declarations = identifiers
      .iter()
      .enumerate()
      .map(|(i, identifier)| BarrierDeclaration {
        identifier: identifier.to_string(),
        workflow_id: workflow.to_string(),
        pipeline_state_id: state.to_string(),
        location: BarrierLocation {
          phase_id: "phase".to_string(),
          phase_step_id: "phase-step".to_string(),
          step_id: format!("step{}", i),
        },
      })
      .collect();
    (Participant::new(workflow, state), declarations)
  }

  #[test]
  fn test_single_workflow_yields_no_barrier() {
    let result = validate(&[declarations("wf1", "ps1", &["deploy"])]).unwrap();
    assert!(result.is_empty());
  }

  #[test]
  fn test_shared_identifier_becomes_barrier() {
    let result = validate(&[
      declarations("wf1", "ps1", &["deploy"]),
      declarations("wf2", "ps2", &["deploy"]),
    ])
    .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].identifier, "deploy");
    assert_eq!(result[0].expected_count(), 2);
    assert!(result[0].participants.contains(&Participant::new("wf1", "ps1")));
    assert!(result[0].participants.contains(&Participant::new("wf2", "ps2")));
  }

  #[test]
  fn test_duplicate_within_workflow_fails_even_without_partner() {
    let result = validate(&[declarations("wf1", "ps1", &["deploy", "deploy"])]);
    assert!(matches!(
      result,
      Err(BarrierError::NotRunningConcurrently {
        identifier,
        occurrences: 2,
        ..
      }) if identifier == "deploy"
    ));
  }

  #[test]
  fn test_independent_identifiers_yield_nothing() {
    let result = validate(&[
      declarations("wf1", "ps1", &["deploy1"]),
      declarations("wf2", "ps2", &["deploy2"]),
    ])
    .unwrap();
    assert!(result.is_empty());
  }

  #[test]
  fn test_identifier_not_required_in_every_workflow() {
    let result = validate(&[
      declarations("wf1", "ps1", &["a", "b"]),
      declarations("wf2", "ps2", &["b"]),
      declarations("wf3", "ps3", &["a", "b", "c"]),
    ])
    .unwrap();

    let summary: Vec<(&str, usize)> = result
      .iter()
      .map(|b| (b.identifier.as_str(), b.expected_count()))
      .collect();
    assert_eq!(summary, vec![("a", 2), ("b", 3)]);
  }

  #[test]
  fn test_same_workflow_at_two_pipeline_states_counts_twice() {
    let result = validate(&[
      declarations("wf1", "ps1", &["deploy"]),
      declarations("wf1", "ps2", &["deploy"]),
    ])
    .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].expected_count(), 2);
  }

  #[test]
  fn test_participant_listed_twice_passes_barrier_twice() {
    let result = validate(&[
      declarations("wf1", "ps1", &["deploy"]),
      declarations("wf2", "ps2", &["deploy"]),
      declarations("wf1", "ps1", &["deploy"]),
    ]);
    assert!(matches!(
      result,
      Err(BarrierError::NotRunningConcurrently {
        identifier,
        workflow_id,
        occurrences: 2,
      }) if identifier == "deploy" && workflow_id == "wf1"
    ));
  }

  #[test]
  fn test_participant_listed_twice_with_distinct_barriers() {
    let result = validate(&[
      declarations("wf1", "ps1", &["a"]),
      declarations("wf1", "ps1", &["b"]),
      declarations("wf2", "ps2", &["a", "b"]),
    ])
    .unwrap();

    let summary: Vec<(&str, usize)> = result
      .iter()
      .map(|b| (b.identifier.as_str(), b.expected_count()))
      .collect();
    assert_eq!(summary, vec![("a", 2), ("b", 2)]);
  }

  #[test]
  fn test_empty_batch() {
    assert!(validate(&[]).unwrap().is_empty());
  }
}
