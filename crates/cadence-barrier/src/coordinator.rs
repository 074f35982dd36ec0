//! Barrier coordinator: the entry point used by the pipeline launcher and the
//! step executor.

use std::collections::HashMap;

use cadence_config::PipelineDef;
use cadence_store::{
  BarrierInstance, BarrierState, BarrierStore, NewBarrierInstance, Participant,
};
use cadence_workflow::Workflow;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::BarrierError;
use crate::launch::concurrent_batches;
use crate::scanner::scan;
use crate::validator::{ValidatedBarrier, validate};

/// A workflow about to run at a given pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationWorkflowInfo {
  pub workflow_id: String,
  pub pipeline_state_id: String,
  pub workflow: Workflow,
}

impl OrchestrationWorkflowInfo {
  pub fn participant(&self) -> Participant {
    Participant::new(&self.workflow_id, &self.pipeline_state_id)
  }
}

/// Outcome of an arrival, telling the caller whether to block or proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalStatus {
  pub barrier_id: String,
  pub state: BarrierState,
  pub arrived_count: u32,
  pub expected_count: u32,
}

impl ArrivalStatus {
  pub fn is_saturated(&self) -> bool {
    self.state == BarrierState::Saturated
  }
}

impl From<&BarrierInstance> for ArrivalStatus {
  fn from(instance: &BarrierInstance) -> Self {
    Self {
      barrier_id: instance.id.clone(),
      state: instance.state,
      arrived_count: instance.arrived_count,
      expected_count: instance.expected_count,
    }
  }
}

/// Scan and validate one launch batch without touching any store.
pub fn plan(batch: &[OrchestrationWorkflowInfo]) -> Result<Vec<ValidatedBarrier>, BarrierError> {
  let per_participant = batch
    .iter()
    .map(|info| {
      let declarations = scan(&info.workflow_id, &info.pipeline_state_id, &info.workflow)?;
      Ok((info.participant(), declarations))
    })
    .collect::<Result<Vec<_>, BarrierError>>()?;

  validate(&per_participant)
}

/// Coordinates barrier discovery at launch time and arrivals at run time.
///
/// Holds no state of its own: every read and update goes to the store.
pub struct BarrierCoordinator<S: BarrierStore> {
  store: S,
}

impl<S: BarrierStore> BarrierCoordinator<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Discover, validate and persist the barriers of one launch batch.
  ///
  /// Nothing is written unless the whole batch validates.
  #[instrument(
    name = "obtain_instances",
    skip_all,
    fields(
      app_id = %app_id,
      pipeline_execution_id = %pipeline_execution_id,
      workflows = batch.len(),
    )
  )]
  pub async fn obtain_instances(
    &self,
    app_id: &str,
    batch: &[OrchestrationWorkflowInfo],
    pipeline_execution_id: &str,
  ) -> Result<Vec<BarrierInstance>, BarrierError> {
    let accepted = plan(batch)?;
    self.persist(app_id, pipeline_execution_id, accepted).await
  }

  /// Create the barriers of every concurrent batch of a pipeline run.
  ///
  /// All batches are planned before the first instance is written.
  #[instrument(
    name = "construct_barriers",
    skip_all,
    fields(pipeline_id = %pipeline.pipeline_id, pipeline_execution_id = %pipeline_execution_id)
  )]
  pub async fn construct_barriers(
    &self,
    pipeline: &PipelineDef,
    workflows: &HashMap<String, Workflow>,
    pipeline_execution_id: &str,
  ) -> Result<Vec<BarrierInstance>, BarrierError> {
    let batches = concurrent_batches(pipeline, workflows)?;

    let mut accepted = Vec::new();
    for batch in &batches {
      accepted.extend(plan(batch)?);
    }

    info!(
      batches = batches.len(),
      barriers = accepted.len(),
      "pipeline barriers planned"
    );

    self
      .persist(&pipeline.app_id, pipeline_execution_id, accepted)
      .await
  }

  async fn persist(
    &self,
    app_id: &str,
    pipeline_execution_id: &str,
    accepted: Vec<ValidatedBarrier>,
  ) -> Result<Vec<BarrierInstance>, BarrierError> {
    if accepted.is_empty() {
      return Ok(Vec::new());
    }

    let new = accepted
      .into_iter()
      .map(|barrier| NewBarrierInstance {
        app_id: app_id.to_string(),
        pipeline_execution_id: pipeline_execution_id.to_string(),
        name: barrier.identifier,
        participants: barrier.participants,
      })
      .collect();

    let created = self.store.create_all(new).await?;
    for instance in &created {
      info!(
        barrier_id = %instance.id,
        barrier = %instance.name,
        expected_count = instance.expected_count,
        "barrier_created"
      );
    }

    Ok(created)
  }

  /// Register the arrival of a participant at a barrier.
  ///
  /// Never blocks: the returned state says whether the caller must wait
  /// (`Standing`) or may proceed (`Saturated`).
  #[instrument(name = "arrive", skip(self))]
  pub async fn arrive(
    &self,
    barrier_name: &str,
    pipeline_execution_id: &str,
    workflow_id: &str,
    pipeline_state_id: &str,
  ) -> Result<ArrivalStatus, BarrierError> {
    let instance = self
      .store
      .find_by_name(pipeline_execution_id, barrier_name)
      .await?;

    let updated = self
      .store
      .register_arrival(&instance.id, workflow_id, pipeline_state_id)
      .await?;

    if updated.is_saturated() && !instance.is_saturated() {
      info!(
        barrier_id = %updated.id,
        expected_count = updated.expected_count,
        "barrier_saturated"
      );
    }

    Ok(ArrivalStatus::from(&updated))
  }

  pub async fn get(&self, id: &str) -> Result<BarrierInstance, BarrierError> {
    Ok(self.store.get(id).await?)
  }

  /// Write an instance directly, bypassing validation.
  pub async fn save(&self, instance: &BarrierInstance) -> Result<(), BarrierError> {
    Ok(self.store.save(instance).await?)
  }

  pub async fn list(
    &self,
    pipeline_execution_id: &str,
  ) -> Result<Vec<BarrierInstance>, BarrierError> {
    Ok(self.store.list_for_execution(pipeline_execution_id).await?)
  }
}
