//! Polling wait for a standing barrier.
//!
//! The coordinator never blocks. A step executor that must suspend at a
//! standing barrier re-reads the instance until it saturates or the caller's
//! timeout elapses.

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use cadence_store::{BarrierInstance, BarrierStore};

use crate::config::WaitConfig;
use crate::coordinator::{ArrivalStatus, BarrierCoordinator};
use crate::error::BarrierError;

pub struct BarrierWaiter<'a, S: BarrierStore> {
  coordinator: &'a BarrierCoordinator<S>,
  config: WaitConfig,
}

impl<'a, S: BarrierStore> BarrierWaiter<'a, S> {
  pub fn new(coordinator: &'a BarrierCoordinator<S>, config: WaitConfig) -> Self {
    Self {
      coordinator,
      config,
    }
  }

  /// Poll instance `id` until it is saturated.
  pub async fn wait(&self, id: &str) -> Result<BarrierInstance, BarrierError> {
    let started = Instant::now();
    let timeout = self.config.timeout();
    let interval = self.config.poll_interval();

    loop {
      let instance = self.coordinator.get(id).await?;
      if instance.is_saturated() {
        return Ok(instance);
      }

      let elapsed = started.elapsed();
      if elapsed >= timeout {
        warn!(
          barrier_id = %id,
          arrived_count = instance.arrived_count,
          expected_count = instance.expected_count,
          "gave up waiting for barrier"
        );
        return Err(BarrierError::Timeout {
          id: id.to_string(),
          elapsed,
        });
      }

      debug!(
        barrier_id = %id,
        arrived_count = instance.arrived_count,
        expected_count = instance.expected_count,
        "barrier still standing"
      );
      sleep(interval.min(timeout - elapsed)).await;
    }
  }

  /// Arrive at a barrier and wait until every participant has arrived.
  pub async fn arrive_and_wait(
    &self,
    barrier_name: &str,
    pipeline_execution_id: &str,
    workflow_id: &str,
    pipeline_state_id: &str,
  ) -> Result<ArrivalStatus, BarrierError> {
    let status = self
      .coordinator
      .arrive(
        barrier_name,
        pipeline_execution_id,
        workflow_id,
        pipeline_state_id,
      )
      .await?;
    if status.is_saturated() {
      return Ok(status);
    }

    let instance = self.wait(&status.barrier_id).await?;
    Ok(ArrivalStatus::from(&instance))
  }
}
