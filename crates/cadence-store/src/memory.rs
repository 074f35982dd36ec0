use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{BarrierInstance, BarrierStore, NewBarrierInstance, Participant, StoreError};

/// Inner state of [`MemoryStore`].
#[derive(Debug, Default)]
struct Inner {
  instances: HashMap<String, BarrierInstance>,
  /// `(pipeline_execution_id, name)` -> instance id.
  by_name: HashMap<(String, String), String>,
}

impl Inner {
  fn name_key(pipeline_execution_id: &str, name: &str) -> (String, String) {
    (pipeline_execution_id.to_string(), name.to_string())
  }

  fn check_vacant(&self, new: &NewBarrierInstance) -> Result<(), StoreError> {
    if self
      .by_name
      .contains_key(&Self::name_key(&new.pipeline_execution_id, &new.name))
    {
      return Err(StoreError::Duplicate {
        pipeline_execution_id: new.pipeline_execution_id.clone(),
        name: new.name.clone(),
      });
    }
    Ok(())
  }

  fn insert(&mut self, instance: BarrierInstance) {
    self.by_name.insert(
      Self::name_key(&instance.pipeline_execution_id, &instance.name),
      instance.id.clone(),
    );
    self.instances.insert(instance.id.clone(), instance);
  }
}

/// In-memory barrier store.
///
/// Every operation holds the lock for its whole read-modify-write, which makes
/// arrivals atomic within one process. State is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl BarrierStore for MemoryStore {
  async fn create(&self, new: NewBarrierInstance) -> Result<BarrierInstance, StoreError> {
    let mut inner = self.inner.lock().await;
    inner.check_vacant(&new)?;

    let instance = BarrierInstance::new(new);
    inner.insert(instance.clone());
    Ok(instance)
  }

  async fn create_all(
    &self,
    new: Vec<NewBarrierInstance>,
  ) -> Result<Vec<BarrierInstance>, StoreError> {
    let mut inner = self.inner.lock().await;

    // Check everything up front so a conflict leaves nothing behind.
    let mut seen = HashSet::new();
    for item in &new {
      inner.check_vacant(item)?;
      if !seen.insert(Inner::name_key(&item.pipeline_execution_id, &item.name)) {
        return Err(StoreError::Duplicate {
          pipeline_execution_id: item.pipeline_execution_id.clone(),
          name: item.name.clone(),
        });
      }
    }

    let created: Vec<BarrierInstance> = new.into_iter().map(BarrierInstance::new).collect();
    for instance in &created {
      inner.insert(instance.clone());
    }
    Ok(created)
  }

  async fn get(&self, id: &str) -> Result<BarrierInstance, StoreError> {
    let inner = self.inner.lock().await;
    inner
      .instances
      .get(id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("barrier instance {}", id)))
  }

  async fn find_by_name(
    &self,
    pipeline_execution_id: &str,
    name: &str,
  ) -> Result<BarrierInstance, StoreError> {
    let inner = self.inner.lock().await;
    inner
      .by_name
      .get(&Inner::name_key(pipeline_execution_id, name))
      .and_then(|id| inner.instances.get(id))
      .cloned()
      .ok_or_else(|| {
        StoreError::NotFound(format!(
          "barrier '{}' in pipeline execution {}",
          name, pipeline_execution_id
        ))
      })
  }

  async fn list_for_execution(
    &self,
    pipeline_execution_id: &str,
  ) -> Result<Vec<BarrierInstance>, StoreError> {
    let inner = self.inner.lock().await;
    let mut instances: Vec<BarrierInstance> = inner
      .instances
      .values()
      .filter(|i| i.pipeline_execution_id == pipeline_execution_id)
      .cloned()
      .collect();
    instances.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(instances)
  }

  async fn save(&self, instance: &BarrierInstance) -> Result<(), StoreError> {
    let mut inner = self.inner.lock().await;

    let key = Inner::name_key(&instance.pipeline_execution_id, &instance.name);
    if let Some(existing_id) = inner.by_name.get(&key) {
      if existing_id != &instance.id {
        return Err(StoreError::Duplicate {
          pipeline_execution_id: instance.pipeline_execution_id.clone(),
          name: instance.name.clone(),
        });
      }
    }

    let previous = inner
      .instances
      .get(&instance.id)
      .map(|p| (p.version, Inner::name_key(&p.pipeline_execution_id, &p.name)));

    let mut stored = instance.clone();
    if let Some((version, old_key)) = previous {
      stored.version = version + 1;
      // A rename frees the old name.
      if old_key != key {
        inner.by_name.remove(&old_key);
      }
    }
    inner.insert(stored);
    Ok(())
  }

  async fn register_arrival(
    &self,
    id: &str,
    workflow_id: &str,
    pipeline_state_id: &str,
  ) -> Result<BarrierInstance, StoreError> {
    let mut inner = self.inner.lock().await;
    let instance = inner
      .instances
      .get_mut(id)
      .ok_or_else(|| StoreError::NotFound(format!("barrier instance {}", id)))?;

    let participant = Participant::new(workflow_id, pipeline_state_id);
    if instance.record_arrival(&participant)? {
      instance.version += 1;
      debug!(
        barrier_id = %id,
        workflow_id,
        pipeline_state_id,
        arrived_count = instance.arrived_count,
        "arrival recorded"
      );
    }
    Ok(instance.clone())
  }
}
