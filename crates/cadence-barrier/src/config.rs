use std::time::Duration;

use cadence_store::StoreConfig;
use serde::{Deserialize, Serialize};

/// How a suspended participant polls its barrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
  pub poll_interval_ms: u64,
  pub timeout_ms: u64,
}

impl WaitConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms.max(1))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

impl Default for WaitConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: 500,
      timeout_ms: 10 * 60 * 1000,
    }
  }
}

/// Top-level configuration, loadable from JSON.
///
/// ```json
/// { "store": { "max_cas_attempts": 32 }, "wait": { "poll_interval_ms": 250 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
  pub store: StoreConfig,
  pub wait: WaitConfig,
}
