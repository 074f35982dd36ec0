use serde::{Deserialize, Serialize};

/// Tuning knobs shared by the store implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// How many times an arrival update is retried after losing a
  /// compare-and-swap race before giving up with [`crate::StoreError::Conflict`].
  pub max_cas_attempts: u32,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      max_cas_attempts: 16,
    }
  }
}
